pub mod handler;

pub use handler::{MagnetHandler, SystemHandler};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::magnet::Magnet;
use crate::site::{SiteClient, detail_path};

pub const UNNAMED_TORRENT: &str = "unnamed_torrent";
const MAX_FILENAME_BYTES: usize = 255;
const MAGNET_EXTENSION: &str = ".magnet";

/// What happens to a resolved magnet link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Hand the link to the system's default torrent client
    #[default]
    Open,
    /// Write `<name>.magnet` into the destination directory
    Save,
}

/// A magnet link ready for (or already handed to) a torrent client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub magnet: String,
    pub name: String,
    pub directory: PathBuf,
    pub saved_path: Option<PathBuf>,
}

/// Where a download argument points before any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Magnet(Magnet),
    DetailPage(String),
}

impl Source {
    /// Classify user input; anything that is neither a magnet, a detail page
    /// URL nor a torrent id is rejected here.
    pub fn classify(input: &str) -> Result<Self> {
        let input = input.trim();
        if Magnet::looks_like(input) {
            return Magnet::parse(input).map(Source::Magnet);
        }
        detail_path(input).map(Source::DetailPage).ok_or_else(|| {
            Error::InvalidInput(format!(
                "'{}' is not a magnet link, torrent page URL or torrent id",
                input
            ))
        })
    }
}

pub struct DownloadDispatcher<'a> {
    site: &'a SiteClient,
    handler: Arc<dyn MagnetHandler>,
    mode: DispatchMode,
    default_dir: PathBuf,
}

impl<'a> DownloadDispatcher<'a> {
    pub fn new(site: &'a SiteClient, handler: Arc<dyn MagnetHandler>, default_dir: PathBuf) -> Self {
        Self {
            site,
            handler,
            mode: DispatchMode::default(),
            default_dir,
        }
    }

    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Resolve `target` to a magnet link, then open or save it.
    pub async fn download(
        &self,
        target: &str,
        name: Option<&str>,
        dir: Option<&Path>,
    ) -> Result<DownloadTarget> {
        let (magnet, resolved_name) = self.resolve(target).await?;

        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or(resolved_name)
            .unwrap_or_else(|| UNNAMED_TORRENT.to_string());

        let directory = dir.map(Path::to_path_buf).unwrap_or_else(|| self.default_dir.clone());
        fs::create_dir_all(&directory).map_err(|e| Error::filesystem(&directory, e))?;

        let mut download = DownloadTarget {
            magnet: magnet.uri().to_string(),
            name,
            directory,
            saved_path: None,
        };

        match self.mode {
            DispatchMode::Open => match self.handler.open(&magnet) {
                Ok(()) => info!("Handed {} to the system torrent client", magnet.info_hash()),
                Err(e) => {
                    warn!("No application accepted the magnet link ({}), saving it instead", e);
                    download.saved_path = Some(save_magnet(&download)?);
                }
            },
            DispatchMode::Save => {
                download.saved_path = Some(save_magnet(&download)?);
            }
        }

        Ok(download)
    }

    /// Magnet link and suggested name for a magnet URI or detail page.
    pub async fn resolve(&self, target: &str) -> Result<(Magnet, Option<String>)> {
        match Source::classify(target)? {
            Source::Magnet(magnet) => {
                let name = magnet.display_name().map(str::to_string);
                Ok((magnet, name))
            }
            Source::DetailPage(path) => {
                debug!("Resolving magnet link from {}", path);
                let info = self.site.info(&path).await?;
                let magnet = info
                    .magnet
                    .as_deref()
                    .ok_or_else(|| Error::Resolution(path.clone()))
                    .and_then(Magnet::parse)
                    .map_err(|_| Error::Resolution(path.clone()))?;
                Ok((magnet, Some(info.name)))
            }
        }
    }
}

fn save_magnet(download: &DownloadTarget) -> Result<PathBuf> {
    let path = download
        .directory
        .join(format!("{}{}", sanitize_filename(&download.name), MAGNET_EXTENSION));
    fs::write(&path, format!("{}\n", download.magnet)).map_err(|e| Error::filesystem(&path, e))?;
    info!("Saved magnet link to {}", path.display());
    Ok(path)
}

/// A filename stem safe on every platform, short enough to take the
/// `.magnet` extension within the usual 255 byte limit.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim().trim_matches('.').trim();

    let budget = MAX_FILENAME_BYTES - MAGNET_EXTENSION.len();
    let mut end = trimmed.len().min(budget);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    let stem = trimmed[..end].trim_end();

    if stem.is_empty() {
        UNNAMED_TORRENT.to_string()
    } else {
        stem.to_string()
    }
}
