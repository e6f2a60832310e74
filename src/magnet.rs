use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Error, Result};

fn btih_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(?:^|[?&])xt=urn:btih:([0-9a-f]{40}|[a-z2-7]{32})(?:&|$)")
            .expect("valid btih regex")
    })
}

/// A well-formed BitTorrent magnet URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Magnet {
    uri: String,
    info_hash: String,
    display_name: Option<String>,
}

impl Magnet {
    pub fn looks_like(input: &str) -> bool {
        input.trim_start().to_lowercase().starts_with("magnet:")
    }

    pub fn parse(input: &str) -> Result<Self> {
        let uri = input.trim();
        if !Self::looks_like(uri) {
            return Err(Error::InvalidInput(format!("'{}' is not a magnet URI", uri)));
        }

        let query = uri
            .split_once('?')
            .map(|(_, query)| query)
            .ok_or_else(|| Error::InvalidInput("magnet URI has no parameters".to_string()))?;

        let info_hash = btih_pattern()
            .captures(query)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_uppercase())
            .ok_or_else(|| {
                Error::InvalidInput("magnet URI has no xt=urn:btih info hash".to_string())
            })?;

        let display_name = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| key.eq_ignore_ascii_case("dn"))
            .map(|(_, value)| {
                let value = value.replace('+', " ");
                urlencoding::decode(&value)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or(value)
            })
            .filter(|name| !name.trim().is_empty());

        Ok(Self {
            uri: uri.to_string(),
            info_hash,
            display_name,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Upper-cased hex or base32 info hash
    pub fn info_hash(&self) -> &str {
        &self.info_hash
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}
