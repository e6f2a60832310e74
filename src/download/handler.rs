use std::io;
use tracing::debug;

use crate::magnet::Magnet;

/// Receives magnet links in `open` dispatch mode.
pub trait MagnetHandler: Send + Sync {
    fn open(&self, magnet: &Magnet) -> io::Result<()>;
}

/// Delegates to whatever application the OS registered for `magnet:` URIs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHandler;

impl MagnetHandler for SystemHandler {
    fn open(&self, magnet: &Magnet) -> io::Result<()> {
        debug!("Opening {} with the system handler", magnet.info_hash());
        open::that(magnet.uri())
    }
}
