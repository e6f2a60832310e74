pub mod config;
pub mod download;
pub mod error;
pub mod fetch;
pub mod magnet;
pub mod site;

// Re-export commonly used types for easier access in tests
pub use config::ConfigManager;
pub use download::{DispatchMode, DownloadDispatcher, DownloadTarget, MagnetHandler, SystemHandler};
pub use error::{Error, Result};
pub use fetch::{Fetcher, Page, ProxyPool, RawResponse, ResponseCache, Transport};
pub use magnet::Magnet;
pub use site::{Category, SearchQuery, SiteClient, SortField, SortOrder, TorrentInfo, TorrentResult};
