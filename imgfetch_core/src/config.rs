use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;

use crate::types::DownloadError;

/// Image fetched when a request arrives with an empty URL.
pub const DEFAULT_IMAGE_URL: &str = "http://www.wired.com/images_blogs/gadgetlab/2011/12/new-prof.png";

/// Network options shared by both download variants. `None` leaves the
/// reqwest default in place.
#[derive(Debug, Clone, Default)]
pub struct NetworkConfig {
    pub connect_timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

impl NetworkConfig {
    pub fn build_client(&self) -> Result<Client, DownloadError> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        Ok(builder.build()?)
    }
}

/// Configuration for `FetchPipeline`.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub default_url: String,
    pub network: NetworkConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_url: DEFAULT_IMAGE_URL.to_string(),
            network: NetworkConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_default_url(mut self, url: impl Into<String>) -> Self {
        self.default_url = url.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.network.connect_timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.network.user_agent = Some(agent.into());
        self
    }
}

/// Configuration for `DownloadService`.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub default_url: String,
    /// Directory downloaded image files are written into. Created on demand.
    pub download_dir: PathBuf,
    /// Keep downloaded files after the reply handler has consumed them.
    pub retain_files: bool,
    pub network: NetworkConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_url: DEFAULT_IMAGE_URL.to_string(),
            download_dir: std::env::temp_dir().join("imgfetch"),
            retain_files: false,
            network: NetworkConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn with_default_url(mut self, url: impl Into<String>) -> Self {
        self.default_url = url.into();
        self
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn with_retained_files(mut self, retain: bool) -> Self {
        self.retain_files = retain;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.network.connect_timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.network.user_agent = Some(agent.into());
        self
    }
}
