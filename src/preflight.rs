use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::DownloadError;

/// Checks that must pass before a transfer is attempted.
#[async_trait]
pub trait Preflight: Send + Sync {
    /// Location of the merge binary.
    fn merger(&self) -> Result<PathBuf, DownloadError>;

    /// Short-timeout request to a known-reachable endpoint.
    async fn connectivity(&self) -> Result<(), DownloadError>;
}

/// Preflight against the real filesystem and network.
pub struct SystemPreflight {
    config: Config,
}

impl SystemPreflight {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Preflight for SystemPreflight {
    fn merger(&self) -> Result<PathBuf, DownloadError> {
        match &self.config.ffmpeg {
            Some(path) if path.is_file() => Ok(path.clone()),
            _ => Err(DownloadError::MergerMissing),
        }
    }

    async fn connectivity(&self) -> Result<(), DownloadError> {
        let client = reqwest::Client::builder()
            .timeout(self.config.probe_timeout)
            .build()
            .map_err(|_| DownloadError::NoConnectivity)?;
        match client.get(&self.config.probe_url).send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(
                    url = %self.config.probe_url,
                    error = %e,
                    "connectivity check failed"
                );
                Err(DownloadError::NoConnectivity)
            }
        }
    }
}
