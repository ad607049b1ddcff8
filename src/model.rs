use std::{fmt, path::PathBuf, str::FromStr};

/// Represents the current state of the download action
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Nothing running, trigger enabled
    #[default]
    Idle,
    /// Worker is transferring or merging
    Downloading,
    /// Last download finished successfully
    Completed,
    /// Last download failed
    Failed,
}

impl DownloadStatus {
    pub fn is_active(self) -> bool {
        matches!(self, DownloadStatus::Downloading)
    }
}

/// A vertical resolution, rendered as a label such as `720p`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(pub u32);

impl Quality {
    pub fn height(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.0)
    }
}

impl FromStr for Quality {
    type Err = std::num::ParseIntError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let digits = label.trim().trim_end_matches(['p', 'P']);
        digits.parse::<u32>().map(Quality)
    }
}

/// One user-triggered download, never mutated after creation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Source video link
    pub url: String,
    /// Folder the merged file is written to
    pub destination: PathBuf,
    /// Requested resolution
    pub quality: Quality,
}
