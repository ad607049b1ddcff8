//! Error taxonomy for validation, preflight, and transfer failures.

use std::path::PathBuf;
use thiserror::Error;

/// How a failure is surfaced to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad URL or folder; shown inline in the status line.
    InvalidInput,
    /// A required external binary is absent; blocking dialog.
    EnvironmentMissing,
    /// Probe request failed; blocking dialog.
    NoConnectivity,
    /// Anything raised while extracting, transferring, or merging.
    ExtractionOrTransferFailure,
}

/// Why a pair of formats could not be chosen for a quality label.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("'{0}' is not a valid quality")]
    InvalidQuality(String),

    #[error("no video-only format with height {0}p")]
    NoVideoFormat(u32),

    #[error("no companion audio container for '{0}' video")]
    UnsupportedContainer(String),

    #[error("no audio-only format with container '{0}'")]
    NoAudioFormat(String),
}

#[derive(Clone, Debug, Error)]
pub enum DownloadError {
    #[error("Invalid URL. Please enter a valid YouTube link.")]
    InvalidUrl,

    #[error("Invalid folder selected: {}", .0.display())]
    InvalidFolder(PathBuf),

    #[error("Please select a video quality.")]
    NoQualitySelected,

    #[error("FFMPEG not found. Please install FFMPEG and set the correct path.")]
    MergerMissing,

    #[error("yt-dlp not found at {}", .0.display())]
    ExtractorMissing(PathBuf),

    #[error("No internet connection. Please check your connection and try again.")]
    NoConnectivity,

    #[error("Failed to download: {0}")]
    Format(#[from] FormatError),

    #[error("Failed to download: {0}")]
    Extraction(String),

    #[error("Failed to download: {0}")]
    Transfer(String),

    #[error("Failed to download: {0}")]
    Io(String),
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::InvalidUrl
            | DownloadError::InvalidFolder(_)
            | DownloadError::NoQualitySelected => ErrorKind::InvalidInput,
            DownloadError::MergerMissing | DownloadError::ExtractorMissing(_) => {
                ErrorKind::EnvironmentMissing
            }
            DownloadError::NoConnectivity => ErrorKind::NoConnectivity,
            DownloadError::Format(_)
            | DownloadError::Extraction(_)
            | DownloadError::Transfer(_)
            | DownloadError::Io(_) => ErrorKind::ExtractionOrTransferFailure,
        }
    }

    /// Dialog title for errors that are not reported inline.
    pub fn title(&self) -> &'static str {
        match self {
            DownloadError::MergerMissing => "FFMPEG Missing",
            DownloadError::ExtractorMissing(_) => "yt-dlp Missing",
            _ => match self.kind() {
                ErrorKind::InvalidInput => "Input Error",
                ErrorKind::NoConnectivity => "No Internet",
                _ => "Error",
            },
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        DownloadError::Io(err.to_string())
    }
}
