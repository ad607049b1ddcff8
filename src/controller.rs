//! Application state and the controller that owns it.
//!
//! Workers never touch [`AppState`]; they post messages on channels that
//! [`Controller::poll`] drains on the interface thread.

use eframe::egui::ColorImage;
use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{
    runtime::Handle,
    sync::mpsc::{UnboundedReceiver, UnboundedSender, error::TryRecvError, unbounded_channel},
};

use crate::downloader::{DownloadMessage, MediaBackend, fetch_quality_options, spawn_download};
use crate::error::DownloadError;
use crate::formats::VideoInfo;
use crate::model::{DownloadRequest, DownloadStatus, Quality};
use crate::preflight::Preflight;
use crate::thumbnail;
use crate::validate::{Validation, is_supported_url, validate};

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Wakes the interface so it polls again.
pub type Notifier = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Info,
    Busy,
    Ok,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusLine {
    pub text: String,
    pub tone: Tone,
}

impl StatusLine {
    fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self { text: text.into(), tone }
    }
}

/// Everything the window renders.
#[derive(Debug)]
pub struct AppState {
    pub url: String,
    pub destination: String,
    /// Ascending labels for the current URL
    pub qualities: Vec<String>,
    pub selected_quality: String,
    /// Title of the video the quality list belongs to
    pub title: Option<String>,
    pub status: StatusLine,
    pub fetching: bool,
    pub download: DownloadStatus,
    /// 0..=100
    pub progress: f32,
    pub progress_text: String,
}

impl AppState {
    pub fn new(destination: String) -> Self {
        Self {
            url: String::new(),
            destination,
            qualities: Vec::new(),
            selected_quality: String::new(),
            title: None,
            status: StatusLine::new("Enter a URL to start.", Tone::Info),
            fetching: false,
            download: DownloadStatus::Idle,
            progress: 0.0,
            progress_text: "Progress: 0%".to_owned(),
        }
    }

    fn clear_qualities(&mut self) {
        self.qualities.clear();
        self.selected_quality.clear();
        self.title = None;
    }

    fn set_progress(&mut self, pct: f32) {
        self.progress = pct.clamp(0.0, 100.0);
        self.progress_text = format!("Progress: {:.2}%", self.progress);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialogLevel {
    Info,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dialog {
    pub level: DialogLevel,
    pub title: String,
    pub message: String,
}

/// Notifications for the interface that are not plain state.
pub enum Effect {
    /// Show a blocking message box
    Dialog(Dialog),
    /// Replace the preview image (`None` clears it)
    Thumbnail(Option<ColorImage>),
}

enum Message {
    Qualities {
        generation: u64,
        labels: Vec<String>,
        info: Option<VideoInfo>,
    },
    Thumbnail {
        generation: u64,
        image: Option<ColorImage>,
    },
}

pub struct Controller {
    state: AppState,
    runtime: Handle,
    backend: Arc<dyn MediaBackend>,
    preflight: Arc<dyn Preflight>,
    notify: Notifier,
    /// Bumped on every URL edit; stale quality results are dropped
    generation: Arc<AtomicU64>,
    debounce: Duration,
    events_tx: UnboundedSender<Message>,
    events_rx: UnboundedReceiver<Message>,
    /// Present only while a download worker is running
    download_rx: Option<UnboundedReceiver<DownloadMessage>>,
}

impl Controller {
    pub fn new(
        runtime: Handle,
        backend: Arc<dyn MediaBackend>,
        preflight: Arc<dyn Preflight>,
        notify: Notifier,
        destination: String,
    ) -> Self {
        let (events_tx, events_rx) = unbounded_channel();
        Self {
            state: AppState::new(destination),
            runtime,
            backend,
            preflight,
            notify,
            generation: Arc::new(AtomicU64::new(0)),
            debounce: DEFAULT_DEBOUNCE,
            events_tx,
            events_rx,
            download_rx: None,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Whether the download trigger is enabled.
    pub fn can_download(&self) -> bool {
        !self.state.download.is_active()
    }

    /// True while background work is pending and the view should keep refreshing.
    pub fn is_busy(&self) -> bool {
        self.state.fetching || self.download_rx.is_some()
    }

    pub fn set_destination(&mut self, destination: String) {
        self.state.destination = destination;
    }

    pub fn select_quality(&mut self, label: &str) {
        if self.state.qualities.iter().any(|q| q == label) {
            self.state.selected_quality = label.to_owned();
        }
    }

    /// Revalidates the URL and refreshes the quality list for it.
    pub fn url_changed(&mut self, url: String) {
        self.state.url = url;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.clear_qualities();
        self.state.fetching = false;

        let url = self.state.url.trim().to_owned();
        if url.is_empty() {
            self.state.status =
                StatusLine::new("URL field is empty. Please enter a URL.", Tone::Error);
            return;
        }
        if !is_supported_url(&url) {
            self.state.status = StatusLine::new(DownloadError::InvalidUrl.to_string(), Tone::Error);
            return;
        }

        self.state.status = StatusLine::new("Checking URL...", Tone::Busy);
        self.state.fetching = true;

        let backend = Arc::clone(&self.backend);
        let current = Arc::clone(&self.generation);
        let tx = self.events_tx.clone();
        let notify = Arc::clone(&self.notify);
        let debounce = self.debounce;
        self.runtime.spawn(async move {
            if !debounce.is_zero() {
                tokio::time::sleep(debounce).await;
            }
            if current.load(Ordering::SeqCst) != generation {
                return;
            }
            let (labels, info) = fetch_quality_options(backend.as_ref(), &url).await;
            let _ = tx.send(Message::Qualities { generation, labels, info });
            notify();
        });
    }

    /// Validates the form and starts the single download worker.
    ///
    /// Returns false when nothing was started: a download is already active
    /// or the inputs are invalid (reported in the status line).
    pub fn start_download(&mut self) -> bool {
        if !self.can_download() {
            tracing::debug!("download already active, trigger ignored");
            return false;
        }

        let url = self.state.url.trim().to_owned();
        let destination = PathBuf::from(self.state.destination.trim());
        match validate(&url, &destination) {
            Validation::Ok => {}
            Validation::InvalidUrl => {
                self.state.status =
                    StatusLine::new(DownloadError::InvalidUrl.to_string(), Tone::Error);
                return false;
            }
            Validation::InvalidFolder => {
                let err = DownloadError::InvalidFolder(destination);
                self.state.status = StatusLine::new(err.to_string(), Tone::Error);
                return false;
            }
        }
        let Ok(quality) = self.state.selected_quality.parse::<Quality>() else {
            self.state.status =
                StatusLine::new(DownloadError::NoQualitySelected.to_string(), Tone::Error);
            return false;
        };

        let request = DownloadRequest { url, destination, quality };
        tracing::info!(
            url = %request.url,
            quality = %request.quality,
            dest = %request.destination.display(),
            "starting download"
        );

        self.state.download = DownloadStatus::Downloading;
        self.state.set_progress(0.0);

        let (tx, rx) = unbounded_channel();
        self.download_rx = Some(rx);
        let backend = Arc::clone(&self.backend);
        let preflight = Arc::clone(&self.preflight);
        let notify = Arc::clone(&self.notify);
        self.runtime.spawn(async move {
            spawn_download(request, backend.as_ref(), preflight.as_ref(), tx).await;
            notify();
        });
        true
    }

    /// Drains worker messages into the state. Call once per frame.
    pub fn poll(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();

        while let Ok(msg) = self.events_rx.try_recv() {
            self.apply_event(msg, &mut effects);
        }

        if let Some(rx) = self.download_rx.as_mut() {
            let mut finished = None;
            loop {
                match rx.try_recv() {
                    Ok(DownloadMessage::Progress(pct)) => self.state.set_progress(pct),
                    Ok(DownloadMessage::Completed { title }) => {
                        finished = Some(Ok(title));
                        break;
                    }
                    Ok(DownloadMessage::Failed(err)) => {
                        finished = Some(Err(err));
                        break;
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        finished = Some(Err(DownloadError::Io(
                            "download worker stopped unexpectedly".to_owned(),
                        )));
                        break;
                    }
                }
            }
            if let Some(outcome) = finished {
                self.download_rx = None;
                self.finish_download(outcome, &mut effects);
            }
        }

        effects
    }

    fn apply_event(&mut self, msg: Message, effects: &mut Vec<Effect>) {
        let current = self.generation.load(Ordering::SeqCst);
        match msg {
            Message::Qualities { generation, .. } | Message::Thumbnail { generation, .. }
                if generation != current =>
            {
                tracing::debug!(generation, current, "dropping result for a stale URL");
            }
            Message::Qualities { generation, labels, info } => {
                self.state.fetching = false;
                if labels.is_empty() {
                    self.state.clear_qualities();
                    self.state.status =
                        StatusLine::new("No qualities available for this URL.", Tone::Error);
                    return;
                }
                self.state.selected_quality = labels[0].clone();
                self.state.qualities = labels;
                let info = info.unwrap_or_default();
                self.state.status = if info.title.is_empty() {
                    StatusLine::new("Qualities updated. Ready to download.", Tone::Ok)
                } else {
                    let text =
                        format!("Qualities updated for \"{}\". Ready to download.", info.title);
                    StatusLine::new(text, Tone::Ok)
                };
                self.state.title = Some(info.title).filter(|t| !t.is_empty());
                effects.push(Effect::Thumbnail(None));
                if let Some(thumb_url) = info.thumbnail {
                    self.spawn_thumbnail(generation, thumb_url);
                }
            }
            Message::Thumbnail { image, .. } => effects.push(Effect::Thumbnail(image)),
        }
    }

    fn spawn_thumbnail(&self, generation: u64, thumb_url: String) {
        let tx = self.events_tx.clone();
        let notify = Arc::clone(&self.notify);
        self.runtime.spawn_blocking(move || {
            let image = thumbnail::fetch_thumbnail(&thumb_url);
            if image.is_none() {
                tracing::debug!(url = %thumb_url, "no thumbnail preview");
            }
            let _ = tx.send(Message::Thumbnail { generation, image });
            notify();
        });
    }

    fn finish_download(
        &mut self,
        outcome: Result<String, DownloadError>,
        effects: &mut Vec<Effect>,
    ) {
        match outcome {
            Ok(_title) => {
                self.state.download = DownloadStatus::Completed;
                self.state.set_progress(100.0);
                let msg = "Download Complete!";
                self.state.progress_text = msg.to_owned();
                self.url_changed(String::new());
                self.state.status = StatusLine::new("Enter a URL to start.", Tone::Info);
                effects.push(Effect::Thumbnail(None));
                effects.push(Effect::Dialog(Dialog {
                    level: DialogLevel::Info,
                    title: "Download Complete".to_owned(),
                    message: msg.to_owned(),
                }));
            }
            Err(err) => {
                self.state.download = DownloadStatus::Failed;
                self.state.set_progress(0.0);
                effects.push(Effect::Dialog(Dialog {
                    level: DialogLevel::Error,
                    title: err.title().to_owned(),
                    message: err.to_string(),
                }));
            }
        }
    }
}
