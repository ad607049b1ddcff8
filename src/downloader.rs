use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::DownloadError;
use crate::formats::{self, FormatSelection, MERGE_CONTAINER, VideoInfo};
use crate::model::DownloadRequest;
use crate::preflight::Preflight;
use crate::progress::{ProgressEvent, ProgressTracker};

/// Everything the extractor needs for one paired download.
#[derive(Clone, Debug)]
pub struct DownloadPlan {
    pub url: String,
    pub selection: FormatSelection,
    /// Container the two streams are merged into
    pub merge_container: &'static str,
    /// Folder the merged file lands in, passed apart from the template
    pub output_dir: PathBuf,
    pub output_template: &'static str,
    /// Directory holding the merge binary
    pub ffmpeg_location: Option<PathBuf>,
}

/// Seam to the external extraction/download library.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Metadata and format list for a URL, without downloading.
    async fn extract_info(&self, url: &str) -> Result<VideoInfo, DownloadError>;

    /// Runs the transfer and merge, calling `hook` for every progress report.
    async fn download(
        &self,
        plan: &DownloadPlan,
        hook: &mut (dyn FnMut(ProgressEvent) + Send),
    ) -> Result<(), DownloadError>;
}

/// Messages posted by the worker; `Completed` or `Failed` is always last.
#[derive(Debug)]
pub enum DownloadMessage {
    Progress(f32),
    Completed { title: String },
    Failed(DownloadError),
}

/// File name template, relative to [`DownloadPlan::output_dir`].
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Quality labels for a URL; any extraction failure degrades to an empty list.
pub async fn fetch_quality_options(
    backend: &dyn MediaBackend,
    url: &str,
) -> (Vec<String>, Option<VideoInfo>) {
    match backend.extract_info(url).await {
        Ok(info) => {
            let labels = formats::quality_options(&info.formats)
                .into_iter()
                .map(|q| q.to_string())
                .collect();
            (labels, Some(info))
        }
        Err(e) => {
            tracing::warn!(%url, error = %e, "error fetching qualities");
            (Vec::new(), None)
        }
    }
}

/// Drives one download to completion or failure, posting progress on `tx`.
pub async fn spawn_download(
    request: DownloadRequest,
    backend: &dyn MediaBackend,
    preflight: &dyn Preflight,
    tx: UnboundedSender<DownloadMessage>,
) {
    let result = run_download(&request, backend, preflight, &tx).await;
    // Send errors mean the interface went away; nothing left to report to.
    let _ = match result {
        Ok(title) => {
            tracing::info!(%title, "download complete");
            tx.send(DownloadMessage::Completed { title })
        }
        Err(err) => {
            tracing::error!(url = %request.url, error = %err, "download failed");
            if err.kind() == crate::error::ErrorKind::ExtractionOrTransferFailure {
                let _ = tx.send(DownloadMessage::Progress(0.0));
            }
            tx.send(DownloadMessage::Failed(err))
        }
    };
}

async fn run_download(
    request: &DownloadRequest,
    backend: &dyn MediaBackend,
    preflight: &dyn Preflight,
    tx: &UnboundedSender<DownloadMessage>,
) -> Result<String, DownloadError> {
    let ffmpeg = preflight.merger()?;
    preflight.connectivity().await?;

    tokio::fs::create_dir_all(&request.destination).await?;

    let info = backend.extract_info(&request.url).await?;
    let selection = formats::select_format(&info.formats, &request.quality.to_string())?;
    tracing::info!(
        title = %info.title,
        format = %selection.format_spec(),
        ext = %selection.ext(),
        protocol = %selection.protocol(),
        "formats selected"
    );

    let plan = DownloadPlan {
        url: request.url.clone(),
        merge_container: MERGE_CONTAINER,
        output_dir: request.destination.clone(),
        output_template: OUTPUT_TEMPLATE,
        ffmpeg_location: ffmpeg.parent().map(Path::to_path_buf),
        selection,
    };

    let mut tracker = ProgressTracker::new(plan.selection.stream_count());
    let mut hook = |event: ProgressEvent| {
        if let Some(pct) = tracker.observe(event) {
            let _ = tx.send(DownloadMessage::Progress(pct));
        }
    };
    backend.download(&plan, &mut hook).await?;

    if !tracker.is_complete() {
        tracing::debug!("extractor exited without a final finished report");
        if let Some(pct) = tracker.complete() {
            let _ = tx.send(DownloadMessage::Progress(pct));
        }
    }
    Ok(info.title)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::formats::tests::{audio, sample_formats, video};
    use crate::model::Quality;
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };
    use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

    /// In-memory stand-in for the extractor.
    pub(crate) struct FakeBackend {
        pub info: Result<VideoInfo, DownloadError>,
        /// Served instead of `info` once the first extraction has been answered
        pub refetch: Option<Result<VideoInfo, DownloadError>>,
        extractions: AtomicUsize,
        pub events: Vec<ProgressEvent>,
        pub outcome: Result<(), DownloadError>,
        pub plans: Mutex<Vec<DownloadPlan>>,
        /// Held until the test lets the transfer finish
        pub gate: Option<tokio::sync::Semaphore>,
    }

    impl FakeBackend {
        pub(crate) fn new(events: Vec<ProgressEvent>) -> Self {
            Self {
                info: Ok(VideoInfo {
                    title: "Clip".into(),
                    thumbnail: None,
                    formats: sample_formats(),
                }),
                refetch: None,
                extractions: AtomicUsize::new(0),
                events,
                outcome: Ok(()),
                plans: Mutex::new(Vec::new()),
                gate: None,
            }
        }
    }

    #[async_trait]
    impl MediaBackend for FakeBackend {
        async fn extract_info(&self, _url: &str) -> Result<VideoInfo, DownloadError> {
            match &self.refetch {
                Some(later) if self.extractions.fetch_add(1, Ordering::SeqCst) > 0 => later.clone(),
                _ => self.info.clone(),
            }
        }

        async fn download(
            &self,
            plan: &DownloadPlan,
            hook: &mut (dyn FnMut(ProgressEvent) + Send),
        ) -> Result<(), DownloadError> {
            self.plans.lock().unwrap().push(plan.clone());
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.unwrap();
            }
            for event in &self.events {
                hook(*event);
            }
            self.outcome.clone()
        }
    }

    pub(crate) struct FakePreflight {
        pub merger: Result<PathBuf, DownloadError>,
        pub online: bool,
    }

    impl FakePreflight {
        pub(crate) fn ok() -> Self {
            Self { merger: Ok(PathBuf::from("/opt/ffmpeg/bin/ffmpeg")), online: true }
        }
    }

    #[async_trait]
    impl Preflight for FakePreflight {
        fn merger(&self) -> Result<PathBuf, DownloadError> {
            self.merger.clone()
        }

        async fn connectivity(&self) -> Result<(), DownloadError> {
            if self.online { Ok(()) } else { Err(DownloadError::NoConnectivity) }
        }
    }

    fn request(dest: &Path, quality: u32) -> DownloadRequest {
        DownloadRequest {
            url: "https://www.youtube.com/watch?v=abc".into(),
            destination: dest.to_path_buf(),
            quality: Quality(quality),
        }
    }

    fn drain(rx: &mut UnboundedReceiver<DownloadMessage>) -> Vec<DownloadMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn single_stream_events(downloaded: &[u64], total: Option<u64>) -> Vec<ProgressEvent> {
        downloaded
            .iter()
            .map(|b| ProgressEvent::downloading(*b, total))
            .chain([ProgressEvent::finished(downloaded.last().copied().unwrap_or(0))])
            .collect()
    }

    fn progress_values(msgs: &[DownloadMessage]) -> Vec<f32> {
        msgs.iter()
            .filter_map(|m| match m {
                DownloadMessage::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    fn failure_count(msgs: &[DownloadMessage]) -> usize {
        msgs.iter().filter(|m| matches!(m, DownloadMessage::Failed(_))).count()
    }

    #[tokio::test]
    async fn reports_progress_then_completion() {
        let dir = tempfile::tempdir().unwrap();
        // Both streams report; the first is the video
        let mut events = single_stream_events(&[0, 250, 500, 1000], Some(1000));
        events.extend(single_stream_events(&[0, 1000], Some(1000)));
        let backend = FakeBackend::new(events);
        let (tx, mut rx) = unbounded_channel();

        spawn_download(request(dir.path(), 1080), &backend, &FakePreflight::ok(), tx).await;

        let msgs = drain(&mut rx);
        assert_eq!(progress_values(&msgs), [0.0, 12.5, 25.0, 50.0, 100.0]);
        assert!(matches!(
            msgs.last(),
            Some(DownloadMessage::Completed { title }) if title == "Clip"
        ));

        let plans = backend.plans.lock().unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].selection.format_spec(), "137+140");
        assert_eq!(plans[0].merge_container, "mp4");
        assert_eq!(plans[0].output_dir, dir.path());
        assert_eq!(plans[0].output_template, "%(title)s.%(ext)s");
        assert_eq!(plans[0].ffmpeg_location, Some(PathBuf::from("/opt/ffmpeg/bin")));
    }

    #[tokio::test]
    async fn unknown_size_only_reports_final_100() {
        let dir = tempfile::tempdir().unwrap();
        let mut events = single_stream_events(&[10, 20], None);
        events.extend(single_stream_events(&[10], Some(0)));
        let backend = FakeBackend::new(events);
        let (tx, mut rx) = unbounded_channel();

        spawn_download(request(dir.path(), 1080), &backend, &FakePreflight::ok(), tx).await;

        let msgs = drain(&mut rx);
        assert_eq!(progress_values(&msgs), [50.0, 100.0]);
        assert!(matches!(msgs.last(), Some(DownloadMessage::Completed { .. })));
    }

    #[tokio::test]
    async fn silent_success_still_reaches_100() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(Vec::new());
        let (tx, mut rx) = unbounded_channel();

        spawn_download(request(dir.path(), 144), &backend, &FakePreflight::ok(), tx).await;

        let msgs = drain(&mut rx);
        assert_eq!(progress_values(&msgs), [100.0]);
        assert!(matches!(msgs.last(), Some(DownloadMessage::Completed { .. })));
    }

    #[tokio::test]
    async fn transfer_failure_resets_progress_and_fails_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FakeBackend::new(vec![ProgressEvent::downloading(500, Some(1000))]);
        backend.outcome = Err(DownloadError::Transfer("HTTP Error 403: Forbidden".into()));
        let (tx, mut rx) = unbounded_channel();

        spawn_download(request(dir.path(), 720), &backend, &FakePreflight::ok(), tx).await;

        let msgs = drain(&mut rx);
        assert_eq!(progress_values(&msgs), [25.0, 0.0]);
        assert_eq!(failure_count(&msgs), 1);
        assert!(matches!(
            msgs.last(),
            Some(DownloadMessage::Failed(DownloadError::Transfer(_)))
        ));
    }

    #[tokio::test]
    async fn extraction_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FakeBackend::new(Vec::new());
        backend.info = Err(DownloadError::Extraction("Video unavailable".into()));
        let (tx, mut rx) = unbounded_channel();

        spawn_download(request(dir.path(), 720), &backend, &FakePreflight::ok(), tx).await;

        let msgs = drain(&mut rx);
        assert_eq!(progress_values(&msgs), [0.0]);
        assert_eq!(failure_count(&msgs), 1);
        assert!(matches!(
            msgs.last(),
            Some(DownloadMessage::Failed(DownloadError::Extraction(_)))
        ));
        assert!(backend.plans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_quality_fails_without_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(Vec::new());
        let (tx, mut rx) = unbounded_channel();

        spawn_download(request(dir.path(), 240), &backend, &FakePreflight::ok(), tx).await;

        let msgs = drain(&mut rx);
        assert!(matches!(
            msgs.last(),
            Some(DownloadMessage::Failed(DownloadError::Format(_)))
        ));
        assert!(backend.plans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn preflight_failures_skip_the_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new(Vec::new());

        let (tx, mut rx) = unbounded_channel();
        let no_ffmpeg = FakePreflight { merger: Err(DownloadError::MergerMissing), online: true };
        spawn_download(request(dir.path(), 720), &backend, &no_ffmpeg, tx).await;
        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 1);
        assert!(matches!(msgs[0], DownloadMessage::Failed(DownloadError::MergerMissing)));

        let (tx, mut rx) = unbounded_channel();
        let offline = FakePreflight { online: false, ..FakePreflight::ok() };
        spawn_download(request(dir.path(), 720), &backend, &offline, tx).await;
        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 1);
        assert!(matches!(msgs[0], DownloadMessage::Failed(DownloadError::NoConnectivity)));

        assert!(backend.plans.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn creates_missing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let backend = FakeBackend::new(Vec::new());
        let (tx, _rx) = unbounded_channel();

        spawn_download(request(&nested, 720), &backend, &FakePreflight::ok(), tx).await;
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn quality_fetch_degrades_to_empty() {
        let backend = FakeBackend::new(Vec::new());
        let (labels, info) = fetch_quality_options(&backend, "https://youtu.be/abc").await;
        assert_eq!(labels, ["144p", "360p", "720p", "1080p"]);
        assert!(info.is_some());

        let mut failing = FakeBackend::new(Vec::new());
        failing.info = Err(DownloadError::Extraction("Unsupported URL".into()));
        let (labels, info) = fetch_quality_options(&failing, "https://youtu.be/abc").await;
        assert!(labels.is_empty());
        assert!(info.is_none());
    }

    #[tokio::test]
    async fn duplicate_heights_yield_distinct_labels() {
        let mut backend = FakeBackend::new(Vec::new());
        backend.info = Ok(VideoInfo {
            title: "Dupes".into(),
            thumbnail: None,
            formats: vec![
                video("a", "mp4", 720),
                video("b", "webm", 720),
                video("c", "mp4", 360),
                audio("d", "m4a"),
            ],
        });
        let (labels, _) = fetch_quality_options(&backend, "https://youtu.be/abc").await;
        assert_eq!(labels, ["360p", "720p"]);
    }
}
