//! `MediaBackend` backed by the yt-dlp executable.

use async_trait::async_trait;
use std::{collections::VecDeque, path::PathBuf, process::Stdio};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader, Split},
    process::Command,
};

use crate::downloader::{DownloadPlan, MediaBackend};
use crate::error::DownloadError;
use crate::formats::VideoInfo;
use crate::progress::{PROGRESS_TEMPLATE, ProgressEvent, parse_progress_from_line};

const STDERR_TAIL: usize = 20;

pub struct YtDlp {
    bin: PathBuf,
}

impl YtDlp {
    pub fn new(bin: PathBuf) -> Self {
        Self { bin }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }
        cmd
    }

    fn spawn_error(&self, err: std::io::Error) -> DownloadError {
        if err.kind() == std::io::ErrorKind::NotFound {
            DownloadError::ExtractorMissing(self.bin.clone())
        } else {
            DownloadError::Io(err.to_string())
        }
    }
}

/// Arguments for a paired download of `plan`.
pub fn download_args(plan: &DownloadPlan) -> Vec<String> {
    let mut args = vec![
        "-f".to_owned(),
        plan.selection.format_spec(),
        "--merge-output-format".to_owned(),
        plan.merge_container.to_owned(),
    ];

    if let Some(dir) = &plan.ffmpeg_location {
        args.push("--ffmpeg-location".to_owned());
        args.push(dir.display().to_string());
    }

    args.push("--no-playlist".to_owned());
    args.push("--encoding".to_owned());
    args.push("utf-8".to_owned());
    args.push("--newline".to_owned());
    args.push("--progress-template".to_owned());
    args.push(PROGRESS_TEMPLATE.to_owned());

    // The folder goes through -P so it is never read as template fields
    args.push("-P".to_owned());
    args.push(plan.output_dir.display().to_string());
    args.push("-o".to_owned());
    args.push(plan.output_template.to_owned());
    args.push(plan.url.clone());
    args
}

/// Most useful line of the extractor's stderr for a user-facing message.
pub fn error_summary(stderr_lines: &[String]) -> String {
    stderr_lines
        .iter()
        .rev()
        .find_map(|l| l.trim().strip_prefix("ERROR:").map(|m| m.trim().to_owned()))
        .or_else(|| {
            stderr_lines
                .iter()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_owned())
        })
        .unwrap_or_else(|| "yt-dlp exited with an error".to_owned())
}

/// Next output line, decoded lossily; titles may arrive in a legacy code page.
async fn next_line<R: AsyncBufRead + Unpin>(
    segments: &mut Split<R>,
) -> std::io::Result<Option<String>> {
    let raw = segments.next_segment().await?;
    Ok(raw.map(|bytes| String::from_utf8_lossy(&bytes).trim_end_matches('\r').to_owned()))
}

async fn collect_tail<R: AsyncRead + Unpin>(reader: R) -> Vec<String> {
    let mut segments = BufReader::new(reader).split(b'\n');
    let mut tail = VecDeque::with_capacity(STDERR_TAIL);
    while let Ok(Some(line)) = next_line(&mut segments).await {
        tracing::debug!(target: "yt-dlp", "{}", line);
        if tail.len() == STDERR_TAIL {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into()
}

#[async_trait]
impl MediaBackend for YtDlp {
    async fn extract_info(&self, url: &str) -> Result<VideoInfo, DownloadError> {
        let output = self
            .command()
            .args(["--dump-single-json", "--no-playlist", "--no-warnings"])
            .args(["--encoding", "utf-8", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<String> = stderr.lines().map(str::to_owned).collect();
            return Err(DownloadError::Extraction(error_summary(&lines)));
        }

        let info: VideoInfo = serde_json::from_slice(&output.stdout)
            .map_err(|e| DownloadError::Extraction(format!("unreadable metadata: {e}")))?;
        if info.formats.is_empty() {
            return Err(DownloadError::Extraction("no formats found".to_owned()));
        }
        Ok(info)
    }

    async fn download(
        &self,
        plan: &DownloadPlan,
        hook: &mut (dyn FnMut(ProgressEvent) + Send),
    ) -> Result<(), DownloadError> {
        let args = download_args(plan);
        tracing::info!(bin = %self.bin.display(), ?args, "spawning yt-dlp");

        let mut child = self
            .command()
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let out = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::Io("yt-dlp stdout unavailable".to_owned()))?;
        let err = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::Io("yt-dlp stderr unavailable".to_owned()))?;
        let stderr_task = tokio::spawn(collect_tail(err));

        let mut segments = BufReader::new(out).split(b'\n');
        while let Some(line) = next_line(&mut segments).await? {
            match parse_progress_from_line(&line) {
                Some(event) => hook(event),
                None => tracing::trace!(target: "yt-dlp", "{}", line),
            }
        }

        let status = child.wait().await?;
        let stderr_lines = stderr_task.await.unwrap_or_default();
        if status.success() {
            Ok(())
        } else {
            tracing::warn!(?status, "yt-dlp exited unsuccessfully");
            Err(DownloadError::Transfer(error_summary(&stderr_lines)))
        }
    }
}
