/// Prefix of the machine-readable progress lines requested from the extractor.
pub const PROGRESS_PREFIX: &str = "progress:";

/// `--progress-template` value producing lines [`parse_progress_from_line`] understands.
pub const PROGRESS_TEMPLATE: &str = concat!(
    "download:progress:%(progress.status)s:%(progress.downloaded_bytes)s:",
    "%(progress.total_bytes)s:%(progress.total_bytes_estimate)s",
);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Downloading,
    Finished,
}

/// One progress-hook report for the stream currently being transferred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub downloaded_bytes: u64,
    /// Exact size, or the extractor's estimate; `None` when neither is known.
    pub total_bytes: Option<u64>,
}

#[cfg(test)]
impl ProgressEvent {
    pub fn downloading(downloaded_bytes: u64, total_bytes: Option<u64>) -> Self {
        Self { phase: Phase::Downloading, downloaded_bytes, total_bytes }
    }

    pub fn finished(downloaded_bytes: u64) -> Self {
        Self { phase: Phase::Finished, downloaded_bytes, total_bytes: Some(downloaded_bytes) }
    }
}

// The template prints "NA" for missing fields, and estimates as floats.
fn parse_bytes(field: &str) -> Option<u64> {
    let field = field.trim();
    if let Ok(v) = field.parse::<u64>() {
        return Some(v);
    }
    field.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64)
}

pub fn parse_progress_from_line(line: &str) -> Option<ProgressEvent> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.split(':');
    let phase = match fields.next()?.trim() {
        "downloading" => Phase::Downloading,
        "finished" => Phase::Finished,
        _ => return None,
    };
    let downloaded_bytes = fields.next().and_then(parse_bytes).unwrap_or(0);
    let total = fields.next().and_then(parse_bytes).filter(|t| *t > 0);
    let estimate = fields.next().and_then(parse_bytes).filter(|t| *t > 0);
    Some(ProgressEvent {
        phase,
        downloaded_bytes,
        total_bytes: total.or(estimate),
    })
}

/// Turns per-stream progress events into a single non-decreasing percentage.
///
/// Each stream of a paired download gets an equal share of the bar; 100 is
/// only reported once the last stream finishes. Events with an unknown total
/// produce nothing.
#[derive(Debug)]
pub struct ProgressTracker {
    streams: usize,
    finished: usize,
    last: Option<f32>,
}

impl ProgressTracker {
    pub fn new(streams: usize) -> Self {
        Self { streams: streams.max(1), finished: 0, last: None }
    }

    /// Percentage to forward for this event, if any.
    pub fn observe(&mut self, event: ProgressEvent) -> Option<f32> {
        let pct = match event.phase {
            Phase::Downloading => {
                let total = event.total_bytes.filter(|t| *t > 0)?;
                let fraction = (event.downloaded_bytes as f64 / total as f64).clamp(0.0, 1.0);
                let done = self.finished.min(self.streams - 1) as f64;
                ((done + fraction) / self.streams as f64 * 100.0) as f32
            }
            Phase::Finished => {
                self.finished = (self.finished + 1).min(self.streams);
                self.finished as f32 / self.streams as f32 * 100.0
            }
        };
        self.emit(pct)
    }

    /// Final 100 if the extractor never reported the last stream finishing.
    pub fn complete(&mut self) -> Option<f32> {
        self.finished = self.streams;
        self.emit(100.0)
    }

    pub fn is_complete(&self) -> bool {
        self.finished >= self.streams
    }

    fn emit(&mut self, pct: f32) -> Option<f32> {
        match self.last {
            Some(last) if pct <= last => None,
            _ => {
                self.last = Some(pct);
                Some(pct)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(tracker: &mut ProgressTracker, events: &[ProgressEvent]) -> Vec<f32> {
        events.iter().filter_map(|e| tracker.observe(*e)).collect()
    }

    #[test]
    fn parses_downloading_line() {
        let ev = parse_progress_from_line("progress:downloading:250:1000:NA").unwrap();
        assert_eq!(ev, ProgressEvent::downloading(250, Some(1000)));
    }

    #[test]
    fn falls_back_to_estimate() {
        let ev = parse_progress_from_line("progress:downloading:10:NA:2048.5").unwrap();
        assert_eq!(ev.total_bytes, Some(2048));
    }

    #[test]
    fn unknown_total_is_none() {
        let ev = parse_progress_from_line("progress:downloading:10:NA:NA").unwrap();
        assert_eq!(ev.total_bytes, None);
        let ev = parse_progress_from_line("progress:downloading:10:0:0").unwrap();
        assert_eq!(ev.total_bytes, None);
    }

    #[test]
    fn parses_finished_line() {
        let ev = parse_progress_from_line("  progress:finished:1000:1000:NA  ").unwrap();
        assert_eq!(ev.phase, Phase::Finished);
    }

    #[test]
    fn ignores_other_output() {
        assert_eq!(parse_progress_from_line("[youtube] abc: Downloading webpage"), None);
        assert_eq!(parse_progress_from_line("progress:error:1:2:3"), None);
        assert_eq!(parse_progress_from_line(""), None);
    }

    #[test]
    fn single_stream_percentages() {
        let mut tracker = ProgressTracker::new(1);
        let events: Vec<_> = [0, 250, 500]
            .iter()
            .map(|b| ProgressEvent::downloading(*b, Some(1000)))
            .chain([ProgressEvent::finished(1000)])
            .collect();
        assert_eq!(run(&mut tracker, &events), [0.0, 25.0, 50.0, 100.0]);
        assert!(tracker.is_complete());
        assert_eq!(tracker.complete(), None);
    }

    #[test]
    fn full_download_then_finished_reports_100_once() {
        let mut tracker = ProgressTracker::new(1);
        let events = [
            ProgressEvent::downloading(1000, Some(1000)),
            ProgressEvent::finished(1000),
        ];
        assert_eq!(run(&mut tracker, &events), [100.0]);
    }

    #[test]
    fn unknown_total_only_reports_final_100() {
        let mut tracker = ProgressTracker::new(1);
        let events = [
            ProgressEvent::downloading(100, None),
            ProgressEvent::downloading(200, Some(0)),
            ProgressEvent::finished(300),
        ];
        assert_eq!(run(&mut tracker, &events), [100.0]);
    }

    #[test]
    fn paired_streams_never_go_backwards() {
        let mut tracker = ProgressTracker::new(2);
        let events = [
            ProgressEvent::downloading(500, Some(1000)),
            ProgressEvent::finished(1000),
            ProgressEvent::downloading(0, Some(200)),
            ProgressEvent::downloading(100, Some(200)),
            ProgressEvent::finished(200),
        ];
        assert_eq!(run(&mut tracker, &events), [25.0, 50.0, 75.0, 100.0]);
    }

    #[test]
    fn complete_fills_in_missing_finish() {
        let mut tracker = ProgressTracker::new(2);
        assert_eq!(tracker.observe(ProgressEvent::downloading(1, Some(4))), Some(12.5));
        assert_eq!(tracker.complete(), Some(100.0));
        assert!(tracker.is_complete());
    }
}
