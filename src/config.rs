//! Startup configuration: where the external binaries live and which
//! endpoint proves the network is up.

use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

const DEFAULT_PROBE_URL: &str = "https://www.google.com";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(target_os = "windows")]
const WELL_KNOWN_FFMPEG_DIRS: &[&str] = &[
    "C:\\Program Files\\ffmpeg-master-latest-win64-gpl\\bin",
    "C:\\Program Files\\ffmpeg\\bin",
    "C:\\ffmpeg\\bin",
];
#[cfg(target_os = "macos")]
const WELL_KNOWN_FFMPEG_DIRS: &[&str] = &["/opt/homebrew/bin", "/usr/local/bin"];
#[cfg(all(unix, not(target_os = "macos")))]
const WELL_KNOWN_FFMPEG_DIRS: &[&str] = &["/usr/bin", "/usr/local/bin", "/app/bin"];

#[derive(Clone, Debug)]
pub struct Config {
    /// yt-dlp executable to spawn
    pub ytdlp: PathBuf,
    /// Resolved ffmpeg executable, if any was found
    pub ffmpeg: Option<PathBuf>,
    /// Endpoint for the connectivity probe
    pub probe_url: String,
    pub probe_timeout: Duration,
}

fn exe_name(base: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{base}.exe")
    } else {
        base.to_owned()
    }
}

/// First directory in `path_var` containing `name` as a file.
pub fn search_path(name: &str, path_var: Option<&std::ffi::OsStr>) -> Option<PathBuf> {
    let path_var = path_var?;
    env::split_paths(path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Accepts either the binary itself or the directory holding it.
fn ffmpeg_from_setting(setting: &Path) -> Option<PathBuf> {
    if setting.is_dir() {
        let candidate = setting.join(exe_name("ffmpeg"));
        return candidate.is_file().then_some(candidate);
    }
    setting.is_file().then(|| setting.to_path_buf())
}

impl Config {
    /// Resolves every setting from the process environment.
    pub fn resolve() -> Self {
        let path_var = env::var_os("PATH");
        Self::resolve_with(|key| env::var(key).ok(), path_var.as_deref())
    }

    /// Resolution against an explicit lookup, so tests don't touch the real environment.
    pub fn resolve_with(
        lookup: impl Fn(&str) -> Option<String>,
        path_var: Option<&std::ffi::OsStr>,
    ) -> Self {
        let ytdlp_name = exe_name("yt-dlp");
        let ytdlp = lookup("YTDLP_PATH")
            .map(PathBuf::from)
            .or_else(|| search_path(&ytdlp_name, path_var))
            .unwrap_or_else(|| PathBuf::from(&ytdlp_name));

        let ffmpeg_name = exe_name("ffmpeg");
        let ffmpeg = match lookup("FFMPEG_LOCATION") {
            Some(setting) => ffmpeg_from_setting(Path::new(&setting)),
            None => search_path(&ffmpeg_name, path_var).or_else(|| {
                WELL_KNOWN_FFMPEG_DIRS
                    .iter()
                    .map(|dir| Path::new(dir).join(&ffmpeg_name))
                    .find(|p| p.is_file())
            }),
        };

        let probe_url = lookup("CONNECTIVITY_PROBE_URL")
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PROBE_URL.to_owned());

        Self {
            ytdlp,
            ffmpeg,
            probe_url,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    /// Directory handed to the extractor's `--ffmpeg-location`.
    pub fn ffmpeg_dir(&self) -> Option<&Path> {
        self.ffmpeg.as_deref().and_then(Path::parent)
    }
}
