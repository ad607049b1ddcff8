use std::path::Path;

/// Host fragments a link must contain to be accepted.
const KNOWN_HOSTS: &[&str] = &["youtube.com", "youtu.be"];

/// Outcome of checking the form inputs before anything is spawned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Validation {
    Ok,
    InvalidUrl,
    InvalidFolder,
}

/// True when the link looks like one of the supported platform's URLs.
pub fn is_supported_url(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty() && url.starts_with("http") && KNOWN_HOSTS.iter().any(|h| url.contains(h))
}

/// Checks the URL first, then that the destination is an existing directory.
pub fn validate(url: &str, destination: &Path) -> Validation {
    if !is_supported_url(url) {
        return Validation::InvalidUrl;
    }
    if !destination.is_dir() {
        return Validation::InvalidFolder;
    }
    Validation::Ok
}
