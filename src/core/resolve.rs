//! Code-location URL resolution.
//!
//! A repository URL stored in the registry usually points at a human-facing
//! page. The workflow engine needs something it can download, so each URL is
//! classified into an [`ArchiveStrategy`] and rewritten to a direct archive
//! link. `None` means the URL could not be resolved and must not be fetched.

use crate::core::probe::Probe;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

pub const MODELDB_HOSTS: [&str; 3] = [
    "senselab.med.yale.edu",
    "modeldb.science",
    "modeldb.yale.edu",
];
pub const MODELDB_DOWNLOAD_BASE: &str = "https://modeldb.science/eavBinDown";
pub const GITHUB_PREFIX: &str = "https://github.com/";

/// Branches tried, in order, for a bare GitHub repository URL.
pub const GITHUB_DEFAULT_BRANCHES: [&str; 2] = ["master", "main"];

const RELEASE_SEGMENT: &str = "releases/tag/";
const TAG_ARCHIVE_SEGMENT: &str = "archive/refs/tags/";

static FIRST_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveStrategy {
    ModelDb,
    GithubRelease,
    GithubHomepage,
    Passthrough,
}

impl ArchiveStrategy {
    /// First match wins; the order here is the precedence.
    pub fn classify(url: &str) -> Self {
        if host_of(url).is_some_and(|host| MODELDB_HOSTS.contains(&host.as_str())) {
            ArchiveStrategy::ModelDb
        } else if url.contains(RELEASE_SEGMENT) {
            ArchiveStrategy::GithubRelease
        } else if url.starts_with(GITHUB_PREFIX) {
            ArchiveStrategy::GithubHomepage
        } else {
            ArchiveStrategy::Passthrough
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveStrategy::ModelDb => "modeldb",
            ArchiveStrategy::GithubRelease => "github_release",
            ArchiveStrategy::GithubHomepage => "github_homepage",
            ArchiveStrategy::Passthrough => "passthrough",
        }
    }

    pub fn resolve(self, url: &str, probe: &dyn Probe) -> Option<String> {
        match self {
            ArchiveStrategy::ModelDb => modeldb_download_url(url),
            ArchiveStrategy::GithubRelease => {
                let candidate = github_release_archive(url);
                reachable(candidate, probe)
            }
            ArchiveStrategy::GithubHomepage => github_branch_archives(url)
                .into_iter()
                .find_map(|candidate| reachable(candidate, probe)),
            ArchiveStrategy::Passthrough => Some(url.to_string()),
        }
    }
}

/// Classify `url` and resolve it to a downloadable archive URL.
pub fn resolve_archive_url(url: &str, probe: &dyn Probe) -> Option<String> {
    let url = url.trim();
    let strategy = ArchiveStrategy::classify(url);
    let resolved = strategy.resolve(url, probe);
    match &resolved {
        Some(archive) => {
            debug!(url, strategy = strategy.as_str(), archive = %archive, "resolved code url")
        }
        None => warn!(url, strategy = strategy.as_str(), "code url left unresolved"),
    }
    resolved
}

fn reachable(candidate: String, probe: &dyn Probe) -> Option<String> {
    if probe.exists(&candidate) {
        Some(candidate)
    } else {
        None
    }
}

/// Lower-cased host of an absolute URL, without port or credentials.
fn host_of(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit('@').next()?;
    let host = host_port.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

fn modeldb_download_url(url: &str) -> Option<String> {
    let model_id = FIRST_NUMBER.find(url)?.as_str();
    Some(format!(
        "{}?o={}&a=23&mime=application/zip",
        MODELDB_DOWNLOAD_BASE, model_id
    ))
}

fn github_release_archive(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    format!("{}.zip", trimmed.replacen(RELEASE_SEGMENT, TAG_ARCHIVE_SEGMENT, 1))
}

fn github_branch_archives(url: &str) -> Vec<String> {
    let base = url.trim_end_matches('/');
    let base = base.strip_suffix(".git").unwrap_or(base);
    GITHUB_DEFAULT_BRANCHES
        .iter()
        .map(|branch| format!("{}/archive/refs/heads/{}.zip", base, branch))
        .collect()
}
