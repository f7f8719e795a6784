//! HTTP probing of candidate archive URLs.
//!
//! Resolution only ever needs two answers from the network: "does this URL
//! serve something" and "what filename does it serve under". Both sit behind
//! [`Probe`] so resolution and assembly can run against an in-memory fake.

use crate::core::error::KgCwlError;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_DISPOSITION;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

pub trait Probe {
    /// True when a request for `url` ends in a success status after redirects.
    fn exists(&self, url: &str) -> bool;

    /// Filename announced by the server in `Content-Disposition`, if any.
    fn served_filename(&self, url: &str) -> Option<String>;
}

pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, KgCwlError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("kg-cwl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KgCwlError::Network(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Probe for HttpProbe {
    fn exists(&self, url: &str) -> bool {
        match self.client.head(url).send() {
            Ok(resp) => {
                debug!(url, status = %resp.status(), "probed archive url");
                resp.status().is_success()
            }
            Err(e) => {
                warn!(url, error = %e, "archive url unreachable");
                false
            }
        }
    }

    fn served_filename(&self, url: &str) -> Option<String> {
        let resp = match self.client.head(url).send() {
            Ok(resp) => resp,
            Err(e) => {
                warn!(url, error = %e, "could not query served filename");
                return None;
            }
        };
        resp.headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_disposition)
    }
}

static EXT_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)filename\*\s*=\s*(?:[a-z0-9_-]+'[a-z-]*')?"?([^";]+)"?"#).unwrap()
});

static PLAIN_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)filename\s*=\s*"?([^";]+)"?"#).unwrap());

/// Extract the filename from a `Content-Disposition` header value.
///
/// The RFC 5987 `filename*=` form wins over plain `filename=` and is
/// percent-decoded. Any directory part is dropped so the result is always a
/// bare file name.
pub fn parse_content_disposition(value: &str) -> Option<String> {
    let extended = EXT_FILENAME
        .captures(value)
        .and_then(|caps| caps.get(1))
        .and_then(|m| urlencoding::decode(m.as_str().trim()).ok())
        .map(|decoded| decoded.into_owned());
    let found = match extended {
        Some(decoded) => decoded,
        None => PLAIN_FILENAME
            .captures(value)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())?,
    };
    let raw = found.as_str();

    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
