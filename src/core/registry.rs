//! Blocking client for the EBRAINS model-validation registry.

use crate::core::error::KgCwlError;
use crate::core::instance::{ModelInstance, location_in};
use reqwest::blocking::{Client, Response};
use reqwest::{StatusCode, Url};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Source of model instance records.
pub trait Registry {
    fn fetch_instance(&self, instance_id: &str) -> Result<ModelInstance, KgCwlError>;

    /// Fetch a lazy `@id` handle and return the concrete URL it points at.
    fn resolve_handle(&self, iri: &str) -> Result<String, KgCwlError>;
}

/// An authenticated registry session. Construction validates the token and
/// installs it as a default `Authorization: Bearer` header.
///
/// Because every request carries the token, lazy handles are only fetched
/// from the registry's own origin or from an https host on the handle list.
pub struct RegistryClient {
    client: Client,
    base_url: String,
    handle_hosts: Vec<String>,
}

impl RegistryClient {
    pub fn authenticate(
        base_url: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, KgCwlError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(KgCwlError::Authentication("empty bearer token".into()));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            KgCwlError::Authentication("token contains characters not allowed in a header".into())
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .user_agent(concat!("kg-cwl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KgCwlError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            handle_hosts: Vec::new(),
        })
    }

    /// Extra https hosts allowed to serve lazy handles.
    pub fn with_handle_hosts(mut self, hosts: &[String]) -> Self {
        self.handle_hosts = hosts
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        self
    }

    /// The id is encoded as a single path segment.
    pub fn instance_url(&self, instance_id: &str) -> String {
        format!(
            "{}/models/query/instances/{}",
            self.base_url,
            urlencoding::encode(instance_id)
        )
    }

    /// Whether the token may be sent to `iri`.
    pub fn handle_allowed(&self, iri: &str) -> bool {
        let Ok(target) = Url::parse(iri) else {
            return false;
        };
        let Some(host) = target.host_str().map(str::to_ascii_lowercase) else {
            return false;
        };
        if Url::parse(&self.base_url).is_ok_and(|base| base.origin() == target.origin()) {
            return true;
        }
        target.scheme() == "https" && self.handle_hosts.iter().any(|h| *h == host)
    }

    fn get_json(&self, url: &str, what: &str) -> Result<Value, KgCwlError> {
        debug!(url, "registry GET");
        let resp = self.client.get(url).send()?;
        let resp = check_status(resp, what)?;
        let body = resp.text()?;
        serde_json::from_str(&body)
            .map_err(|e| KgCwlError::MalformedRecord(format!("{}: {}", what, e)))
    }
}

fn check_status(resp: Response, what: &str) -> Result<Response, KgCwlError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let detail = resp.text().unwrap_or_default();
    Err(error_for_status(status, what, &detail))
}

/// Map a non-success registry status onto the error taxonomy.
pub fn error_for_status(status: StatusCode, what: &str, detail: &str) -> KgCwlError {
    let detail = crate::core::redact::redact_string(detail.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => KgCwlError::Authentication(format!(
            "registry refused the token ({}) for {}",
            status.as_u16(),
            what
        )),
        StatusCode::NOT_FOUND => KgCwlError::NotFound(what.to_string()),
        _ if detail.is_empty() => {
            KgCwlError::Network(format!("registry returned {} for {}", status.as_u16(), what))
        }
        _ => KgCwlError::Network(format!(
            "registry returned {} for {}: {}",
            status.as_u16(),
            what,
            detail
        )),
    }
}

impl Registry for RegistryClient {
    fn fetch_instance(&self, instance_id: &str) -> Result<ModelInstance, KgCwlError> {
        let what = format!("model instance {}", instance_id);
        let value = self.get_json(&self.instance_url(instance_id), &what)?;
        let record = serde_json::from_value(value)
            .map_err(|e| KgCwlError::MalformedRecord(format!("{}: {}", what, e)))?;
        let instance = ModelInstance::from_record(record)?;
        info!(
            instance = %instance.id,
            model = ?instance.model_id,
            version = ?instance.version,
            repositories = instance.repositories.len(),
            inputs = instance.inputs.len(),
            outputs = instance.outputs.len(),
            "fetched model instance"
        );
        Ok(instance)
    }

    fn resolve_handle(&self, iri: &str) -> Result<String, KgCwlError> {
        let what = format!("reference {}", iri);
        if !self.handle_allowed(iri) {
            warn!(iri, "refusing to fetch handle from an untrusted host");
            return Err(KgCwlError::MalformedRecord(format!(
                "{} points outside the registry and the configured handle hosts",
                what
            )));
        }
        let value = self.get_json(iri, &what)?;
        location_in(&value).ok_or_else(|| {
            KgCwlError::MalformedRecord(format!("{} has no url, download_url or iri", what))
        })
    }
}
