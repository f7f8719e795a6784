//! Model instance records as returned by the registry.
//!
//! The registry is loose about shapes: a repository can be one URL or a
//! list, data references can be bare strings, located objects, or lazy
//! `{"@id": ...}` handles that need a second fetch. [`RawRecord`] accepts all
//! of that; [`ModelInstance`] is the normalized form; [`ResolvedInstance`] is
//! what remains once every handle has been turned into a concrete URL.

use crate::core::error::KgCwlError;
use serde::Deserialize;
use serde_json::Value;

const LOCATION_KEYS: [&str; 3] = ["url", "download_url", "iri"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub source: Value,
    #[serde(default)]
    pub repository: Value,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub inputs: Value,
    #[serde(default)]
    pub input_data: Value,
    #[serde(default)]
    pub outputs: Value,
    #[serde(default)]
    pub output_data: Value,
    #[serde(default)]
    pub run_instruction: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Url(String),
    /// Registry IRI that must be fetched to learn the concrete URL.
    Handle(String),
}

impl Reference {
    pub fn from_value(value: &Value) -> Result<Self, KgCwlError> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Ok(Reference::Url(s.trim().to_string())),
            Value::Object(map) => {
                if let Some(url) = location_in(value) {
                    return Ok(Reference::Url(url));
                }
                match map.get("@id").and_then(Value::as_str) {
                    Some(iri) if !iri.trim().is_empty() => {
                        Ok(Reference::Handle(iri.trim().to_string()))
                    }
                    _ => Err(KgCwlError::MalformedRecord(format!(
                        "reference object has neither a location nor an @id: {}",
                        value
                    ))),
                }
            }
            other => Err(KgCwlError::MalformedRecord(format!(
                "unsupported reference: {}",
                other
            ))),
        }
    }
}

/// First non-empty `url`/`download_url`/`iri` string of a JSON object.
pub fn location_in(value: &Value) -> Option<String> {
    LOCATION_KEYS.iter().find_map(|key| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

fn references(values: &[&Value]) -> Result<Vec<Reference>, KgCwlError> {
    let mut refs = Vec::new();
    for value in values {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items {
                    refs.push(Reference::from_value(item)?);
                }
            }
            single => refs.push(Reference::from_value(single)?),
        }
    }
    Ok(refs)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInstance {
    pub id: String,
    pub model_id: Option<String>,
    pub version: Option<String>,
    pub repositories: Vec<Reference>,
    pub homepage: Option<String>,
    pub inputs: Vec<Reference>,
    pub outputs: Vec<Reference>,
    pub instruction: Option<String>,
    pub parameters: Option<String>,
}

impl ModelInstance {
    pub fn from_json(body: &str) -> Result<Self, KgCwlError> {
        let raw: RawRecord = serde_json::from_str(body)
            .map_err(|e| KgCwlError::MalformedRecord(format!("instance record: {}", e)))?;
        Self::from_record(raw)
    }

    pub fn from_record(raw: RawRecord) -> Result<Self, KgCwlError> {
        let id = non_blank(raw.id).ok_or_else(|| {
            KgCwlError::ValidationError("instance record carries no identifier".into())
        })?;

        let parameters = match raw.parameters {
            Value::Null => None,
            Value::String(s) => non_blank(Some(s)),
            other => Some(other.to_string()),
        };

        Ok(Self {
            id,
            model_id: non_blank(raw.model_id),
            version: non_blank(raw.version),
            repositories: references(&[&raw.source, &raw.repository])?,
            homepage: non_blank(raw.homepage),
            inputs: references(&[&raw.inputs, &raw.input_data])?,
            outputs: references(&[&raw.outputs, &raw.output_data])?,
            instruction: non_blank(raw.run_instruction).or_else(|| non_blank(raw.instruction)),
            parameters,
        })
    }

    /// Turn every lazy handle into a concrete URL.
    pub fn resolve<F>(self, mut resolve_handle: F) -> Result<ResolvedInstance, KgCwlError>
    where
        F: FnMut(&str) -> Result<String, KgCwlError>,
    {
        let mut concrete = |refs: Vec<Reference>| -> Result<Vec<String>, KgCwlError> {
            refs.into_iter()
                .map(|r| match r {
                    Reference::Url(url) => Ok(url),
                    Reference::Handle(iri) => resolve_handle(&iri),
                })
                .collect()
        };

        let mut repositories = concrete(self.repositories)?;
        if repositories.is_empty() {
            if let Some(homepage) = self.homepage {
                repositories.push(homepage);
            }
        }
        let inputs = concrete(self.inputs)?;
        let outputs = concrete(self.outputs)?;

        Ok(ResolvedInstance {
            id: self.id,
            repositories,
            inputs,
            outputs,
            instruction: self.instruction,
        })
    }
}

/// What descriptor assembly consumes: concrete URLs only, with the homepage
/// already folded into `repositories` when the record had none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedInstance {
    pub id: String,
    pub repositories: Vec<String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub instruction: Option<String>,
}
