//! The CWL input descriptor.
//!
//! [`assemble`] turns a resolved model instance into a fixed-shape
//! [`Descriptor`]. Every optional field carries a default from the
//! [`DescriptorTemplate`], so the serialized JSON never has an absent key.

use crate::core::config::DescriptorConfig;
use crate::core::error::KgCwlError;
use crate::core::instance::ResolvedInstance;
use crate::core::probe::Probe;
use crate::core::resolve::resolve_archive_url;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Longest first, so `.tar.gz` wins over `.gz`.
pub const ARCHIVE_EXTENSIONS: [&str; 7] = [
    ".tar.bz2", ".tar.gz", ".tar.xz", ".tgz", ".tbz2", ".zip", ".tar",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub id: String,
    pub workdir: String,
    pub workflow: Workflow,
    pub run: RunSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub run: Option<String>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSection {
    pub code: Vec<CodeEntry>,
    #[serde(rename = "pre-instruction")]
    pub pre_instruction: Vec<String>,
    pub instruction: String,
    pub inputs: Vec<InputEntry>,
    pub outputs: Vec<OutputEntry>,
    pub environment: Environment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeEntry {
    pub url: Option<String>,
    pub filepath: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEntry {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEntry {
    pub url: String,
    pub hash: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(rename = "pip install")]
    pub pip_install: Vec<String>,
    #[serde(rename = "module deps")]
    pub module_deps: Vec<String>,
    #[serde(rename = "profiling configuration")]
    pub profiling: Vec<String>,
}

/// Immutable defaults handed to [`assemble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorTemplate {
    pub workdir: String,
    pub instruction: String,
    pub workflow_run: Option<String>,
    pub workflow_data: Option<String>,
    pub pre_instruction: Vec<String>,
    pub pip_install: Vec<String>,
    pub module_deps: Vec<String>,
    pub profiling: Vec<String>,
}

impl DescriptorTemplate {
    /// `workdir` is the fallback used when the config leaves it unset.
    pub fn from_config(config: &DescriptorConfig, workdir: &str) -> Self {
        Self {
            workdir: config
                .workdir
                .clone()
                .filter(|w| !w.trim().is_empty())
                .unwrap_or_else(|| workdir.to_string()),
            instruction: config.instruction.clone(),
            workflow_run: config.workflow_run.clone(),
            workflow_data: config.workflow_data.clone(),
            pre_instruction: config.pre_instruction.clone(),
            pip_install: config.pip_install.clone(),
            module_deps: config.module_deps.clone(),
            profiling: config.profiling.clone(),
        }
    }
}

/// Hex MD5 of the URL's UTF-8 bytes. Used as the output's stable id.
pub fn output_hash(url: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Last path segment of a URL, ignoring query and fragment.
pub fn filename_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let path = match without_query.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, p)| p).unwrap_or(""),
        None => without_query,
    };
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

pub fn strip_archive_extension(filename: &str) -> &str {
    let lower = filename.to_ascii_lowercase();
    ARCHIVE_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext) && lower.len() > ext.len())
        .map(|ext| &filename[..filename.len() - ext.len()])
        .unwrap_or(filename)
}

fn join(workdir: &str, tail: &str) -> String {
    let base = workdir.trim_end_matches('/');
    if base.is_empty() && workdir.starts_with('/') {
        format!("/{}", tail)
    } else {
        format!("{}/{}", base, tail)
    }
}

fn code_entry(url: &str, workdir: &str, probe: &dyn Probe) -> CodeEntry {
    let Some(archive) = resolve_archive_url(url, probe) else {
        warn!(url, "no downloadable archive for code reference");
        return CodeEntry {
            url: None,
            filepath: None,
            path: None,
        };
    };

    let filename = probe
        .served_filename(&archive)
        .or_else(|| filename_from_url(&archive));

    match filename {
        Some(filename) => {
            let stem = strip_archive_extension(&filename);
            debug!(archive = %archive, filename = %filename, "code archive located");
            CodeEntry {
                filepath: Some(join(workdir, &filename)),
                path: Some(join(workdir, &format!("{}/", stem))),
                url: Some(archive),
            }
        }
        None => {
            warn!(archive = %archive, "could not determine archive filename");
            CodeEntry {
                url: Some(archive),
                filepath: None,
                path: None,
            }
        }
    }
}

/// Build the descriptor for `instance`.
///
/// `instruction` overrides both the record's instruction and the template
/// default. Fails only on the hard preconditions: no identifier, no code
/// reference, no run instruction.
pub fn assemble(
    instance: &ResolvedInstance,
    instruction: Option<&str>,
    template: &DescriptorTemplate,
    probe: &dyn Probe,
) -> Result<Descriptor, KgCwlError> {
    if instance.id.trim().is_empty() {
        return Err(KgCwlError::ValidationError(
            "model instance has no identifier".into(),
        ));
    }
    if instance.repositories.is_empty() {
        return Err(KgCwlError::ValidationError(format!(
            "model instance {} has no code repository",
            instance.id
        )));
    }

    let instruction = instruction
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| instance.instruction.as_deref())
        .unwrap_or(template.instruction.as_str())
        .trim()
        .to_string();
    if instruction.is_empty() {
        return Err(KgCwlError::ValidationError(format!(
            "model instance {} has no run instruction",
            instance.id
        )));
    }

    let workdir = template.workdir.clone();

    let code = instance
        .repositories
        .iter()
        .map(|url| code_entry(url, &workdir, probe))
        .collect();

    let inputs = instance
        .inputs
        .iter()
        .map(|url| InputEntry { url: url.clone() })
        .collect();

    let outputs = instance
        .outputs
        .iter()
        .map(|url| {
            let hash = output_hash(url);
            OutputEntry {
                url: url.clone(),
                path: join(&workdir, &format!("outputs/{}", hash)),
                hash,
            }
        })
        .collect();

    Ok(Descriptor {
        id: instance.id.clone(),
        workflow: Workflow {
            run: template.workflow_run.clone(),
            data: template.workflow_data.clone(),
        },
        run: RunSection {
            code,
            pre_instruction: template.pre_instruction.clone(),
            instruction,
            inputs,
            outputs,
            environment: Environment {
                pip_install: template.pip_install.clone(),
                module_deps: template.module_deps.clone(),
                profiling: template.profiling.clone(),
            },
        },
        workdir,
    })
}
