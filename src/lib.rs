//! kg-cwl: model instance → CWL input descriptor
//!
//! Looks up a model instance in the EBRAINS model-validation registry and
//! writes the JSON descriptor a CWL workflow needs to fetch the model's code,
//! run it, and collect its outputs.
//!
//! # Flow
//!
//! One linear pass, every step fallible, no retries:
//!
//! 1. **Unauthenticated**: check `--token` and `--id` before touching the network
//! 2. **Authenticated**: build a bearer-token registry session
//! 3. **InstanceFetched**: fetch the record and resolve lazy `@id` handles
//! 4. **DescriptorBuilt**: resolve code URLs to archives, hash outputs, apply defaults
//! 5. **Written**: replace the output file in one rename
//!
//! # Examples
//!
//! ```bash
//! kg-cwl --id 5f4b0a3c-... --token "$EBRAINS_TOKEN"
//! kg-cwl --id 5f4b0a3c-... --token "$EBRAINS_TOKEN" --run "python main.py" -o report.json
//! ```
//!
//! # Crate Structure
//!
//! - [`cli`]: clap argument definitions
//! - [`core`]: registry client, URL resolution, descriptor assembly, config, errors

pub mod cli;
pub mod core;

pub use cli::Cli;

use crate::core::config::{self, Config};
use crate::core::descriptor::{self, DescriptorTemplate};
use crate::core::error::KgCwlError;
use crate::core::output;
use crate::core::probe::{HttpProbe, Probe};
use crate::core::registry::{Registry, RegistryClient};
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Everything needed after authentication to produce one descriptor file.
#[derive(Debug, Clone)]
pub struct Request {
    pub instance_id: String,
    pub instruction: Option<String>,
    pub output_path: PathBuf,
    pub template: DescriptorTemplate,
    pub from_parameters: bool,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub output_path: PathBuf,
    pub document: String,
    /// Code references left without a downloadable URL.
    pub unresolved_code: usize,
}

pub fn run() -> Result<(), KgCwlError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let quiet = cli.quiet;
    let token = cli.token.clone().unwrap_or_default();

    let outcome = execute(cli).map_err(|e| e.redacted(&token))?;

    if !quiet {
        print!("{}", outcome.document);
    }
    if outcome.unresolved_code > 0 {
        eprintln!(
            "{} {} code reference(s) could not be resolved to a downloadable archive",
            "⚠".bright_yellow(),
            outcome.unresolved_code
        );
    }
    eprintln!(
        "{} Descriptor written to {}",
        "✓".bright_green(),
        outcome.output_path.display().to_string().bright_cyan()
    );
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kg_cwl={}", level)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn required<'a>(value: Option<&'a str>) -> Option<&'a str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validate arguments, authenticate, and run the pipeline against the live
/// registry.
pub fn execute(cli: Cli) -> Result<Outcome, KgCwlError> {
    let token = required(cli.token.as_deref()).ok_or_else(|| {
        KgCwlError::Authentication("no token supplied (pass --token)".into())
    })?;
    let instance_id = required(cli.id.as_deref()).ok_or_else(|| {
        KgCwlError::ValidationError("instance ID not recognized (pass --id)".into())
    })?;

    let cwd = std::env::current_dir()?;
    let config = config::load_config(cli.config.as_deref(), &cwd)?.with_process_env();
    let request = build_request(&cli, instance_id, &config, &cwd);

    let base_url = cli
        .api_url
        .clone()
        .unwrap_or_else(|| config.registry.base_url.clone());
    let timeout = Duration::from_secs(config.registry.timeout_secs);

    let registry = RegistryClient::authenticate(&base_url, token, timeout)?
        .with_handle_hosts(&config.registry.handle_hosts);
    info!(registry = %base_url, "authenticated");
    let probe = HttpProbe::new(timeout)?;

    generate(&registry, &probe, &request)
}

/// Merge CLI flags over the loaded config.
pub fn build_request(cli: &Cli, instance_id: &str, config: &Config, cwd: &Path) -> Request {
    let mut descriptor_config = config.descriptor.clone();
    if let Some(workdir) = required(cli.workdir.as_deref()) {
        descriptor_config.workdir = Some(workdir.to_string());
    }
    let template = DescriptorTemplate::from_config(&descriptor_config, &cwd.to_string_lossy());

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.descriptor.output_file));
    let output_path = if output.is_absolute() {
        output
    } else {
        cwd.join(output)
    };

    Request {
        instance_id: instance_id.to_string(),
        instruction: cli.run.clone(),
        output_path,
        template,
        from_parameters: cli.from_parameters,
    }
}

/// Fetch, assemble, and write. Nothing touches the output path until the
/// document is complete.
pub fn generate(
    registry: &dyn Registry,
    probe: &dyn Probe,
    request: &Request,
) -> Result<Outcome, KgCwlError> {
    let instance = registry.fetch_instance(&request.instance_id)?;

    let (document, unresolved_code) = if request.from_parameters {
        (parameters_document(instance.parameters.as_deref(), &instance.id)?, 0)
    } else {
        let resolved = instance.resolve(|iri| registry.resolve_handle(iri))?;
        let built = descriptor::assemble(
            &resolved,
            request.instruction.as_deref(),
            &request.template,
            probe,
        )?;
        let unresolved = built.run.code.iter().filter(|c| c.url.is_none()).count();
        info!(
            instance = %built.id,
            code = built.run.code.len(),
            outputs = built.run.outputs.len(),
            "descriptor built"
        );
        (output::to_pretty_json(&built)?, unresolved)
    };

    output::write_atomic(&request.output_path, &document)?;
    info!(path = %request.output_path.display(), "descriptor written");

    Ok(Outcome {
        output_path: request.output_path.clone(),
        document,
        unresolved_code,
    })
}

/// Re-emit the JSON the registry stores in the instance's `parameters` field.
pub fn parameters_document(
    parameters: Option<&str>,
    instance_id: &str,
) -> Result<String, KgCwlError> {
    let raw = parameters.ok_or_else(|| {
        KgCwlError::MalformedRecord(format!("instance {} carries no parameters", instance_id))
    })?;
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
        KgCwlError::MalformedRecord(format!(
            "parameters of instance {} are not JSON ({}): {}",
            instance_id,
            e,
            output::compact_line(raw, 60)
        ))
    })?;
    output::to_pretty_json(&value)
}
