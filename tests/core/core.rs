use kg_cwl::core::config::{Config, DescriptorConfig};
use kg_cwl::core::descriptor::{Descriptor, DescriptorTemplate};
use kg_cwl::core::error::KgCwlError;
use kg_cwl::core::instance::ModelInstance;
use kg_cwl::core::probe::Probe;
use kg_cwl::core::registry::Registry;
use kg_cwl::{Cli, Request, build_request, generate};
use serde_json::json;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

struct FakeRegistry {
    records: HashMap<String, String>,
    handles: HashMap<String, String>,
    fetched: RefCell<Vec<String>>,
}

impl FakeRegistry {
    fn with_record(id: &str, record: serde_json::Value) -> Self {
        Self {
            records: [(id.to_string(), record.to_string())].into_iter().collect(),
            handles: HashMap::new(),
            fetched: RefCell::new(Vec::new()),
        }
    }
}

impl Registry for FakeRegistry {
    fn fetch_instance(&self, instance_id: &str) -> Result<ModelInstance, KgCwlError> {
        self.fetched.borrow_mut().push(instance_id.to_string());
        let body = self
            .records
            .get(instance_id)
            .ok_or_else(|| KgCwlError::NotFound(format!("model instance {}", instance_id)))?;
        ModelInstance::from_json(body)
    }

    fn resolve_handle(&self, iri: &str) -> Result<String, KgCwlError> {
        self.handles
            .get(iri)
            .cloned()
            .ok_or_else(|| KgCwlError::NotFound(format!("reference {}", iri)))
    }
}

#[derive(Default)]
struct FakeProbe {
    live: Vec<String>,
    filenames: HashMap<String, String>,
}

impl Probe for FakeProbe {
    fn exists(&self, url: &str) -> bool {
        self.live.iter().any(|u| u == url)
    }

    fn served_filename(&self, url: &str) -> Option<String> {
        self.filenames.get(url).cloned()
    }
}

fn request_in(dir: &Path, instance_id: &str) -> Request {
    Request {
        instance_id: instance_id.to_string(),
        instruction: None,
        output_path: dir.join("input.json"),
        template: DescriptorTemplate::from_config(
            &DescriptorConfig::default(),
            &dir.to_string_lossy(),
        ),
        from_parameters: false,
    }
}

fn read_descriptor(path: &Path) -> Descriptor {
    let text = fs::read_to_string(path).expect("read descriptor");
    serde_json::from_str(&text).expect("parse descriptor")
}

#[test]
fn github_homepage_end_to_end() {
    let tmp = tempdir().expect("tempdir");
    let master = "https://github.com/lab/ca1-pyramidal/archive/refs/heads/master.zip";
    let registry = FakeRegistry::with_record(
        "inst-42",
        json!({
            "id": "inst-42",
            "model_id": "model-7",
            "version": "1.0",
            "source": "https://github.com/lab/ca1-pyramidal",
            "outputs": ["https://data.example.org/results/spikes.h5"]
        }),
    );
    let probe = FakeProbe {
        live: vec![master.to_string()],
        filenames: [(master.to_string(), "ca1-pyramidal-master.zip".to_string())]
            .into_iter()
            .collect(),
    };

    let request = request_in(tmp.path(), "inst-42");
    let outcome = generate(&registry, &probe, &request).expect("generate");
    assert_eq!(outcome.unresolved_code, 0);

    let workdir = tmp.path().to_string_lossy().to_string();
    let desc = read_descriptor(&request.output_path);
    assert_eq!(desc.id, "inst-42");
    assert_eq!(desc.workdir, workdir);

    let code = &desc.run.code[0];
    assert!(
        code.url
            .as_deref()
            .is_some_and(|u| u.ends_with("archive/refs/heads/master.zip"))
    );
    assert_eq!(
        code.path.as_deref(),
        Some(format!("{}/ca1-pyramidal-master/", workdir).as_str())
    );
    assert_eq!(
        code.filepath.as_deref(),
        Some(format!("{}/ca1-pyramidal-master.zip", workdir).as_str())
    );
    assert_eq!(desc.run.instruction, "./run");
    assert_eq!(
        desc.run.outputs[0].path,
        format!("{}/outputs/1eed27eca6f9c40918dcf3e9cb805061", workdir)
    );
    assert_eq!(outcome.document, fs::read_to_string(&request.output_path).expect("read"));
}

#[test]
fn descriptor_json_has_every_key_for_sparse_record() {
    let tmp = tempdir().expect("tempdir");
    let registry = FakeRegistry::with_record(
        "sparse",
        json!({"id": "sparse", "source": "https://zenodo.org/record/99/files/net.zip"}),
    );
    let request = request_in(tmp.path(), "sparse");
    generate(&registry, &FakeProbe::default(), &request).expect("generate");

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&request.output_path).expect("read"))
            .expect("json");
    for pointer in [
        "/id",
        "/workdir",
        "/workflow/run",
        "/workflow/data",
        "/run/code",
        "/run/pre-instruction",
        "/run/instruction",
        "/run/inputs",
        "/run/outputs",
        "/run/environment/pip install",
        "/run/environment/module deps",
        "/run/environment/profiling configuration",
    ] {
        assert!(value.pointer(pointer).is_some(), "missing key {}", pointer);
    }
    assert_eq!(value["run"]["environment"]["pip install"], json!([]));
    assert_eq!(value["run"]["code"][0]["url"], "https://zenodo.org/record/99/files/net.zip");
}

#[test]
fn lazy_handles_are_fetched_through_the_registry() {
    let tmp = tempdir().expect("tempdir");
    let mut registry = FakeRegistry::with_record(
        "lazy",
        json!({
            "id": "lazy",
            "repository": [{"@id": "https://kg.example/code/1"}],
            "input_data": [{"@id": "https://kg.example/data/in"}],
            "run_instruction": "python simulate.py"
        }),
    );
    registry.handles.insert(
        "https://kg.example/code/1".into(),
        "https://modeldb.science/266806".into(),
    );
    registry.handles.insert(
        "https://kg.example/data/in".into(),
        "https://data.example.org/stim.csv".into(),
    );

    let request = request_in(tmp.path(), "lazy");
    generate(&registry, &FakeProbe::default(), &request).expect("generate");
    let desc = read_descriptor(&request.output_path);

    assert_eq!(
        desc.run.code[0].url.as_deref(),
        Some("https://modeldb.science/eavBinDown?o=266806&a=23&mime=application/zip")
    );
    assert!(
        desc.run.code[0]
            .filepath
            .as_deref()
            .is_some_and(|p| p.ends_with("/eavBinDown"))
    );
    assert_eq!(desc.run.inputs[0].url, "https://data.example.org/stim.csv");
    assert_eq!(desc.run.instruction, "python simulate.py");
}

#[test]
fn failures_leave_no_output_file() {
    let tmp = tempdir().expect("tempdir");

    let registry = FakeRegistry::with_record("other", json!({"id": "other"}));
    let request = request_in(tmp.path(), "missing");
    let err = generate(&registry, &FakeProbe::default(), &request).unwrap_err();
    assert!(matches!(err, KgCwlError::NotFound(_)));
    assert!(!request.output_path.exists());

    let registry = FakeRegistry::with_record("bare", json!({"id": "bare"}));
    let request = request_in(tmp.path(), "bare");
    let err = generate(&registry, &FakeProbe::default(), &request).unwrap_err();
    assert!(matches!(err, KgCwlError::ValidationError(_)));
    assert!(!request.output_path.exists());

    let registry = FakeRegistry::with_record(
        "dangling",
        json!({"id": "dangling", "source": [{"@id": "https://kg.example/gone"}]}),
    );
    let request = request_in(tmp.path(), "dangling");
    assert!(generate(&registry, &FakeProbe::default(), &request).is_err());
    assert!(!request.output_path.exists());
}

#[test]
fn parameters_passthrough_writes_stored_json() {
    let tmp = tempdir().expect("tempdir");
    let registry = FakeRegistry::with_record(
        "legacy",
        json!({
            "id": "legacy",
            "parameters": "{\"id\": \"legacy\", \"run\": {\"instruction\": \"./run\"}}"
        }),
    );
    let mut request = request_in(tmp.path(), "legacy");
    request.from_parameters = true;

    generate(&registry, &FakeProbe::default(), &request).expect("generate");
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&request.output_path).expect("read"))
            .expect("json");
    assert_eq!(value["run"]["instruction"], "./run");
    assert_eq!(*registry.fetched.borrow(), vec!["legacy".to_string()]);
}

#[test]
fn flags_flow_into_the_request() {
    let tmp = tempdir().expect("tempdir");
    let registry = FakeRegistry::with_record(
        "flags",
        json!({"id": "flags", "source": "https://example.org/model.tar.gz"}),
    );
    let cli = Cli {
        run: Some("nrnivmodl && python run.py".into()),
        workdir: Some("/scratch/job-1".into()),
        output: Some("report.json".into()),
        ..Cli::default()
    };
    let request = build_request(&cli, "flags", &Config::default(), tmp.path());
    generate(&registry, &FakeProbe::default(), &request).expect("generate");

    let desc = read_descriptor(&tmp.path().join("report.json"));
    assert_eq!(desc.workdir, "/scratch/job-1");
    assert_eq!(desc.run.instruction, "nrnivmodl && python run.py");
    assert_eq!(desc.run.code[0].path.as_deref(), Some("/scratch/job-1/model/"));
}
