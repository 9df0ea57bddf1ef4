use super::*;
use crate::prompt::{OutputSection, Persona, PromptLanguage};

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn minimal_config_takes_defaults() {
    let config: ForecastConfig =
        serde_json::from_str(r#"{"schema_version": 1}"#).expect("parse minimal config");
    assert_eq!(config, default_config());
    validate_config(&config).expect("defaults are valid");
}

#[test]
fn stub_round_trips_through_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested/eduf.json");
    write_config(&path, &default_config()).expect("write config");
    let loaded = load_config(&path).expect("load config");
    assert_eq!(loaded, default_config());
    let text = std::fs::read_to_string(&path).expect("read config");
    assert!(text.contains("\"schema_version\": 1"));
}

#[test]
fn command_backend_and_flags_parse() {
    let config: ForecastConfig = serde_json::from_str(
        r#"{
            "schema_version": 1,
            "backend": {"kind": "command", "command": "llm -m gemini"},
            "credential_source": "prompt",
            "qa_enabled": false,
            "prompt": {"language": "es", "persona": "analyst", "sections": ["projection_table"]},
            "default_horizon": 8
        }"#,
    )
    .expect("parse config");
    assert_eq!(
        config.backend,
        BackendConfig::Command {
            command: "llm -m gemini".to_string()
        }
    );
    assert_eq!(config.credential_source, CredentialSource::Prompt);
    assert!(!config.qa_enabled);
    assert_eq!(config.prompt.persona, Persona::Analyst);
    assert_eq!(config.prompt.language, PromptLanguage::Es);
    assert_eq!(config.prompt.sections, vec![OutputSection::ProjectionTable]);
    validate_config(&config).expect("valid config");
}

#[test]
fn unknown_fields_are_rejected() {
    let err = serde_json::from_str::<ForecastConfig>(r#"{"schema_version": 1, "mystery": true}"#)
        .unwrap_err();
    assert!(err.to_string().contains("mystery"));
}

#[test]
fn validation_rejects_bad_values() {
    let mut config = default_config();
    config.schema_version = 2;
    assert!(validate_config(&config).is_err());

    let mut config = default_config();
    config.backend = BackendConfig::Gemini {
        model: " ".to_string(),
        base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        timeout_secs: 30,
    };
    let err = validate_config(&config).unwrap_err();
    assert!(err.to_string().contains("backend.model"));

    let mut config = default_config();
    config.prompt.sections = vec![OutputSection::Assumptions, OutputSection::Assumptions];
    let err = validate_config(&config).unwrap_err();
    assert!(err.to_string().contains("more than once"));

    let mut config = default_config();
    config.default_horizon = 21;
    assert!(validate_config(&config).is_err());

    let mut config = default_config();
    config.prompt.sections.clear();
    assert!(validate_config(&config).is_err());
}

#[test]
fn explicit_config_must_exist() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent.json");
    assert!(resolve_config(Some(&missing), no_env).is_err());
}

#[test]
fn env_names_config_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("from-env.json");
    std::fs::write(&path, r#"{"schema_version": 1, "qa_enabled": false}"#).expect("write");
    let env_value = path.display().to_string();
    let (config, resolved) = resolve_config(None, |name| {
        (name == CONFIG_ENV).then(|| env_value.clone())
    })
    .expect("resolve");
    assert!(!config.qa_enabled);
    assert_eq!(resolved.as_deref(), Some(path.as_path()));
}
