use super::*;

use std::{
    env,
    time::{SystemTime, UNIX_EPOCH},
};

fn temp_root(label: &str) -> std::path::PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let root = env::temp_dir().join(format!("cascade_cli_{label}_{suffix}"));
    fs::create_dir_all(&root).expect("temp root");
    root
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file(
        &mut settings,
        r#"
origin = "https://school.example"
page_path = "/ops/portal/classnotice/add/"
preset = "class_notice"
session_cookie = "sessionid=abc"
"#,
    );

    assert_eq!(settings.origin, "https://school.example");
    assert_eq!(settings.page_path, "/ops/portal/classnotice/add/");
    assert_eq!(settings.preset, "class_notice");
    assert_eq!(settings.session_cookie.as_deref(), Some("sessionid=abc"));
    assert_eq!(settings.log_filter, "info");
}

#[test]
fn malformed_file_is_ignored() {
    let mut settings = Settings::default();
    apply_file(&mut settings, "origin = [1, 2");
    assert_eq!(settings, Settings::default());
}

#[test]
fn app_prefixed_env_wins_over_cascade_prefix() {
    let vars: HashMap<&str, &str> = [
        ("CASCADE_ORIGIN", "http://first.example"),
        ("APP__ORIGIN", "http://second.example"),
        ("CASCADE_LOG", "cascade_core=debug"),
    ]
    .into_iter()
    .collect();

    let mut settings = Settings::default();
    apply_env(&mut settings, |name| vars.get(name).map(|v| v.to_string()));

    assert_eq!(settings.origin, "http://second.example");
    assert_eq!(settings.log_filter, "cascade_core=debug");
    assert_eq!(settings.preset, "enrollment");
}

#[test]
fn load_settings_reads_config_file() {
    let root = temp_root("settings");
    let path = root.join("cascade.toml");
    fs::write(&path, "preset = \"class_notice\"\n").expect("write config");

    let settings = load_settings(&path);
    if env::var("CASCADE_PRESET").is_err() {
        assert_eq!(settings.preset, "class_notice");
    }

    fs::remove_dir_all(root).expect("cleanup");
}

#[test]
fn unknown_preset_is_an_error() {
    let settings = Settings {
        preset: "attendance".into(),
        ..Settings::default()
    };
    let err = load_definition(&settings).expect_err("unknown preset");
    assert!(err.to_string().contains("attendance"));
}

#[test]
fn definition_file_replaces_preset() {
    let root = temp_root("definition");
    let path = root.join("slots.toml");
    fs::write(
        &path,
        r#"
name = "slots_only"

[[dependencies]]
field = "course_slot"
depends_on = "course"
endpoint = { kind = "relative", suffix = "related/slots/" }
params = [{ name = "course_id", source = "course" }]
"#,
    )
    .expect("write definition");

    let settings = Settings {
        definition_path: Some(path.to_string_lossy().into_owned()),
        ..Settings::default()
    };
    let definition = load_definition(&settings).expect("definition");
    assert_eq!(definition.name, "slots_only");
    assert_eq!(definition.dependencies.len(), 1);

    fs::remove_dir_all(root).expect("cleanup");
}

#[test]
fn origin_must_be_a_base_url() {
    assert!(parse_origin("https://school.example").is_ok());
    assert!(parse_origin("mailto:ops@school.example").is_err());
    assert!(parse_origin("not a url").is_err());
}
