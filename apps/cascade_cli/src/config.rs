use std::{collections::HashMap, fs, path::Path};

use anyhow::{anyhow, Context};
use cascade_core::CascadeDefinition;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub origin: String,
    pub page_path: String,
    pub preset: String,
    pub definition_path: Option<String>,
    pub session_cookie: Option<String>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:8000".into(),
            page_path: "/ops-a9d4b1/portal/enrollment/add/".into(),
            preset: "enrollment".into(),
            definition_path: None,
            session_cookie: None,
            log_filter: "info".into(),
        }
    }
}

/// Defaults, then `config_path` if it exists, then the environment.
pub fn load_settings(config_path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(config_path) {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |name| std::env::var(name).ok());

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        return;
    };

    if let Some(v) = file_cfg.get("origin") {
        settings.origin = v.clone();
    }
    if let Some(v) = file_cfg.get("page_path") {
        settings.page_path = v.clone();
    }
    if let Some(v) = file_cfg.get("preset") {
        settings.preset = v.clone();
    }
    if let Some(v) = file_cfg.get("definition_path") {
        settings.definition_path = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("session_cookie") {
        settings.session_cookie = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("log_filter") {
        settings.log_filter = v.clone();
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("CASCADE_ORIGIN") {
        settings.origin = v;
    }
    if let Some(v) = var("APP__ORIGIN") {
        settings.origin = v;
    }

    if let Some(v) = var("CASCADE_PAGE_PATH") {
        settings.page_path = v;
    }
    if let Some(v) = var("APP__PAGE_PATH") {
        settings.page_path = v;
    }

    if let Some(v) = var("CASCADE_PRESET") {
        settings.preset = v;
    }

    if let Some(v) = var("CASCADE_DEFINITION_PATH") {
        settings.definition_path = Some(v);
    }

    if let Some(v) = var("CASCADE_SESSION_COOKIE") {
        settings.session_cookie = Some(v);
    }
    if let Some(v) = var("APP__SESSION_COOKIE") {
        settings.session_cookie = Some(v);
    }

    if let Some(v) = var("CASCADE_LOG") {
        settings.log_filter = v;
    }
}

pub fn parse_origin(raw: &str) -> anyhow::Result<Url> {
    let origin = Url::parse(raw.trim()).with_context(|| format!("invalid origin url '{raw}'"))?;
    if origin.cannot_be_a_base() {
        return Err(anyhow!("origin '{raw}' cannot be used as a base url"));
    }
    Ok(origin)
}

/// A definition file wins over the named preset.
pub fn load_definition(settings: &Settings) -> anyhow::Result<CascadeDefinition> {
    if let Some(path) = &settings.definition_path {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read cascade definition '{path}'"))?;
        return toml::from_str(&raw)
            .with_context(|| format!("failed to parse cascade definition '{path}'"));
    }

    CascadeDefinition::preset(&settings.preset)
        .ok_or_else(|| anyhow!("unknown cascade preset '{}'", settings.preset))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
