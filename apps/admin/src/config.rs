use std::{fs, path::Path};

use anyhow::{bail, Context};
use shared::protocol::{DEFAULT_PAGE_LIMIT, DEFAULT_SORT_FIELD};
use url::Url;

pub const SETTINGS_FILE: &str = "fitadmin.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub page_limit: u32,
    pub sort_by: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:5000".into(),
            page_limit: DEFAULT_PAGE_LIMIT,
            sort_by: DEFAULT_SORT_FIELD.into(),
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the settings file, then environment overrides.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<toml::Table>(&raw) {
            if let Some(v) = file_cfg.get("api_base_url").and_then(|v| v.as_str()) {
                settings.api_base_url = v.to_string();
            }
            if let Some(v) = file_cfg.get("page_limit").and_then(toml_u32) {
                settings.page_limit = v;
            }
            if let Some(v) = file_cfg.get("sort_by").and_then(|v| v.as_str()) {
                settings.sort_by = v.to_string();
            }
        }
    }

    if let Some(v) = env("API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = env("APP__PAGE_LIMIT") {
        if let Ok(parsed) = v.trim().parse::<u32>() {
            settings.page_limit = parsed;
        }
    }

    if let Some(v) = env("APP__SORT_BY") {
        settings.sort_by = v;
    }

    if settings.page_limit == 0 {
        settings.page_limit = DEFAULT_PAGE_LIMIT;
    }
    if settings.sort_by.trim().is_empty() {
        settings.sort_by = DEFAULT_SORT_FIELD.into();
    }

    settings
}

fn toml_u32(value: &toml::Value) -> Option<u32> {
    match value {
        toml::Value::Integer(n) => u32::try_from(*n).ok(),
        toml::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accepts `host:port`, full URLs and trailing slashes; returns a URL with
/// scheme and no trailing slash.
pub fn normalize_base_url(raw_base_url: &str) -> anyhow::Result<String> {
    let raw_base_url = raw_base_url.trim();

    let candidate = if raw_base_url.is_empty() {
        Settings::default().api_base_url
    } else if raw_base_url.contains("://") {
        raw_base_url.to_string()
    } else {
        format!("http://{raw_base_url}")
    };

    let parsed =
        Url::parse(&candidate).with_context(|| format!("invalid api base url '{raw_base_url}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("api base url '{raw_base_url}' must use http or https");
    }

    Ok(candidate.trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
