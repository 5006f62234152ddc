use super::{load_settings_from, normalize_base_url, Settings};

use std::{collections::HashMap, fs};

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_apply_without_file_or_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_from(&dir.path().join("missing.toml"), env_of(&[]));
    assert_eq!(settings, Settings::default());
}

#[test]
fn file_values_are_read_and_env_wins() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("fitadmin.toml");
    fs::write(
        &path,
        "api_base_url = \"http://api.gym.local\"\npage_limit = 25\nsort_by = \"name\"\n",
    )
    .expect("write settings");

    let from_file = load_settings_from(&path, env_of(&[]));
    assert_eq!(from_file.api_base_url, "http://api.gym.local");
    assert_eq!(from_file.page_limit, 25);
    assert_eq!(from_file.sort_by, "name");

    let overridden = load_settings_from(
        &path,
        env_of(&[
            ("API_BASE_URL", "http://plain.local"),
            ("APP__API_BASE_URL", "http://prefixed.local"),
            ("APP__PAGE_LIMIT", "50"),
        ]),
    );
    assert_eq!(overridden.api_base_url, "http://prefixed.local");
    assert_eq!(overridden.page_limit, 50);
    assert_eq!(overridden.sort_by, "name");
}

#[test]
fn unusable_values_fall_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("fitadmin.toml");
    fs::write(&path, "page_limit = 0\nsort_by = \"  \"\n").expect("write settings");

    let settings = load_settings_from(&path, env_of(&[("APP__PAGE_LIMIT", "lots")]));

    assert_eq!(settings.page_limit, Settings::default().page_limit);
    assert_eq!(settings.sort_by, Settings::default().sort_by);
}

#[test]
fn normalizes_host_without_scheme() {
    assert_eq!(
        normalize_base_url(" localhost:5000/ ").expect("normalize"),
        "http://localhost:5000"
    );
}

#[test]
fn keeps_https_and_path_prefix() {
    assert_eq!(
        normalize_base_url("https://admin.gym.example/backend/").expect("normalize"),
        "https://admin.gym.example/backend"
    );
}

#[test]
fn empty_url_uses_default() {
    assert_eq!(
        normalize_base_url("").expect("normalize"),
        Settings::default().api_base_url
    );
}

#[test]
fn rejects_non_http_scheme() {
    assert!(normalize_base_url("ftp://files.gym.example").is_err());
}
