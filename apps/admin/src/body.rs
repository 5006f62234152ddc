//! Request bodies assembled from `--json`, `--field` and `--file` flags.

use std::path::Path;

use anyhow::{bail, Context, Result};
use client_core::{FormPayload, ResourceBody};
use serde_json::{Map, Value};

pub fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// JSON unless files are attached, in which case everything goes out as
/// multipart form-data.
pub async fn build_body(
    json: Option<&str>,
    fields: &[(String, String)],
    files: &[(String, String)],
) -> Result<ResourceBody> {
    if let Some(raw) = json {
        let value: Value = serde_json::from_str(raw).context("--json is not valid JSON")?;
        if !value.is_object() {
            bail!("--json must be a JSON object");
        }
        return Ok(ResourceBody::Json(value));
    }

    if files.is_empty() {
        if fields.is_empty() {
            bail!("nothing to send: pass --json, --field or --file");
        }
        let object: Map<String, Value> = fields
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();
        return Ok(ResourceBody::Json(Value::Object(object)));
    }

    let mut form = FormPayload::new();
    for (name, value) in fields {
        form = form.text(name.clone(), value.clone());
    }
    for (field, path) in files {
        let path = Path::new(path);
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| field.clone());
        let mime_type = mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string());
        form = form.file(field.clone(), filename, mime_type, bytes);
    }
    Ok(ResourceBody::Form(form))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn key_value_splits_on_first_equals() {
        assert_eq!(
            parse_key_value("notes=a=b"),
            Ok(("notes".to_string(), "a=b".to_string()))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value(" =x").is_err());
    }

    #[tokio::test]
    async fn json_flag_must_be_an_object() {
        let body = build_body(Some(r#"{"name":"Squat","sets":5}"#), &[], &[])
            .await
            .expect("body");
        assert_eq!(body, ResourceBody::Json(json!({ "name": "Squat", "sets": 5 })));
        assert!(build_body(Some("[1,2]"), &[], &[]).await.is_err());
    }

    #[tokio::test]
    async fn plain_fields_become_json() {
        let body = build_body(None, &pairs(&[("name", "Rowing machine")]), &[])
            .await
            .expect("body");
        assert_eq!(body, ResourceBody::Json(json!({ "name": "Rowing machine" })));
        assert!(build_body(None, &[], &[]).await.is_err());
    }

    #[tokio::test]
    async fn files_switch_to_multipart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let image = dir.path().join("deadlift.png");
        std::fs::write(&image, [1u8, 2, 3]).expect("write image");

        let body = build_body(
            None,
            &pairs(&[("name", "Deadlift")]),
            &pairs(&[("image", image.to_str().expect("utf8 path"))]),
        )
        .await
        .expect("body");

        let ResourceBody::Form(form) = body else {
            panic!("expected multipart body");
        };
        assert_eq!(form.fields, pairs(&[("name", "Deadlift")]));
        assert_eq!(form.files.len(), 1);
        assert_eq!(form.files[0].filename, "deadlift.png");
        assert_eq!(form.files[0].mime_type.as_deref(), Some("image/png"));
        assert_eq!(form.files[0].bytes, vec![1, 2, 3]);
    }
}
