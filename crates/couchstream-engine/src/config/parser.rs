//! YAML configuration loading.
//!
//! `${VAR}` references are expanded from the environment after the document
//! is parsed, and only inside string values. Comments and keys are never
//! rewritten.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use serde_yaml::Value;

use crate::config::types::FileConfig;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Unset variable and the key path of the value that referenced it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MissingVar {
    name: String,
    key_path: String,
}

/// Expand `${VAR}` references in every string value of `value`.
///
/// `lookup` resolves a variable name; unresolved references are left in
/// place and reported in the returned list, in document order.
fn expand_env_refs<F>(value: &mut Value, lookup: &F) -> Vec<MissingVar>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = Vec::new();
    expand_at(value, String::new(), lookup, &mut missing);
    missing
}

fn expand_at<F>(value: &mut Value, key_path: String, lookup: &F, missing: &mut Vec<MissingVar>)
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(text) => {
            if !ENV_VAR_RE.is_match(text.as_str()) {
                return;
            }
            let expanded = ENV_VAR_RE.replace_all(text.as_str(), |cap: &Captures<'_>| {
                lookup(&cap[1]).unwrap_or_else(|| {
                    missing.push(MissingVar {
                        name: cap[1].to_string(),
                        key_path: key_path.clone(),
                    });
                    cap[0].to_string()
                })
            });
            let expanded = expanded.into_owned();
            *text = expanded;
        }
        Value::Sequence(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                expand_at(item, format!("{key_path}[{index}]"), lookup, missing);
            }
        }
        Value::Mapping(entries) => {
            for (key, item) in entries.iter_mut() {
                let key = match key {
                    Value::String(name) => name.clone(),
                    other => serde_yaml::to_string(other)
                        .map_or_else(|_| "?".to_string(), |s| s.trim_end().to_string()),
                };
                let child = if key_path.is_empty() {
                    key
                } else {
                    format!("{key_path}.{key}")
                };
                expand_at(item, child, lookup, missing);
            }
        }
        Value::Tagged(tagged) => expand_at(&mut tagged.value, key_path, lookup, missing),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

fn load<F>(yaml_str: &str, origin: &str, lookup: &F) -> Result<FileConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut document: Value = serde_yaml::from_str(yaml_str)
        .with_context(|| format!("Failed to parse config YAML in {origin}"))?;

    let missing = expand_env_refs(&mut document, lookup);
    if !missing.is_empty() {
        let listed: Vec<String> = missing
            .iter()
            .map(|m| format!("{} (at {})", m.name, m.key_path))
            .collect();
        anyhow::bail!(
            "Missing environment variable(s) in {origin}: {}",
            listed.join(", ")
        );
    }

    serde_yaml::from_value(document).with_context(|| format!("Invalid config in {origin}"))
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Parse a configuration YAML string, expanding `${VAR}` references in its
/// string values from the process environment.
///
/// Substituted values stay strings: `batch_size: ${N}` does not become a
/// number.
///
/// # Errors
///
/// Returns an error if the YAML is invalid, a referenced environment
/// variable is not set, or the document does not describe a [`FileConfig`].
pub fn parse_config_str(yaml_str: &str) -> Result<FileConfig> {
    load(yaml_str, "inline config", &process_env)
}

/// Parse a configuration YAML file. Errors name the file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or [`parse_config_str`]
/// would reject its contents.
pub fn parse_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    load(&content, &path.display().to_string(), &process_env)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    fn expanded(yaml: &str, lookup: &impl Fn(&str) -> Option<String>) -> (Value, Vec<MissingVar>) {
        let mut value: Value = serde_yaml::from_str(yaml).unwrap();
        let missing = expand_env_refs(&mut value, lookup);
        (value, missing)
    }

    #[test]
    fn test_env_refs_expand_inside_values() {
        let (value, missing) = expanded(
            "url: https://${CS_HOST}:${CS_PORT}/animals\n",
            &env(&[("CS_HOST", "couch.example.com"), ("CS_PORT", "6984")]),
        );
        assert!(missing.is_empty());
        assert_eq!(value["url"].as_str(), Some("https://couch.example.com:6984/animals"));
    }

    #[test]
    fn test_comments_and_keys_are_left_alone() {
        let yaml = "# rotate ${CS_UNSET_IN_COMMENT} monthly\n${CS_KEY}: literal\n";
        let (value, missing) = expanded(yaml, &env(&[("CS_KEY", "renamed")]));
        assert!(missing.is_empty(), "got: {missing:?}");
        assert_eq!(value["${CS_KEY}"].as_str(), Some("literal"));
    }

    #[test]
    fn test_secret_with_yaml_syntax_stays_one_value() {
        let yaml = "source:\n  password: ${CS_PW}\n  username: admin\n";
        let (value, _) = expanded(yaml, &env(&[("CS_PW", "a: b # c\nusername: root")]));
        assert_eq!(value["source"]["password"].as_str(), Some("a: b # c\nusername: root"));
        assert_eq!(value["source"]["username"].as_str(), Some("admin"));
    }

    #[test]
    fn test_missing_vars_report_key_paths_in_order() {
        let yaml = "source:\n  password: ${CS_MISSING_X}\n  topics: [ok, \"${CS_MISSING_Y}\"]\n";
        let (_, missing) = expanded(yaml, &env(&[]));
        assert_eq!(
            missing,
            vec![
                MissingVar {
                    name: "CS_MISSING_X".into(),
                    key_path: "source.password".into(),
                },
                MissingVar {
                    name: "CS_MISSING_Y".into(),
                    key_path: "source.topics[1]".into(),
                },
            ]
        );
    }

    #[test]
    fn test_no_env_refs_passthrough() {
        let yaml = "url: http://localhost:5984/db\nbatch_size: 10\n";
        let (value, missing) = expanded(yaml, &env(&[]));
        assert!(missing.is_empty());
        assert_eq!(value, serde_yaml::from_str::<Value>(yaml).unwrap());
    }

    #[test]
    fn test_parse_config_from_string() {
        let yaml = r"
state_path: /tmp/offsets.db
source:
  url: http://localhost:5984/animals
  username: admin
  password: ${CS_TEST_PASSWORD}
  topics: [animals]
  omit_design_docs: true
sink:
  url: http://localhost:5984/archive
  topics: [animals]
  batch_size: 50
  replication: true
";
        let config = load(yaml, "test", &env(&[("CS_TEST_PASSWORD", "secret")])).unwrap();
        let source = config.source.unwrap();
        assert_eq!(source.connection.password, "secret");
        assert!(source.omit_design_docs);
        let sink = config.sink.unwrap();
        assert_eq!(sink.batch_size, 50);
        assert!(sink.replication);
        assert_eq!(config.state_path, Path::new("/tmp/offsets.db"));
    }

    #[test]
    fn test_missing_var_error_names_origin_and_key() {
        let yaml = "sink:\n  url: ${CS_SINK_URL}\n  topics: [t]\n";
        let msg = load(yaml, "/etc/couchstream.yaml", &env(&[]))
            .unwrap_err()
            .to_string();
        assert_eq!(
            msg,
            "Missing environment variable(s) in /etc/couchstream.yaml: CS_SINK_URL (at sink.url)"
        );
    }

    #[test]
    fn test_sections_are_optional() {
        let config = parse_config_str("state_path: offsets.db\n").unwrap();
        assert!(config.source.is_none());
        assert!(config.sink.is_none());
    }

    #[test]
    fn test_parse_invalid_yaml_errors() {
        let yaml = "this is not: [valid: yaml: {{{}}}";
        assert!(parse_config_str(yaml).is_err());
    }

    #[test]
    fn test_parse_config_file_not_found() {
        let err_msg = parse_config(Path::new("/nonexistent/couchstream.yaml"))
            .unwrap_err()
            .to_string();
        assert!(err_msg.contains("Failed to read config file"));
    }

    #[test]
    fn test_file_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "source:\n  password: ${CS_UNSET_FILE_VAR_5521}\n").unwrap();

        let msg = parse_config(&path).unwrap_err().to_string();
        assert!(msg.contains(&path.display().to_string()), "got: {msg}");
        assert!(msg.contains("CS_UNSET_FILE_VAR_5521 (at source.password)"), "got: {msg}");
    }
}
