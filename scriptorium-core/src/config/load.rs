use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::StoreError;

use super::defaults::ENV_PREFIX;
use super::schema::Settings;

/// Load settings from an optional TOML file, then apply `SCRIPTORIUM_*`
/// environment overrides on top. A missing file yields the defaults.
pub fn load(config_path: Option<&Path>) -> Result<Settings, StoreError> {
    let mut settings = match config_path {
        Some(path) if path.exists() => {
            let raw = fs::read_to_string(path)?;
            toml::from_str(&raw)
                .map_err(|err| StoreError::invalid(format!("invalid config file: {err}")))?
        }
        _ => Settings::default(),
    };

    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn env_var(key: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}{key}"))
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn apply_env_overrides(settings: &mut Settings) {
    if let Some(value) = env_var("ROOT_PATH") {
        settings.root_path = PathBuf::from(value);
    }
    if let Some(value) = env_var("DEFAULT_AUTHOR") {
        settings.default_author = value;
    }
    if let Some(value) = env_var("DEFAULT_EMAIL") {
        settings.default_email = value;
    }
    if let Some(value) = env_var("GRAPH_LOG_PATH") {
        settings.graph_log_path = PathBuf::from(value);
    }
    if let Some(value) = env_var("USE_IN_MEMORY_GRAPH") {
        settings.use_in_memory_graph = parse_bool(&value);
    }
    if let Some(value) = env_var("SEMANTIC_INDEX_ENABLED") {
        settings.semantic_index_enabled = parse_bool(&value);
    }
    if let Some(value) = env_var("LARGE_CONTENT_THRESHOLD")
        && let Ok(parsed) = value.trim().parse::<usize>()
    {
        settings.large_content_threshold = parsed;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let settings = load(None).expect("defaults");
        assert_eq!(settings.default_author, "Scriptorium");
        assert!(settings.use_in_memory_graph);
        assert!(!settings.semantic_index_enabled);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("scriptorium.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "root_path = \"/srv/docs\"\nsemantic_index_enabled = true\nlarge_content_threshold = 42"
        )
        .unwrap();

        let settings = load(Some(&path)).expect("load");
        assert_eq!(settings.root_path, PathBuf::from("/srv/docs"));
        assert!(settings.semantic_index_enabled);
        assert_eq!(settings.large_content_threshold, 42);
        // untouched keys keep their defaults
        assert_eq!(settings.default_email, "scriptorium@local");
    }

    #[test]
    fn relative_graph_log_is_anchored_at_root() {
        let settings = Settings {
            root_path: PathBuf::from("/srv/docs"),
            ..Settings::default()
        };
        assert_eq!(
            settings.resolved_graph_log_path(),
            PathBuf::from("/srv/docs/memory.jsonl")
        );
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        for value in ["1", "true", "YES", " True "] {
            assert!(parse_bool(value), "{value} should parse as true");
        }
        for value in ["0", "false", "no", "off"] {
            assert!(!parse_bool(value), "{value} should parse as false");
        }
    }
}
