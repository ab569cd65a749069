//! Global configuration loader for testhook.
//!
//! Reads a TOML file (`testhook.toml` in the working directory unless another
//! path is given) and deserializes it into [`GlobalConfig`]. Falls back to
//! defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use testhook_types::config::GlobalConfig;

/// File name looked up when no explicit config path is given.
pub const DEFAULT_CONFIG_FILE: &str = "testhook.toml";

/// Pick the config file: the explicit path if given, otherwise `testhook.toml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load global configuration from `config_path`.
///
/// - If the file does not exist, returns [`GlobalConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_global_config(config_path: &Path) -> GlobalConfig {
    let content = match tokio::fs::read_to_string(config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn resolve_config_path_prefers_explicit() {
        assert_eq!(
            resolve_config_path(Some(Path::new("/etc/testhook/prod.toml"))),
            PathBuf::from("/etc/testhook/prod.toml")
        );
        assert_eq!(resolve_config_path(None), PathBuf::from("testhook.toml"));
    }

    #[tokio::test]
    async fn load_global_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_global_config(&tmp.path().join("testhook.toml")).await;
        assert_eq!(config.server.port, 5678);
        assert_eq!(config.registry.test_webhook_timeout_ms, 120_000);
    }

    #[tokio::test]
    async fn load_global_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("testhook.toml");
        tokio::fs::write(
            &config_path,
            r#"
[server]
host = "0.0.0.0"
port = 9000
test_path_prefix = "hooks-test"

[registry]
test_webhook_timeout_ms = 30000
"#,
        )
        .await
        .unwrap();

        let config = load_global_config(&config_path).await;
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.test_path_prefix, "hooks-test");
        assert_eq!(config.registry.test_webhook_timeout_ms, 30_000);
        assert_eq!(config.registry.push_capacity, 1024);
    }

    #[tokio::test]
    async fn load_global_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("testhook.toml");
        tokio::fs::write(&config_path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_global_config(&config_path).await;
        assert_eq!(config.server.port, 5678);
        assert!(!config.logging.json);
    }
}
