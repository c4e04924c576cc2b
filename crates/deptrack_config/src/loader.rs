//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::TrackerConfig;
use std::path::Path;

/// File name looked up by [`discover_config`].
pub const CONFIG_FILE_NAME: &str = "deptrack.toml";

const MAX_JOBS: usize = 256;

/// Loads and validates the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<TrackerConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Loads `<dir>/deptrack.toml` if it exists, otherwise returns the defaults.
pub fn discover_config(dir: &Path) -> Result<TrackerConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.is_file() {
        load_config(&path)
    } else {
        Ok(TrackerConfig::default())
    }
}

/// Parses and validates a configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<TrackerConfig, ConfigError> {
    let config: TrackerConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &TrackerConfig) -> Result<(), ConfigError> {
    if config.batch.jobs > MAX_JOBS {
        return Err(ConfigError::ValidationError(format!(
            "batch.jobs must be at most {MAX_JOBS}, got {}",
            config.batch.jobs
        )));
    }
    let ext = &config.emit.extension;
    if ext.is_empty() {
        return Err(ConfigError::ValidationError(
            "emit.extension must not be empty".to_string(),
        ));
    }
    if ext.contains('.') || ext.contains('/') || ext.contains('\\') {
        return Err(ConfigError::ValidationError(format!(
            "emit.extension must be a bare extension, got '{ext}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Precision;

    #[test]
    fn empty_config_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.batch.jobs, 0);
        assert!(config.batch.prelude);
        assert_eq!(config.emit.extension, "deps");
        assert!(config.emit.output_dir.is_none());
        assert_eq!(config.tracking.precision, Precision::Conservative);
        assert!(config.tracking.warn_missing_context);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[batch]
jobs = 4
prelude = false

[emit]
output_dir = "out/deps"
extension = "refdeps"
manifest = "out/manifest.json"

[tracking]
precision = "precise"
warn_missing_context = false
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.batch.jobs, 4);
        assert!(!config.batch.prelude);
        assert_eq!(config.emit.output_dir.as_deref(), Some("out/deps"));
        assert_eq!(config.emit.extension, "refdeps");
        assert_eq!(config.emit.manifest.as_deref(), Some("out/manifest.json"));
        assert_eq!(config.tracking.precision, Precision::Precise);
        assert!(!config.tracking.warn_missing_context);
    }

    #[test]
    fn unknown_precision_errors() {
        let err = load_config_from_str("[tracking]\nprecision = \"sloppy\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn too_many_jobs_errors() {
        let err = load_config_from_str("[batch]\njobs = 100000\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn dotted_extension_errors() {
        let err = load_config_from_str("[emit]\nextension = \".deps\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        let err = load_config_from_str("[emit]\nextension = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn discover_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = discover_config(dir.path()).unwrap();
        assert_eq!(config.emit.extension, "deps");
    }

    #[test]
    fn discover_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[batch]\njobs = 2\n").unwrap();
        let config = discover_config(dir.path()).unwrap();
        assert_eq!(config.batch.jobs, 2);
    }

    #[test]
    fn io_error_from_nonexistent_path() {
        let err = load_config(Path::new("/nonexistent/deptrack.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
