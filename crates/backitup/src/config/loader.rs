use std::path::Path;

use crate::config::schema::Settings;
use crate::error::ConfigError;

pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content).map_err(|e| match e {
        ConfigError::Parse { message, .. } => ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        },
        other => other,
    })
}

/// Like [`load_settings`], but a missing file yields the defaults.
pub fn load_settings_or_default<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        log::debug!("No settings file at {:?}, using defaults", path);
        return Ok(Settings::default());
    }
    load_settings(path)
}

pub fn load_settings_from_str(content: &str) -> Result<Settings, ConfigError> {
    // serde_yaml rejects an empty document, which should mean "all defaults".
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }

    let settings: Settings = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
        path: "<string>".into(),
        message: e.to_string(),
    })?;

    validate_settings(&settings)?;
    Ok(settings)
}

impl Settings {
    /// Reads settings from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_settings(path)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_settings_or_default(path)
    }
}

fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.rsync_binary.trim().is_empty() {
        return Err(ConfigError::Parse {
            path: "<string>".into(),
            message: "rsync_binary cannot be empty".to_string(),
        });
    }
    if settings.tick_interval_ms == 0 {
        return Err(ConfigError::Parse {
            path: "<string>".into(),
            message: "tick_interval_ms must be > 0".to_string(),
        });
    }
    if settings.event_capacity == 0 {
        return Err(ConfigError::Parse {
            path: "<string>".into(),
            message: "event_capacity must be > 0".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_empty_document_is_default() {
        let settings = load_settings_from_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.rsync_binary, "rsync");
        assert_eq!(settings.min_free_bytes, 100 * 1024 * 1024);
        assert_eq!(settings.vanished_exit_code, 24);
        assert_eq!(settings.tick_interval(), Duration::from_secs(1));
        assert_eq!(settings.retry_delay(), Duration::from_millis(10));
        assert_eq!(settings.after_job_delay(), Duration::from_millis(100));
        assert!(settings.terminate_grace().is_none());
        assert!(settings.config_dir.ends_with("BackItUp/Config"));
    }

    #[test]
    fn test_partial_override() {
        let settings = load_settings_from_str(
            "rsync_binary: /usr/local/bin/rsync\nmin_free_bytes: 1024\nterminate_grace_ms: 500\n",
        )
        .unwrap();
        assert_eq!(settings.rsync_binary, "/usr/local/bin/rsync");
        assert_eq!(settings.min_free_bytes, 1024);
        assert_eq!(settings.terminate_grace(), Some(Duration::from_millis(500)));
        assert_eq!(settings.vanished_exit_code, 24);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = load_settings_from_str("rsync_bin: rsync\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_zero_tick_rejected() {
        assert!(load_settings_from_str("tick_interval_ms: 0\n").is_err());
    }

    #[test]
    fn test_load_from_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "bogus: true\n").unwrap();

        match load_settings(&path).unwrap_err() {
            ConfigError::Parse { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_file_or_default() {
        let dir = TempDir::new().unwrap();
        let settings = load_settings_or_default(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_settings_load_methods() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "event_capacity: 8\n").unwrap();

        assert_eq!(Settings::load(&path).unwrap().event_capacity, 8);
        assert!(Settings::load(dir.path().join("absent.yaml")).is_err());
        assert_eq!(
            Settings::load_or_default(dir.path().join("absent.yaml")).unwrap(),
            Settings::default()
        );
    }
}
