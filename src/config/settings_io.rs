use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::settings::Settings;

const APP_DIR: &str = "narrative_gate";
const SETTINGS_FILE: &str = "settings.json";

pub fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path.push(SETTINGS_FILE);
    path
}

/// Loads settings from `path`, falling back to defaults when the file does
/// not exist. A file that exists but does not parse is an error.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    match fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text)
            .with_context(|| format!("invalid settings file {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
        Err(e) => Err(e).with_context(|| format!("cannot read {}", path.display())),
    }
}

/// Settings file plus environment overrides.
pub fn load_settings() -> Result<Settings> {
    let mut settings = load_settings_from(&settings_path())?;
    settings.apply_overrides(|key| std::env::var(key).ok());
    Ok(settings)
}

pub fn save_settings(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("narrative_gate_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = scratch_dir("missing");
        let settings = load_settings_from(&dir.join(SETTINGS_FILE)).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_then_load() {
        let dir = scratch_dir("save");
        let path = dir.join(SETTINGS_FILE);
        let settings = Settings {
            narrator_model: "qwen2".into(),
            history_window: 8,
            ..Settings::default()
        };

        save_settings(&settings, &path).unwrap();
        assert_eq!(load_settings_from(&path).unwrap(), settings);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = scratch_dir("malformed");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(SETTINGS_FILE);
        fs::write(&path, "{ not json").unwrap();

        assert!(load_settings_from(&path).is_err());
        let _ = fs::remove_dir_all(dir);
    }
}
