use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppResult;
use crate::model::Quality;

/// Environment variable overriding the settings file location
pub const SETTINGS_ENV: &str = "YTDL_SETTINGS";
const SETTINGS_FILE: &str = "settings.json";

/// Persisted user preferences. Missing keys take their defaults, unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(deserialize_with = "null_as_default_path")]
    pub default_path: PathBuf,
    #[serde(deserialize_with = "null_as_empty")]
    pub default_quality: String,
    /// Netscape cookies.txt for age-gated or members-only videos; empty when unset
    #[serde(deserialize_with = "null_as_empty")]
    pub cookiefile: String,
    /// ffmpeg binary or its directory; empty to let yt-dlp search `PATH`
    #[serde(deserialize_with = "null_as_empty")]
    pub ffmpeg_path: String,
}

/// A key written as `null` counts as unset instead of rejecting the whole file.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default_path<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<PathBuf>::deserialize(deserializer)?
        .unwrap_or_else(|| Settings::default().default_path))
}

impl Default for Settings {
    fn default() -> Self {
        let default_path = dirs::download_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
            .unwrap_or_else(|| PathBuf::from("Downloads"));

        Self {
            default_path,
            default_quality: Quality::default().label().to_string(),
            cookiefile: String::new(),
            ffmpeg_path: String::new(),
        }
    }
}

impl Settings {
    pub fn read(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Writes the settings as JSON indented with four spaces.
    pub fn write(&self, path: &Path) -> AppResult<()> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        fs::write(path, buf)?;
        Ok(())
    }

    pub fn default_quality(&self) -> Quality {
        Quality::from_label_or_default(&self.default_quality)
    }

    pub fn cookiefile(&self) -> Option<&Path> {
        non_empty_path(&self.cookiefile)
    }

    pub fn ffmpeg_path(&self) -> Option<&Path> {
        non_empty_path(&self.ffmpeg_path)
    }
}

fn non_empty_path(value: &str) -> Option<&Path> {
    let value = value.trim();
    (!value.is_empty()).then(|| Path::new(value))
}

/// Where the settings live: `$YTDL_SETTINGS`, else `settings.json` in the working directory.
pub fn settings_path() -> PathBuf {
    std::env::var_os(SETTINGS_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE))
}

/// Settings bound to the file they were loaded from
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Loads the file at `path`. A missing or unreadable file leaves the defaults in place.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = if path.exists() {
            match Settings::read(&path) {
                Ok(s) => {
                    info!("loaded settings from {}", path.display());
                    s
                }
                Err(e) => {
                    warn!("ignoring settings file {}: {}", path.display(), e);
                    Settings::default()
                }
            }
        } else {
            debug!("no settings file at {}, using defaults", path.display());
            Settings::default()
        };
        Self { path, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `change` and writes the result to disk.
    pub fn update<F: FnOnce(&mut Settings)>(&mut self, change: F) -> AppResult<()> {
        change(&mut self.settings);
        self.save()
    }

    pub fn save(&self) -> AppResult<()> {
        self.settings.write(&self.path)?;
        debug!("saved settings to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path().join("nope.json"));
        assert_eq!(store.settings(), &Settings::default());
        assert_eq!(store.settings().default_quality(), Quality::P720);
    }

    #[test]
    fn broken_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ \"default_path\": ").unwrap();
        let store = SettingsStore::load(&path);
        assert_eq!(store.settings(), &Settings::default());
    }

    #[test]
    fn partial_json_fills_missing_keys_and_ignores_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"default_quality": "1080p", "theme": "dark"}"#,
        )
        .unwrap();
        let store = SettingsStore::load(&path);
        assert_eq!(store.settings().default_quality, "1080p");
        assert_eq!(store.settings().default_path, Settings::default().default_path);
        assert_eq!(store.settings().cookiefile(), None);
    }

    #[test]
    fn null_keys_read_as_unset_and_keep_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"default_path": "/media/videos", "default_quality": "1080p", "cookiefile": null, "ffmpeg_path": null}"#,
        )
        .unwrap();
        let store = SettingsStore::load(&path);
        assert_eq!(store.settings().default_path, PathBuf::from("/media/videos"));
        assert_eq!(store.settings().default_quality(), Quality::P1080);
        assert_eq!(store.settings().cookiefile(), None);
        assert_eq!(store.settings().ffmpeg_path(), None);
    }

    #[test]
    fn null_default_path_falls_back_to_default() {
        let settings: Settings =
            serde_json::from_str(r#"{"default_path": null, "default_quality": null}"#).unwrap();
        assert_eq!(settings.default_path, Settings::default().default_path);
        assert_eq!(settings.default_quality(), Quality::P720);
    }

    #[test]
    fn persisted_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut store = SettingsStore::load(&path);
        store
            .update(|s| {
                s.default_path = PathBuf::from("/media/videos");
                s.default_quality = "2160p".into();
                s.cookiefile = "/home/me/cookies.txt".into();
                s.ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg".into();
            })
            .unwrap();

        let reloaded = SettingsStore::load(&path);
        assert_eq!(reloaded.settings(), store.settings());
        assert_eq!(reloaded.settings().default_quality(), Quality::P2160);
        assert_eq!(
            reloaded.settings().cookiefile(),
            Some(Path::new("/home/me/cookies.txt"))
        );
        assert_eq!(
            reloaded.settings().ffmpeg_path(),
            Some(Path::new("/opt/ffmpeg/bin/ffmpeg"))
        );
    }

    #[test]
    fn written_file_uses_four_space_indent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        Settings::default().write(&path).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n    \"default_path\""));
        assert!(raw.contains("\n    \"ffmpeg_path\""));
    }

    #[test]
    fn unknown_default_quality_reads_as_720p() {
        let settings = Settings {
            default_quality: "ultra".into(),
            ..Settings::default()
        };
        assert_eq!(settings.default_quality(), Quality::P720);
    }
}
