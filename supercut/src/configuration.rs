use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use supercut_core::{ffmpeg::DEFAULT_ACCEPT_TIMEOUT, Ffmpeg, DEFAULT_LANGUAGE};
use thiserror::Error;

/// Settings read from the configuration file. Anything left out falls back to
/// the built-in default, and command-line flags win over both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    pub language:          Option<String>,
    pub cache_dir:         Option<PathBuf>,
    pub external_subs:     bool,
    pub ffmpeg:            Option<PathBuf>,
    pub ffprobe:           Option<PathBuf>,
    pub vlc:               Option<PathBuf>,
    pub overwrite:         bool,
    pub accept_timeout_ms: Option<u64>,
}

impl Configuration {
    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut buffer = vec![];
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;
        std::fs::write(path, buffer)?;
        Ok(())
    }

    /// `None` when there is no file at `config_path`.
    #[inline]
    pub fn load(config_path: &Path) -> Result<Option<Configuration>> {
        if !config_path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(config_path)
            .map_err(|_| ConfigError::ConfigLoadError(config_path.to_path_buf()))?;
        let data = serde_json::from_str(&data).map_err(|e| ConfigError::ConfigParseError {
            path:   config_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Some(data))
    }

    #[inline]
    pub fn language<'a>(&'a self, flag: Option<&'a str>) -> &'a str {
        flag.or(self.language.as_deref()).unwrap_or(DEFAULT_LANGUAGE)
    }

    #[inline]
    pub fn cache_dir<'a>(&'a self, flag: Option<&'a Path>) -> Option<&'a Path> {
        flag.or(self.cache_dir.as_deref())
    }

    #[inline]
    pub fn ffmpeg(&self) -> Ffmpeg {
        let defaults = Ffmpeg::default();
        Ffmpeg {
            ffmpeg:         self.ffmpeg.clone().unwrap_or(defaults.ffmpeg),
            ffprobe:        self.ffprobe.clone().unwrap_or(defaults.ffprobe),
            accept_timeout: self.accept_timeout_ms.map_or(DEFAULT_ACCEPT_TIMEOUT, Duration::from_millis),
            ..defaults
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config file: {}", .0.display())]
    ConfigLoadError(PathBuf),
    #[error("Invalid config file {}: {reason}", path.display())]
    ConfigParseError { path: PathBuf, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Configuration::load(&dir.path().join("supercut.json")).unwrap(), None);
    }

    #[test]
    fn saved_configuration_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supercut.json");
        let configuration = Configuration {
            language: Some("jpn".to_owned()),
            external_subs: true,
            accept_timeout_ms: Some(1500),
            ..Configuration::default()
        };
        configuration.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"language\": \"jpn\""));
        assert_eq!(Configuration::load(&path).unwrap(), Some(configuration));
    }

    #[test]
    fn partial_files_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supercut.json");
        std::fs::write(&path, r#"{"ffmpeg": "/opt/ffmpeg/bin/ffmpeg"}"#).unwrap();

        let configuration = Configuration::load(&path).unwrap().unwrap();
        assert_eq!(configuration.language(None), DEFAULT_LANGUAGE);
        assert_eq!(configuration.language(Some("ger")), "ger");

        let ffmpeg = configuration.ffmpeg();
        assert_eq!(ffmpeg.ffmpeg, Path::new("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(ffmpeg.ffprobe, Ffmpeg::default().ffprobe);
        assert_eq!(ffmpeg.accept_timeout, DEFAULT_ACCEPT_TIMEOUT);
    }

    #[test]
    fn flags_override_file() {
        let configuration = Configuration {
            cache_dir: Some(PathBuf::from("/var/cache/supercut")),
            ..Configuration::default()
        };
        assert_eq!(configuration.cache_dir(None), Some(Path::new("/var/cache/supercut")));
        assert_eq!(configuration.cache_dir(Some(Path::new("/tmp/c"))), Some(Path::new("/tmp/c")));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("supercut.json");
        std::fs::write(&path, r#"{"langauge": "jpn"}"#).unwrap();

        let error = Configuration::load(&path).unwrap_err();
        assert!(matches!(error.downcast_ref::<ConfigError>(), Some(ConfigError::ConfigParseError { .. })));
    }
}
