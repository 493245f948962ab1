use std::path::PathBuf;

use serde::Deserialize;

use crate::shared::DEFAULT_BPM;
use crate::transport::clamp_bpm;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    defaults: DefaultsConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Deserialize, Default)]
struct DefaultsConfig {
    bpm: Option<f32>,
    sample_dir: Option<PathBuf>,
    store_path: Option<PathBuf>,
}

#[derive(Deserialize, Default)]
struct LoggingConfig {
    log_file: Option<PathBuf>,
    filter: Option<String>,
}

pub struct Config {
    defaults: DefaultsConfig,
    logging: LoggingConfig,
}

impl Config {
    // embedded defaults, then the user's file on top, field by field
    pub fn load() -> Self {
        let user = user_config_path()
            .filter(|p| p.exists())
            .and_then(|p| std::fs::read_to_string(p).ok());
        Self::from_sources(user.as_deref())
    }

    fn from_sources(user: Option<&str>) -> Self {
        let mut base: ConfigFile = toml::from_str(DEFAULT_CONFIG).unwrap_or_default();
        if let Some(user) = user.and_then(|s| toml::from_str::<ConfigFile>(s).ok()) {
            merge_defaults(&mut base.defaults, user.defaults);
            merge_logging(&mut base.logging, user.logging);
        }
        Config { defaults: base.defaults, logging: base.logging }
    }

    // a path on the command line wins over both files
    pub fn with_sample_dir(mut self, dir: Option<PathBuf>) -> Self {
        if dir.is_some() {
            self.defaults.sample_dir = dir;
        }
        self
    }

    pub fn bpm(&self) -> f32 {
        clamp_bpm(self.defaults.bpm.unwrap_or(DEFAULT_BPM))
    }

    pub fn sample_dir(&self) -> PathBuf {
        self.defaults
            .sample_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn store_path(&self) -> PathBuf {
        self.defaults.store_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("loopdeck"))
                .unwrap_or_else(|| PathBuf::from("."))
                .join("store.sqlite3")
        })
    }

    pub fn log_file(&self) -> PathBuf {
        self.logging.log_file.clone().unwrap_or_else(|| PathBuf::from("loopdeck.log"))
    }

    pub fn log_filter(&self) -> &str {
        self.logging.filter.as_deref().unwrap_or("info")
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("loopdeck").join("config.toml"))
}

fn merge_defaults(base: &mut DefaultsConfig, user: DefaultsConfig) {
    if user.bpm.is_some() {
        base.bpm = user.bpm;
    }
    if user.sample_dir.is_some() {
        base.sample_dir = user.sample_dir;
    }
    if user.store_path.is_some() {
        base.store_path = user.store_path;
    }
}

fn merge_logging(base: &mut LoggingConfig, user: LoggingConfig) {
    if user.log_file.is_some() {
        base.log_file = user.log_file;
    }
    if user.filter.is_some() {
        base.filter = user.filter;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_parse() {
        let c = Config::from_sources(None);
        assert_eq!(c.bpm(), 120.0);
        assert_eq!(c.log_filter(), "info");
        assert_eq!(c.log_file(), PathBuf::from("loopdeck.log"));
        assert!(c.store_path().ends_with("store.sqlite3"));
    }

    #[test]
    fn user_file_overrides_only_what_it_sets() {
        let user = r#"
            [defaults]
            bpm = 500
            store_path = "/tmp/x.sqlite3"
        "#;
        let c = Config::from_sources(Some(user));
        assert_eq!(c.bpm(), 240.0);
        assert_eq!(c.store_path(), PathBuf::from("/tmp/x.sqlite3"));
        assert_eq!(c.log_filter(), "info");
    }

    #[test]
    fn broken_user_file_is_ignored() {
        let c = Config::from_sources(Some("bpm = [not toml"));
        assert_eq!(c.bpm(), 120.0);
    }

    #[test]
    fn cli_dir_beats_config() {
        let c = Config::from_sources(Some("[defaults]\nsample_dir = \"/a\""))
            .with_sample_dir(Some(PathBuf::from("/b")));
        assert_eq!(c.sample_dir(), PathBuf::from("/b"));
        let c = Config::from_sources(Some("[defaults]\nsample_dir = \"/a\"")).with_sample_dir(None);
        assert_eq!(c.sample_dir(), PathBuf::from("/a"));
    }
}
