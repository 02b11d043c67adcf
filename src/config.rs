//! Startup settings: built-in defaults, an optional JSON file, then
//! environment and command-line overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Settings file looked up in the working directory when no explicit path is set.
pub const DEFAULT_CONFIG_FILE: &str = "housing-explorer.json";
/// Points at a settings file.
pub const CONFIG_ENV: &str = "HOUSING_EXPLORER_CONFIG";
/// Overrides `dataset_path`.
pub const DATA_ENV: &str = "HOUSING_EXPLORER_DATA";
/// Dataset picked up from the working directory when nothing else is configured.
pub const DEFAULT_DATASET: &str = "Affordable_Housing_by_Town_2011-2022.csv";

/// Bounds of the "top N towns" slider.
pub const TOP_N_MIN: usize = 5;
pub const TOP_N_MAX: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Dataset to load at startup.
    pub dataset_path: Option<PathBuf>,
    /// Initial value of the top-N slider; clamped to its bounds.
    pub default_top_n: usize,
    /// Initial window size in logical points.
    pub window_size: [f32; 2],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dataset_path: None,
            default_top_n: 20,
            window_size: [1200.0, 900.0],
        }
    }
}

/// Where the dataset path came from. Only the implicit default may be absent.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetSource {
    Explicit(PathBuf),
    Default(PathBuf),
}

impl Settings {
    /// Resolve settings from the process environment and arguments.
    pub fn load() -> Result<Self> {
        let file = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let data = std::env::var_os(DATA_ENV).map(PathBuf::from);
        let arg = std::env::args_os().nth(1).map(PathBuf::from);
        Self::resolve(file.as_deref(), data, arg)
    }

    /// Defaults → settings file → data env var → CLI argument.
    ///
    /// An explicitly named settings file must exist; the implicit
    /// [`DEFAULT_CONFIG_FILE`] is optional.
    pub fn resolve(
        config_file: Option<&Path>,
        data_env: Option<PathBuf>,
        cli_arg: Option<PathBuf>,
    ) -> Result<Self> {
        let mut settings = match config_file {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        if let Some(path) = data_env {
            settings.dataset_path = Some(path);
        }
        if let Some(path) = cli_arg {
            settings.dataset_path = Some(path);
        }
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&text)
            .with_context(|| format!("parsing settings file {}", path.display()))?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn top_n(&self) -> usize {
        self.default_top_n.clamp(TOP_N_MIN, TOP_N_MAX)
    }

    pub fn dataset_source(&self) -> DatasetSource {
        match &self.dataset_path {
            Some(path) => DatasetSource::Explicit(path.clone()),
            None => DatasetSource::Default(PathBuf::from(DEFAULT_DATASET)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn settings_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn file_values_fill_missing_fields_with_defaults() {
        let file = settings_file(r#"{ "default_top_n": 12 }"#);
        let settings = Settings::resolve(Some(file.path()), None, None).unwrap();
        assert_eq!(settings.default_top_n, 12);
        assert_eq!(settings.window_size, Settings::default().window_size);
        assert_eq!(settings.dataset_path, None);
    }

    #[test]
    fn cli_argument_beats_env_beats_file() {
        let file = settings_file(r#"{ "dataset_path": "from-file.csv" }"#);
        let env = Some(PathBuf::from("from-env.csv"));
        let arg = Some(PathBuf::from("from-arg.csv"));

        let s = Settings::resolve(Some(file.path()), None, None).unwrap();
        assert_eq!(s.dataset_path, Some(PathBuf::from("from-file.csv")));
        let s = Settings::resolve(Some(file.path()), env.clone(), None).unwrap();
        assert_eq!(s.dataset_path, Some(PathBuf::from("from-env.csv")));
        let s = Settings::resolve(Some(file.path()), env, arg).unwrap();
        assert_eq!(s.dataset_path, Some(PathBuf::from("from-arg.csv")));
    }

    #[test]
    fn invalid_or_missing_settings_file_is_an_error() {
        let file = settings_file("{ not json");
        let err = Settings::resolve(Some(file.path()), None, None).unwrap_err();
        assert!(format!("{err:#}").contains("parsing settings file"));

        let err = Settings::resolve(Some(Path::new("/nonexistent/settings.json")), None, None)
            .unwrap_err();
        assert!(format!("{err:#}").contains("reading settings file"));
    }

    #[test]
    fn top_n_is_clamped_to_slider_bounds() {
        let mut s = Settings::default();
        assert_eq!(s.top_n(), 20);
        s.default_top_n = 1;
        assert_eq!(s.top_n(), TOP_N_MIN);
        s.default_top_n = 500;
        assert_eq!(s.top_n(), TOP_N_MAX);
    }

    #[test]
    fn dataset_source_distinguishes_default() {
        let mut s = Settings::default();
        assert_eq!(
            s.dataset_source(),
            DatasetSource::Default(PathBuf::from(DEFAULT_DATASET))
        );
        s.dataset_path = Some(PathBuf::from("x.csv"));
        assert_eq!(s.dataset_source(), DatasetSource::Explicit(PathBuf::from("x.csv")));
    }
}
