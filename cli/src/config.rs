use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use pantry_core::selection::SelectionRetention;

pub const DEFAULT_SPOONACULAR_URL: &str = "https://api.spoonacular.com";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub spoonacular_url: String,
    pub spoonacular_api_key: Option<String>,
    pub selection_retention: SelectionRetention,
    pub log_level: String,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            spoonacular_url: DEFAULT_SPOONACULAR_URL.to_string(),
            spoonacular_api_key: None,
            selection_retention: SelectionRetention::Remember,
            log_level: "warn".to_string(),
            timeout_secs: 10,
        }
    }
}

pub struct Config {
    pub data_dir: PathBuf,
    pub session_path: PathBuf,
    pub settings: Settings,
}

impl Config {
    /// Resolve the data directory and read settings from
    /// `<data_dir>/config.toml`, `PANTRY_*` variables and `config_file`, in
    /// that order of precedence (last wins).
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "pantry").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let settings = load_settings(&data_dir.join("config.toml"), config_file)?;
        let session_path = data_dir.join("session.json");

        Ok(Config {
            data_dir,
            session_path,
            settings,
        })
    }
}

pub(crate) fn load_settings(default_file: &Path, override_file: Option<&Path>) -> Result<Settings> {
    let mut builder = config::Config::builder()
        .add_source(config::File::from(default_file).required(false))
        .add_source(config::Environment::with_prefix("PANTRY"));
    if let Some(path) = override_file {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let settings: Settings = builder
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Invalid configuration")?;
    Ok(settings)
}

impl Settings {
    pub fn require_supabase(&self) -> Result<(&str, &str)> {
        if self.supabase_url.is_empty() || self.supabase_anon_key.is_empty() {
            anyhow::bail!(
                "Supabase is not configured. Set supabase_url and supabase_anon_key in config.toml \
                 or PANTRY_SUPABASE_URL / PANTRY_SUPABASE_ANON_KEY"
            );
        }
        Ok((&self.supabase_url, &self.supabase_anon_key))
    }
}
