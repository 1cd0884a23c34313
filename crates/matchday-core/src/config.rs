// Configuration loading and parsing (app.toml, weights.toml).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::engine::criteria::Criterion;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Engine settings (admin-tunable thresholds and weights)
// ---------------------------------------------------------------------------

/// Outcome thresholds, all expressed as percentages.
///
/// `draw_min`/`draw_max` describe the draw band shown to admins; the
/// classifier itself only consults `home_win` and `away_win`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub home_win: f64,
    pub draw_min: f64,
    pub draw_max: f64,
    pub away_win: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            home_win: 65.0,
            draw_min: 40.0,
            draw_max: 64.0,
            away_win: 39.0,
        }
    }
}

/// Per-criterion weights. Conventionally they sum to about 100 but nothing
/// enforces that.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub form_standings: f64,
    pub home_away: f64,
    pub player_availability: f64,
    pub match_stats: f64,
    pub h2h: f64,
    pub ai_predictions: f64,
    pub odds_agreement: f64,
    pub intangibles: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Weights {
            form_standings: 25.0,
            home_away: 10.0,
            player_availability: 15.0,
            match_stats: 20.0,
            h2h: 10.0,
            ai_predictions: 5.0,
            odds_agreement: 10.0,
            intangibles: 5.0,
        }
    }
}

impl Weights {
    pub fn for_criterion(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::FormStandings => self.form_standings,
            Criterion::HomeAway => self.home_away,
            Criterion::PlayerAvailability => self.player_availability,
            Criterion::MatchStats => self.match_stats,
            Criterion::HeadToHead => self.h2h,
            Criterion::AiPredictions => self.ai_predictions,
            Criterion::OddsAgreement => self.odds_agreement,
            Criterion::Intangibles => self.intangibles,
        }
    }

    pub fn total(&self) -> f64 {
        Criterion::ALL.iter().map(|c| self.for_criterion(*c)).sum()
    }
}

/// Everything the prediction engine needs from the admin panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineSettings {
    pub thresholds: Thresholds,
    pub weights: Weights,
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        let threshold_fields: &[(&str, f64)] = &[
            ("thresholds.home_win", t.home_win),
            ("thresholds.draw_min", t.draw_min),
            ("thresholds.draw_max", t.draw_max),
            ("thresholds.away_win", t.away_win),
        ];
        for (name, val) in threshold_fields {
            if !(0.0..=100.0).contains(val) {
                return Err(ConfigError::ValidationError {
                    field: name.to_string(),
                    message: format!("must be between 0 and 100 inclusive, got {val}"),
                });
            }
        }
        if t.draw_min > t.draw_max {
            return Err(ConfigError::ValidationError {
                field: "thresholds.draw_min".into(),
                message: format!(
                    "must not exceed thresholds.draw_max ({} > {})",
                    t.draw_min, t.draw_max
                ),
            });
        }

        for criterion in Criterion::ALL {
            let val = self.weights.for_criterion(criterion);
            if !val.is_finite() || val < 0.0 {
                return Err(ConfigError::ValidationError {
                    field: format!("weights.{}", criterion.key()),
                    message: format!("must be a finite number >= 0, got {val}"),
                });
            }
        }

        Ok(())
    }
}

/// Where the active engine settings came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSource {
    /// The admin settings row stored in the database.
    Database,
    /// `config/weights.toml`.
    File,
    /// Built-in defaults; neither of the above exists.
    Defaults,
}

/// Pick the active engine settings: stored admin row, then weights.toml,
/// then built-in defaults.
pub fn resolve_settings(
    stored: Option<EngineSettings>,
    config: &Config,
) -> (EngineSettings, SettingsSource) {
    if let Some(settings) = stored {
        return (settings, SettingsSource::Database);
    }
    match config.engine {
        Some(settings) => (settings, SettingsSource::File),
        None => (EngineSettings::default(), SettingsSource::Defaults),
    }
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// Settings from `weights.toml`, `None` when that file is absent.
    pub engine: Option<EngineSettings>,
    pub db_path: String,
    pub runner: RunnerConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// app.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire app.toml file.
#[derive(Debug, Clone, Deserialize)]
struct AppFile {
    #[serde(default)]
    database: DatabaseSection,
    runner: RunnerConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct DatabaseSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` still wins when set.
    pub filter: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/app.toml` and (optionally)
/// `config/weights.toml`, relative to `base_dir`.
///
/// This does not auto-copy defaults; prefer `load_config()`.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- app.toml (required) ---
    let app_path = config_dir.join("app.toml");
    let app_text = read_file(&app_path)?;
    let app_file: AppFile = toml::from_str(&app_text).map_err(|e| ConfigError::ParseError {
        path: app_path.clone(),
        source: e,
    })?;

    // --- weights.toml (optional) ---
    let weights_path = config_dir.join("weights.toml");
    let engine = if weights_path.exists() {
        let text = read_file(&weights_path)?;
        let settings: EngineSettings =
            toml::from_str(&text).map_err(|e| ConfigError::ParseError {
                path: weights_path.clone(),
                source: e,
            })?;
        Some(settings)
    } else {
        None
    };

    let db_path = app_file
        .database
        .path
        .unwrap_or_else(default_db_path);

    let config = Config {
        engine,
        db_path,
        runner: app_file.runner,
        logging: app_file.logging,
    };

    validate(&config)?;

    Ok(config)
}

/// Config files seeded from `defaults/` on first run. `weights.toml` is
/// optional and only ships as `weights.toml.example`, so it is never seeded.
const SEEDED_CONFIG_FILES: &[&str] = &["app.toml"];

/// Copy each missing seeded file from `defaults/` into `config/`. Returns the
/// files that were written; existing files are never touched.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");
    let copy_error = |message: String| ConfigError::DefaultsCopyError { message };

    let mut copied = Vec::new();
    for name in SEEDED_CONFIG_FILES {
        let target = config_dir.join(name);
        if target.exists() {
            continue;
        }
        let source = defaults_dir.join(name);
        if !source.is_file() {
            return Err(copy_error(format!(
                "config/{name} is missing and there is no defaults/{name} in {} to seed it from",
                base_dir.display()
            )));
        }

        std::fs::create_dir_all(&config_dir)
            .map_err(|e| copy_error(format!("failed to create config directory: {e}")))?;
        if copy_if_absent(&source, &target)
            .map_err(|e| copy_error(format!("failed to seed {}: {e}", target.display())))?
        {
            copied.push(target);
        }
    }

    Ok(copied)
}

/// `create_new` so a file written concurrently by another process wins.
fn copy_if_absent(source: &Path, target: &Path) -> std::io::Result<bool> {
    use std::io::Write;

    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(dest) => dest,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e),
    };
    dest.write_all(&std::fs::read(source)?)?;
    Ok(true)
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

/// Database location when app.toml does not name one: the platform's local
/// data directory, falling back to the working directory.
fn default_db_path() -> String {
    directories::ProjectDirs::from("", "", "matchday")
        .map(|dirs| dirs.data_local_dir().join("matchday.db"))
        .unwrap_or_else(|| PathBuf::from("matchday.db"))
        .to_string_lossy()
        .into_owned()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.runner.max_concurrency == 0 {
        return Err(ConfigError::ValidationError {
            field: "runner.max_concurrency".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".into(),
            message: "must not be empty".into(),
        });
    }

    if let Some(engine) = &config.engine {
        engine.validate()?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
