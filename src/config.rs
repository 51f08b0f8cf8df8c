use std::path::PathBuf;

use anyhow::Result;

pub const ENV_LEGACY_DB: &str = "CUTOVER_LEGACY_DB";
pub const ENV_TARGET_DB: &str = "CUTOVER_TARGET_DB";
pub const ENV_REPORT_DIR: &str = "CUTOVER_REPORT_DIR";
pub const ENV_LOG_DIR: &str = "CUTOVER_LOG_DIR";
pub const ENV_LOG_JSON: &str = "CUTOVER_LOG_JSON";

const APP_DIR: &str = "cutover";

/// Values supplied on the command line. `None` falls through to the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub legacy_db: Option<PathBuf>,
    pub target_db: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub json_logs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub legacy_db: PathBuf,
    pub target_db: PathBuf,
    pub report_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub json_logs: bool,
}

impl Config {
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Flags beat environment, environment beats defaults.
    pub fn resolve_with<F>(overrides: ConfigOverrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = |key: &str| env(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);
        let base = default_data_dir()?;
        Ok(Config {
            legacy_db: overrides
                .legacy_db
                .or_else(|| from_env(ENV_LEGACY_DB))
                .unwrap_or_else(|| base.join("legacy.sqlite3")),
            target_db: overrides
                .target_db
                .or_else(|| from_env(ENV_TARGET_DB))
                .unwrap_or_else(|| base.join("target.sqlite3")),
            report_dir: overrides
                .report_dir
                .or_else(|| from_env(ENV_REPORT_DIR))
                .unwrap_or_else(|| base.join("reports")),
            log_dir: overrides.log_dir.or_else(|| from_env(ENV_LOG_DIR)),
            json_logs: overrides.json_logs || env(ENV_LOG_JSON).is_some_and(|v| truthy(&v)),
        })
    }
}

fn truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn default_data_dir() -> Result<PathBuf> {
    let base = match dirs::data_dir() {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    Ok(base.join(APP_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn flags_override_environment() {
        let config = Config::resolve_with(
            ConfigOverrides {
                legacy_db: Some("/flag/legacy.db".into()),
                ..ConfigOverrides::default()
            },
            env(&[(ENV_LEGACY_DB, "/env/legacy.db"), (ENV_TARGET_DB, "/env/target.db")]),
        )
        .unwrap();
        assert_eq!(config.legacy_db, PathBuf::from("/flag/legacy.db"));
        assert_eq!(config.target_db, PathBuf::from("/env/target.db"));
    }

    #[test]
    fn defaults_live_under_data_dir() {
        let config = Config::resolve_with(ConfigOverrides::default(), env(&[])).unwrap();
        assert!(config.report_dir.ends_with("cutover/reports"));
        assert!(config.legacy_db.ends_with("cutover/legacy.sqlite3"));
        assert_eq!(config.log_dir, None);
        assert!(!config.json_logs);
    }

    #[test]
    fn json_logs_accepts_truthy_env() {
        let config =
            Config::resolve_with(ConfigOverrides::default(), env(&[(ENV_LOG_JSON, "TRUE")])).unwrap();
        assert!(config.json_logs);
        let config =
            Config::resolve_with(ConfigOverrides::default(), env(&[(ENV_LOG_JSON, "0")])).unwrap();
        assert!(!config.json_logs);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let config =
            Config::resolve_with(ConfigOverrides::default(), env(&[(ENV_REPORT_DIR, "  ")])).unwrap();
        assert!(config.report_dir.ends_with("cutover/reports"));
    }
}
