// Runtime configuration, read once from the environment at process start

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TEMPLATE: &str = "langsupport-dev";
pub const DEFAULT_LANGUAGE: &str = "python";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Limits and resources applied to every environment the provider creates
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxSettings {
    pub workdir: String,
    pub memory_limit_mb: u32,
    pub cpu_limit: f32,
    pub lifetime_secs: u64,
    pub network_enabled: bool,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            workdir: "/code".to_string(),
            memory_limit_mb: 512,
            cpu_limit: 1.0,
            lifetime_secs: 300,
            network_enabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Template the environment provider instantiates per request
    pub template_id: String,
    pub default_language: String,
    pub compile_timeout: Duration,
    pub run_timeout: Duration,
    pub max_run_timeout: Duration,
    pub max_source_bytes: usize,
    pub max_input_bytes: usize,
    pub languages_config: Option<PathBuf>,
    pub bind_addr: String,
    pub sandbox: SandboxSettings,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            template_id: DEFAULT_TEMPLATE.to_string(),
            default_language: DEFAULT_LANGUAGE.to_string(),
            compile_timeout: Duration::from_millis(5000),
            run_timeout: Duration::from_millis(10_000),
            max_run_timeout: Duration::from_millis(30_000),
            max_source_bytes: 1024 * 1024,
            max_input_bytes: 10 * 1024 * 1024,
            languages_config: None,
            bind_addr: "0.0.0.0:3001".to_string(),
            sandbox: SandboxSettings::default(),
        }
    }
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but reads values through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let sandbox_defaults = SandboxSettings::default();

        Ok(Self {
            template_id: lookup("ARBITER_TEMPLATE").unwrap_or(defaults.template_id),
            default_language: lookup("ARBITER_DEFAULT_LANGUAGE")
                .unwrap_or(defaults.default_language),
            compile_timeout: millis(&lookup, "ARBITER_COMPILE_TIMEOUT_MS", defaults.compile_timeout)?,
            run_timeout: millis(&lookup, "ARBITER_RUN_TIMEOUT_MS", defaults.run_timeout)?,
            max_run_timeout: millis(&lookup, "ARBITER_MAX_RUN_TIMEOUT_MS", defaults.max_run_timeout)?,
            max_source_bytes: parsed(&lookup, "ARBITER_MAX_SOURCE_BYTES", defaults.max_source_bytes)?,
            max_input_bytes: parsed(&lookup, "ARBITER_MAX_INPUT_BYTES", defaults.max_input_bytes)?,
            languages_config: lookup("ARBITER_LANGUAGES_CONFIG").map(PathBuf::from),
            bind_addr: lookup("ARBITER_BIND_ADDR").unwrap_or(defaults.bind_addr),
            sandbox: SandboxSettings {
                workdir: sandbox_defaults.workdir,
                memory_limit_mb: parsed(
                    &lookup,
                    "ARBITER_MEMORY_LIMIT_MB",
                    sandbox_defaults.memory_limit_mb,
                )?,
                cpu_limit: parsed(&lookup, "ARBITER_CPU_LIMIT", sandbox_defaults.cpu_limit)?,
                lifetime_secs: parsed(
                    &lookup,
                    "ARBITER_SANDBOX_LIFETIME_SECS",
                    sandbox_defaults.lifetime_secs,
                )?,
                network_enabled: parsed(
                    &lookup,
                    "ARBITER_SANDBOX_NETWORK",
                    sandbox_defaults.network_enabled,
                )?,
            },
        })
    }
}

fn parsed<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn millis<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let ms: u64 = parsed(lookup, key, default.as_millis() as u64)?;
    if ms == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
        });
    }
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = RunnerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, RunnerConfig::default());
        assert_eq!(config.template_id, "langsupport-dev");
        assert_eq!(config.compile_timeout, Duration::from_secs(5));
        assert!(!config.sandbox.network_enabled);
    }

    #[test]
    fn test_overrides() {
        let config = RunnerConfig::from_lookup(lookup_from(&[
            ("ARBITER_TEMPLATE", "judge-v2"),
            ("ARBITER_COMPILE_TIMEOUT_MS", "8000"),
            ("ARBITER_LANGUAGES_CONFIG", "config/languages.json"),
            ("ARBITER_CPU_LIMIT", "0.5"),
            ("ARBITER_SANDBOX_NETWORK", "TRUE"),
        ]))
        .unwrap();

        assert_eq!(config.template_id, "judge-v2");
        assert_eq!(config.compile_timeout, Duration::from_millis(8000));
        assert_eq!(
            config.languages_config,
            Some(PathBuf::from("config/languages.json"))
        );
        assert_eq!(config.sandbox.cpu_limit, 0.5);
        assert!(config.sandbox.network_enabled);
    }

    #[test]
    fn test_malformed_value_is_an_error() {
        let err = RunnerConfig::from_lookup(lookup_from(&[("ARBITER_RUN_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "ARBITER_RUN_TIMEOUT_MS",
                value: "soon".to_string()
            }
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(
            RunnerConfig::from_lookup(lookup_from(&[("ARBITER_COMPILE_TIMEOUT_MS", "0")]))
                .is_err()
        );
    }
}
