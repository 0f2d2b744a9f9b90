//! Configuration types for the cube runner.
//!
//! All configuration is loaded from environment variables. The runner needs
//! to know how to reach the inference service, which model serves each
//! archetype, where the world roster and prompt templates live, where saved
//! state goes, and how fast the simulation loop turns.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use cubes_db::StoreBackend;

use crate::archetype::Archetype;
use crate::error::RunnerError;

/// Complete runner configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Inference backend configuration.
    pub backend: LlmBackendConfig,
    /// Per-archetype model overrides.
    pub model_overrides: BTreeMap<Archetype, String>,
    /// Directory with prompt template overrides, if any.
    pub templates_dir: Option<PathBuf>,
    /// YAML world roster (cubes, points of interest, lore).
    pub world_file: PathBuf,
    /// Which persistence backend holds saved state.
    pub state_backend: StoreBackend,
    /// Directory for the file backend.
    pub state_dir: PathBuf,
    /// `Dragonfly` URL for the dragonfly backend.
    pub dragonfly_url: String,
    /// Loop cadences.
    pub timing: LoopTiming,
    /// Radius within which cubes can teach each other.
    pub social_radius: f64,
    /// Identity reminders given to each cube before they are dropped.
    pub identity_hint_limit: u32,
}

/// Configuration for the inference backend.
#[derive(Debug, Clone)]
pub struct LlmBackendConfig {
    /// The backend type.
    pub backend_type: BackendType,
    /// Base API URL, or the full endpoint for the proxy backend.
    pub api_url: String,
    /// API key for authentication. Empty for the local proxy.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Supported inference backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible chat completions API.
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
    /// Local reverse proxy in front of a model runtime.
    Proxy,
}

impl FromStr for BackendType {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "deepseek" | "ollama" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "proxy" | "local" => Ok(Self::Proxy),
            other => Err(RunnerError::Config(format!("unknown backend type: {other}"))),
        }
    }
}

/// Cadences of the simulation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    /// One scheduling frame: attention, tick scheduling, notification flush.
    pub frame: Duration,
    /// Expired modifier pruning.
    pub prune: Duration,
    /// Periodic state save.
    pub save: Duration,
    /// Social learning draws.
    pub social: Duration,
    /// Autonomous ticks are suppressed this long after user input.
    pub quiet_period: Duration,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            frame: Duration::from_millis(250),
            prune: Duration::from_secs(1),
            save: Duration::from_secs(30),
            social: Duration::from_secs(5),
            quiet_period: Duration::from_secs(20),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `LLM_BACKEND` -- `proxy`, `openai` or `anthropic` (default `proxy`)
    /// - `LLM_API_URL` -- API base URL (default `http://127.0.0.1:3001/api/chat`)
    /// - `LLM_API_KEY` -- API key (default empty)
    /// - `INFERENCE_TIMEOUT_MS` -- per-call timeout (default 20000)
    /// - `LLM_MODEL_SAGE`, `LLM_MODEL_SOCIALITE`, `LLM_MODEL_EXPLORER`,
    ///   `LLM_MODEL_TRICKSTER`, `LLM_MODEL_EVERYCUBE` -- model overrides
    /// - `TEMPLATES_DIR` -- prompt template overrides (default: built-in)
    /// - `WORLD_FILE` -- world roster (default `cubes.yaml`)
    /// - `STATE_BACKEND` -- `memory`, `file` or `dragonfly` (default `file`)
    /// - `STATE_DIR` -- file backend directory (default `.cubes-state`)
    /// - `DRAGONFLY_URL` -- dragonfly backend URL (default `redis://localhost:6379`)
    /// - `FRAME_INTERVAL_MS` (250), `PRUNE_INTERVAL_MS` (1000),
    ///   `SAVE_INTERVAL_SECS` (30), `SOCIAL_INTERVAL_SECS` (5),
    ///   `QUIET_PERIOD_SECS` (20) -- loop cadences
    /// - `SOCIAL_RADIUS` -- teaching radius in world units (default 6.0)
    /// - `IDENTITY_HINT_LIMIT` -- identity reminders per cube (default 3)
    pub fn from_env() -> Result<Self, RunnerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RunnerError> {
        let backend_type: BackendType = lookup("LLM_BACKEND")
            .unwrap_or_else(|| "proxy".to_owned())
            .parse()?;
        let backend = LlmBackendConfig {
            backend_type,
            api_url: lookup("LLM_API_URL")
                .unwrap_or_else(|| "http://127.0.0.1:3001/api/chat".to_owned())
                .trim_end_matches('/')
                .to_owned(),
            api_key: lookup("LLM_API_KEY").unwrap_or_default(),
            timeout: Duration::from_millis(parse_or(&lookup, "INFERENCE_TIMEOUT_MS", 20_000)?),
        };

        let model_overrides = Archetype::ALL
            .into_iter()
            .filter_map(|archetype| {
                lookup(&format!("LLM_MODEL_{}", archetype.env_suffix()))
                    .map(|model| (archetype, model))
            })
            .collect();

        let state_backend: StoreBackend = lookup("STATE_BACKEND")
            .unwrap_or_else(|| "file".to_owned())
            .parse()?;

        let timing = LoopTiming {
            frame: Duration::from_millis(parse_or(&lookup, "FRAME_INTERVAL_MS", 250)?),
            prune: Duration::from_millis(parse_or(&lookup, "PRUNE_INTERVAL_MS", 1_000)?),
            save: Duration::from_secs(parse_or(&lookup, "SAVE_INTERVAL_SECS", 30)?),
            social: Duration::from_secs(parse_or(&lookup, "SOCIAL_INTERVAL_SECS", 5)?),
            quiet_period: Duration::from_secs(parse_or(&lookup, "QUIET_PERIOD_SECS", 20)?),
        };
        if [timing.frame, timing.prune, timing.save, timing.social]
            .iter()
            .any(Duration::is_zero)
        {
            return Err(RunnerError::Config(
                "loop intervals must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            backend,
            model_overrides,
            templates_dir: lookup("TEMPLATES_DIR").map(PathBuf::from),
            world_file: PathBuf::from(
                lookup("WORLD_FILE").unwrap_or_else(|| "cubes.yaml".to_owned()),
            ),
            state_backend,
            state_dir: PathBuf::from(
                lookup("STATE_DIR").unwrap_or_else(|| ".cubes-state".to_owned()),
            ),
            dragonfly_url: lookup("DRAGONFLY_URL")
                .unwrap_or_else(|| "redis://localhost:6379".to_owned()),
            timing,
            social_radius: parse_or(&lookup, "SOCIAL_RADIUS", 6.0)?,
            identity_hint_limit: parse_or(&lookup, "IDENTITY_HINT_LIMIT", 3)?,
        })
    }
}

/// Parse an optional variable, falling back to `default` when unset.
fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, RunnerError>
where
    T: FromStr,
    T::Err: Display,
{
    lookup(name).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e| RunnerError::Config(format!("invalid {name}: {e}")))
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = RunnerConfig::from_lookup(|_| None);
        assert!(config.is_ok());
        let Ok(config) = config else { return };
        assert_eq!(config.backend.backend_type, BackendType::Proxy);
        assert_eq!(config.backend.timeout, Duration::from_secs(20));
        assert_eq!(config.state_backend, StoreBackend::File);
        assert_eq!(config.timing, LoopTiming::default());
        assert_eq!(config.identity_hint_limit, 3);
        assert!(config.templates_dir.is_none());
        assert!(config.model_overrides.is_empty());
    }

    #[test]
    fn overrides_are_read() {
        let config = RunnerConfig::from_lookup(lookup_from(&[
            ("LLM_BACKEND", "Anthropic"),
            ("LLM_API_URL", "https://api.anthropic.com/v1/"),
            ("LLM_MODEL_SAGE", "claude-haiku-4-5"),
            ("STATE_BACKEND", "memory"),
            ("QUIET_PERIOD_SECS", "5"),
        ]));
        let Ok(config) = config else {
            panic!("config should load");
        };
        assert_eq!(config.backend.backend_type, BackendType::Anthropic);
        assert_eq!(config.backend.api_url, "https://api.anthropic.com/v1");
        assert_eq!(
            config.model_overrides.get(&Archetype::Sage).map(String::as_str),
            Some("claude-haiku-4-5")
        );
        assert_eq!(config.state_backend, StoreBackend::Memory);
        assert_eq!(config.timing.quiet_period, Duration::from_secs(5));
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let bad_number = RunnerConfig::from_lookup(lookup_from(&[("FRAME_INTERVAL_MS", "fast")]));
        assert!(matches!(bad_number, Err(RunnerError::Config(_))));

        let bad_backend = RunnerConfig::from_lookup(lookup_from(&[("LLM_BACKEND", "carrier-pigeon")]));
        assert!(matches!(bad_backend, Err(RunnerError::Config(_))));

        let zero_frame = RunnerConfig::from_lookup(lookup_from(&[("FRAME_INTERVAL_MS", "0")]));
        assert!(matches!(zero_frame, Err(RunnerError::Config(_))));
    }
}
