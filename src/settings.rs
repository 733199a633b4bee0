//! Settings and experiment files.
//!
//! Two TOML documents: `.priming-toolbox.toml` for tool settings and
//! experiment files holding an [`ExperimentConfig`] plus optional
//! experimenter details.

use std::path::Path;

use anyhow::{bail, Context, Result};
use primex_core::StimulusKind;
use primex_experiment::config::{
    GenericPrimingParams, Pairing, PresentationMode, ResponseKeys, StimulusSet,
};
use primex_experiment::{ExperimentConfig, Experimenter, PrimeMode};
use serde::{Deserialize, Serialize};

pub const SETTINGS_FILE: &str = ".priming-toolbox.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub persistence: PersistenceSettings,

    #[serde(default)]
    pub simulation: SimulationSettings,

    #[serde(default)]
    pub export: ExportSettings,

    #[serde(default)]
    pub share: ShareSettings,
}

/// Where results go when `--save` is given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceSettings {
    /// PostgREST-compatible base URL.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Overrides the experiment's own table name.
    #[serde(default)]
    pub table: Option<String>,

    /// Seconds to wait for a pending save before exiting.
    #[serde(default = "default_save_wait")]
    pub save_wait_seconds: u64,
}

fn default_save_wait() -> u64 {
    10
}

/// Behaviour of the simulated participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    #[serde(default = "default_mean_rt")]
    pub mean_rt_ms: f64,

    #[serde(default = "default_sd_rt")]
    pub sd_rt_ms: f64,

    /// Probability of pressing the correct key.
    #[serde(default = "default_accuracy")]
    pub accuracy: f64,

    /// Extra time on incongruent or baseline trials.
    #[serde(default = "default_effect")]
    pub effect_ms: f64,

    /// Probability of letting the window time out. Ignored without a timeout.
    #[serde(default = "default_miss_rate")]
    pub miss_rate: f64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            mean_rt_ms: default_mean_rt(),
            sd_rt_ms: default_sd_rt(),
            accuracy: default_accuracy(),
            effect_ms: default_effect(),
            miss_rate: default_miss_rate(),
        }
    }
}

fn default_mean_rt() -> f64 {
    550.0
}

fn default_sd_rt() -> f64 {
    80.0
}

fn default_accuracy() -> f64 {
    0.95
}

fn default_effect() -> f64 {
    40.0
}

fn default_miss_rate() -> f64 {
    0.02
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Prefix CSV files with a UTF-8 byte-order mark.
    #[serde(default = "default_true")]
    pub bom: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self { bom: true }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareSettings {
    /// Page participants open; the token is appended as `?exp=`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ShareSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "https://example.org/priming/run.html".to_string()
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Returns `Ok(None)` when there is no settings file in the current directory.
    pub fn load_default() -> Result<Option<Self>> {
        let path = Path::new(SETTINGS_FILE);
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        for (name, p) in [("accuracy", sim.accuracy), ("miss_rate", sim.miss_rate)] {
            if !(0.0..=1.0).contains(&p) {
                bail!("simulation.{name} must be between 0.0 and 1.0, got {p}");
            }
        }
        if sim.mean_rt_ms <= 0.0 || sim.sd_rt_ms < 0.0 {
            bail!("simulation RT parameters must be positive");
        }
        Ok(())
    }

    pub fn default_toml() -> String {
        r#"# priming-toolbox settings

[persistence]
# PostgREST-compatible endpoint used by `simulate --save`.
# May also come from PRIMEX_API_URL / PRIMEX_API_KEY.
# url = "https://your-project.supabase.co"
# api_key = "..."
# table = "experiment_results"
save_wait_seconds = 10

[simulation]
mean_rt_ms = 550.0
sd_rt_ms = 80.0
accuracy = 0.95
effect_ms = 40.0
miss_rate = 0.02

[export]
bom = true

[share]
base_url = "https://example.org/priming/run.html"
"#
        .to_string()
    }
}

/// Contents of an experiment file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimenter: Option<Experimenter>,
    pub experiment: ExperimentConfig,
}

impl ExperimentFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read experiment file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse experiment file: {}", path.display()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize experiment")
    }
}

/// Built-in experiments by name.
pub fn preset(spec: &str) -> Result<ExperimentConfig> {
    let parts: Vec<&str> = spec.split(':').collect();
    match parts.as_slice() {
        ["stroop", l1, l2] => Ok(ExperimentConfig::stroop(l1, l2)?),
        ["number"] | ["number", "masked"] => Ok(ExperimentConfig::number_priming(PrimeMode::Masked)),
        ["number", "explicit"] => Ok(ExperimentConfig::number_priming(PrimeMode::Explicit)),
        ["generic"] => Ok(lexical_decision()),
        _ => bail!(
            "unknown preset '{spec}' (expected stroop:<lang>:<lang>, number:masked, number:explicit or generic)"
        ),
    }
}

/// Semantic priming with a lexical decision: related and unrelated word
/// primes before word and nonword targets.
fn lexical_decision() -> ExperimentConfig {
    let words = |items: &[&str]| StimulusSet {
        kind: StimulusKind::Text,
        items: items.iter().map(|s| s.to_string()).collect(),
    };
    let pair = |p, t, condition: &str, answer: &str| Pairing {
        prime_index: p,
        target_index: t,
        condition: condition.to_string(),
        correct_response: Some(answer.to_string()),
    };
    let params = GenericPrimingParams {
        primes: words(&["doctor", "bread", "table", "river"]),
        targets: words(&["nurse", "butter", "chair", "water", "blick", "frenk"]),
        pairings: Some(vec![
            pair(0, 0, "related", "word"),
            pair(1, 1, "related", "word"),
            pair(2, 2, "related", "word"),
            pair(3, 3, "related", "word"),
            pair(0, 1, "unrelated", "word"),
            pair(1, 2, "unrelated", "word"),
            pair(2, 3, "unrelated", "word"),
            pair(3, 0, "unrelated", "word"),
            pair(0, 4, "nonword", "nonword"),
            pair(2, 5, "nonword", "nonword"),
        ]),
        repetitions: 2,
        presentation: PresentationMode::Sequential,
        baseline_condition: Some("unrelated".to_string()),
    };
    let mut config =
        ExperimentConfig::generic(params, ResponseKeys::new([("word", "j"), ("nonword", "f")]));
    config.id = "lexical_decision".to_string();
    config.name = "Semantic Priming (Lexical Decision)".to_string();
    config
}
