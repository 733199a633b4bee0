use std::collections::{BTreeMap, BTreeSet};

use primex_core::{StimulusKind, TrialPhase};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Everything a run needs, fixed once the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub paradigm: Paradigm,
    #[serde(default)]
    pub timing: PhaseDurations,
    #[serde(default)]
    pub response_keys: ResponseKeys,
    #[serde(default = "default_randomize")]
    pub randomize: bool,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub data: DataConfig,
}

fn default_randomize() -> bool {
    true
}

/// Paradigm identifier together with its condition parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Paradigm {
    Stroop(StroopParams),
    NumberPriming(NumberPrimingParams),
    GenericPriming(GenericPrimingParams),
}

impl Paradigm {
    pub fn kind(&self) -> ParadigmKind {
        match self {
            Paradigm::Stroop(_) => ParadigmKind::Stroop,
            Paradigm::NumberPriming(_) => ParadigmKind::NumberPriming,
            Paradigm::GenericPriming(_) => ParadigmKind::GenericPriming,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParadigmKind {
    Stroop,
    NumberPriming,
    GenericPriming,
}

impl ParadigmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParadigmKind::Stroop => "stroop",
            ParadigmKind::NumberPriming => "numberPriming",
            ParadigmKind::GenericPriming => "genericPriming",
        }
    }
}

/// Phase durations in milliseconds. A zero duration skips the phase, except
/// `target_timeout` where zero means the window never times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhaseDurations {
    pub fixation: u64,
    pub forward_mask: u64,
    pub prime: u64,
    pub backward_mask: u64,
    pub target_timeout: u64,
    pub feedback: u64,
    pub inter_trial: u64,
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            fixation: 500,
            forward_mask: 0,
            prime: 0,
            backward_mask: 0,
            target_timeout: 2000,
            feedback: 500,
            inter_trial: 500,
        }
    }
}

impl PhaseDurations {
    pub fn of(&self, phase: TrialPhase) -> u64 {
        match phase {
            TrialPhase::Fixation => self.fixation,
            TrialPhase::ForwardMask => self.forward_mask,
            TrialPhase::Prime => self.prime,
            TrialPhase::BackwardMask => self.backward_mask,
            TrialPhase::Target => self.target_timeout,
            TrialPhase::Feedback => self.feedback,
            TrialPhase::InterTrial => self.inter_trial,
        }
    }
}

/// Response label → physical key. Keys match case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseKeys(pub BTreeMap<String, String>);

impl ResponseKeys {
    pub fn new<L, K>(pairs: impl IntoIterator<Item = (L, K)>) -> Self
    where
        L: Into<String>,
        K: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(l, k)| (l.into(), k.into()))
                .collect(),
        )
    }

    pub fn label_for_key(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, bound)| bound.eq_ignore_ascii_case(key))
            .map(|(label, _)| label.as_str())
    }

    pub fn key_for(&self, label: &str) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.0.contains_key(label)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackConfig {
    pub show: bool,
    pub correct_text: String,
    pub incorrect_text: String,
    pub timeout_text: String,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            show: true,
            correct_text: "Correct!".to_string(),
            incorrect_text: "Incorrect".to_string(),
            timeout_text: "Too slow!".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataConfig {
    pub save: bool,
    pub table_name: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            save: false,
            table_name: "experiment_results".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stroop

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InkColor {
    pub name: String,
    pub hex: String,
}

/// Colour words of one language, keyed by colour name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lexicon {
    pub code: String,
    pub name: String,
    pub words: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StroopParams {
    pub colors: Vec<InkColor>,
    /// One language, or two distinct languages for the dominance variant.
    pub languages: Vec<Lexicon>,
    pub congruent_reps: usize,
    pub incongruent_reps: usize,
}

const STROOP_COLORS: [(&str, &str); 4] = [
    ("red", "#ff4444"),
    ("green", "#44ff44"),
    ("blue", "#4444ff"),
    ("yellow", "#ffff44"),
];

// (code, name, [red, green, blue, yellow])
const STROOP_LEXICON: [(&str, &str, [&str; 4]); 8] = [
    ("en", "English", ["RED", "GREEN", "BLUE", "YELLOW"]),
    ("he", "Hebrew", ["אדום", "ירוק", "כחול", "צהוב"]),
    ("es", "Spanish", ["ROJO", "VERDE", "AZUL", "AMARILLO"]),
    ("fr", "French", ["ROUGE", "VERT", "BLEU", "JAUNE"]),
    ("de", "German", ["ROT", "GRÜN", "BLAU", "GELB"]),
    ("ru", "Russian", ["КРАСНЫЙ", "ЗЕЛЁНЫЙ", "СИНИЙ", "ЖЁЛТЫЙ"]),
    ("ar", "Arabic", ["أحمر", "أخضر", "أزرق", "أصفر"]),
    ("zh", "Chinese", ["红色", "绿色", "蓝色", "黄色"]),
];

/// Built-in colour-word lexicon for the standard four Stroop colours.
pub fn builtin_lexicon(code: &str) -> Option<Lexicon> {
    STROOP_LEXICON
        .iter()
        .find(|(c, _, _)| *c == code)
        .map(|(code, name, words)| Lexicon {
            code: code.to_string(),
            name: name.to_string(),
            words: STROOP_COLORS
                .iter()
                .zip(words.iter())
                .map(|((color, _), word)| (color.to_string(), word.to_string()))
                .collect(),
        })
}

pub fn builtin_language_codes() -> impl Iterator<Item = &'static str> {
    STROOP_LEXICON.iter().map(|(code, _, _)| *code)
}

impl StroopParams {
    /// Standard four colours, 3 congruent + 3 incongruent reps per colour.
    pub fn with_languages(codes: &[&str]) -> Result<Self> {
        let languages = codes
            .iter()
            .map(|code| {
                builtin_lexicon(code)
                    .ok_or_else(|| Error::invalid(format!("unknown Stroop language '{code}'")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            colors: STROOP_COLORS
                .iter()
                .map(|(name, hex)| InkColor {
                    name: name.to_string(),
                    hex: hex.to_string(),
                })
                .collect(),
            languages,
            congruent_reps: 3,
            incongruent_reps: 3,
        })
    }

    pub fn expected_trials(&self) -> usize {
        self.colors.len() * (self.congruent_reps + self.incongruent_reps) * self.languages.len()
    }

    fn validate(&self) -> Result<()> {
        if self.colors.is_empty() {
            return Err(Error::invalid("Stroop needs at least one ink colour"));
        }
        let names: BTreeSet<_> = self.colors.iter().map(|c| c.name.as_str()).collect();
        if names.len() != self.colors.len() {
            return Err(Error::invalid("Stroop ink colour names must be unique"));
        }
        match self.languages.as_slice() {
            [] => return Err(Error::invalid("Stroop needs at least one language")),
            [_] => {}
            [a, b] if a.code == b.code => {
                return Err(Error::invalid(format!(
                    "the two Stroop languages must differ (both are '{}')",
                    a.code
                )));
            }
            [_, _] => {}
            _ => return Err(Error::invalid("Stroop supports at most two languages")),
        }
        for lexicon in &self.languages {
            if let Some(missing) = names.iter().find(|n| !lexicon.words.contains_key(**n)) {
                return Err(Error::invalid(format!(
                    "language '{}' has no word for colour '{missing}'",
                    lexicon.code
                )));
            }
        }
        if self.incongruent_reps > 0 && self.colors.len() < 2 {
            return Err(Error::invalid(
                "incongruent Stroop trials need at least two colours",
            ));
        }
        if self.congruent_reps + self.incongruent_reps == 0 {
            return Err(Error::invalid("Stroop repetitions are all zero"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Number priming

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrimeMode {
    #[default]
    Masked,
    Explicit,
}

impl PrimeMode {
    pub fn prime_duration_ms(&self) -> u64 {
        match self {
            PrimeMode::Masked => 43,
            PrimeMode::Explicit => 200,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrimeMode::Masked => "masked",
            PrimeMode::Explicit => "explicit",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            PrimeMode::Masked => "masked (subliminal)",
            PrimeMode::Explicit => "explicit",
        }
    }
}

pub const SMALLER: &str = "smaller";
pub const LARGER: &str = "larger";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NumberPrimingParams {
    pub numbers: Vec<i64>,
    pub reference: i64,
    pub trials_per_condition: usize,
    pub mode: PrimeMode,
    pub mask: String,
}

impl Default for NumberPrimingParams {
    fn default() -> Self {
        Self {
            numbers: (1..=9).collect(),
            reference: 5,
            trials_per_condition: 12,
            mode: PrimeMode::Masked,
            mask: "####".to_string(),
        }
    }
}

impl NumberPrimingParams {
    /// Numbers below and above the reference; the reference itself is in neither.
    pub fn partition(&self) -> (Vec<i64>, Vec<i64>) {
        let smaller = self
            .numbers
            .iter()
            .copied()
            .filter(|n| *n < self.reference)
            .collect();
        let larger = self
            .numbers
            .iter()
            .copied()
            .filter(|n| *n > self.reference)
            .collect();
        (smaller, larger)
    }

    pub fn expected_trials(&self) -> usize {
        self.trials_per_condition * 4
    }

    fn validate(&self) -> Result<()> {
        let (smaller, larger) = self.partition();
        if smaller.is_empty() {
            return Err(Error::invalid(format!(
                "no numbers smaller than the reference {}",
                self.reference
            )));
        }
        if larger.is_empty() {
            return Err(Error::invalid(format!(
                "no numbers larger than the reference {}",
                self.reference
            )));
        }
        if self.trials_per_condition == 0 {
            return Err(Error::invalid("trialsPerCondition must be at least 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Generic priming

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusSet {
    pub kind: StimulusKind,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pairing {
    pub prime_index: usize,
    pub target_index: usize,
    pub condition: String,
    #[serde(default)]
    pub correct_response: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PresentationMode {
    #[default]
    Sequential,
    Simultaneous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericPrimingParams {
    pub primes: StimulusSet,
    pub targets: StimulusSet,
    #[serde(default)]
    pub pairings: Option<Vec<Pairing>>,
    #[serde(default = "default_repetitions")]
    pub repetitions: usize,
    #[serde(default)]
    pub presentation: PresentationMode,
    /// Condition label compared against all other conditions for the effect size.
    #[serde(default)]
    pub baseline_condition: Option<String>,
}

fn default_repetitions() -> usize {
    1
}

impl GenericPrimingParams {
    pub fn expected_trials(&self) -> usize {
        let units = match &self.pairings {
            Some(pairings) => pairings.len(),
            None => self.primes.items.len() * self.targets.items.len(),
        };
        units * self.repetitions
    }

    fn validate(&self) -> Result<()> {
        if self.repetitions == 0 {
            return Err(Error::invalid("repetitions must be at least 1"));
        }
        match &self.pairings {
            Some(pairings) => {
                if pairings.is_empty() {
                    return Err(Error::invalid("pairings list is empty"));
                }
                for (i, p) in pairings.iter().enumerate() {
                    if p.prime_index >= self.primes.items.len() {
                        return Err(Error::invalid(format!(
                            "pairing {i}: prime index {} out of range",
                            p.prime_index
                        )));
                    }
                    if p.target_index >= self.targets.items.len() {
                        return Err(Error::invalid(format!(
                            "pairing {i}: target index {} out of range",
                            p.target_index
                        )));
                    }
                }
            }
            None => {
                if self.primes.items.is_empty() || self.targets.items.is_empty() {
                    return Err(Error::invalid(
                        "generic priming needs at least one prime and one target",
                    ));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------

impl ExperimentConfig {
    /// Two-language Stroop with the built-in lexicon.
    pub fn stroop(lang1: &str, lang2: &str) -> Result<Self> {
        let params = StroopParams::with_languages(&[lang1, lang2])?;
        let response_keys = ResponseKeys::new(
            params
                .colors
                .iter()
                .map(|c| (c.name.clone(), c.name.chars().take(1).collect::<String>())),
        );
        Ok(Self {
            id: format!("stroop_lang_{lang1}_{lang2}"),
            name: "Stroop Language Dominance".to_string(),
            paradigm: Paradigm::Stroop(params),
            timing: PhaseDurations {
                fixation: 500,
                forward_mask: 0,
                prime: 0,
                backward_mask: 0,
                target_timeout: 0,
                feedback: 300,
                inter_trial: 0,
            },
            response_keys,
            randomize: true,
            feedback: FeedbackConfig::default(),
            data: DataConfig::default(),
        })
    }

    /// Dehaene-style masked number comparison against a reference.
    pub fn number_priming(mode: PrimeMode) -> Self {
        Self {
            id: format!("number_priming_{}", mode.as_str()),
            name: "Number Priming".to_string(),
            paradigm: Paradigm::NumberPriming(NumberPrimingParams {
                mode,
                ..NumberPrimingParams::default()
            }),
            timing: PhaseDurations {
                fixation: 500,
                forward_mask: 71,
                prime: mode.prime_duration_ms(),
                backward_mask: 71,
                target_timeout: 5000,
                feedback: 300,
                inter_trial: 1000,
            },
            response_keys: ResponseKeys::new([(SMALLER, "ArrowLeft"), (LARGER, "ArrowRight")]),
            randomize: true,
            feedback: FeedbackConfig::default(),
            data: DataConfig::default(),
        }
    }

    pub fn generic(params: GenericPrimingParams, response_keys: ResponseKeys) -> Self {
        Self {
            id: "generic_priming".to_string(),
            name: "Generic Priming".to_string(),
            paradigm: Paradigm::GenericPriming(params),
            timing: PhaseDurations {
                prime: 200,
                ..PhaseDurations::default()
            },
            response_keys,
            randomize: true,
            feedback: FeedbackConfig::default(),
            data: DataConfig::default(),
        }
    }

    /// Rejects malformed or contradictory parameters before any trial exists.
    pub fn validate(&self) -> Result<()> {
        match &self.paradigm {
            Paradigm::Stroop(p) => p.validate()?,
            Paradigm::NumberPriming(p) => p.validate()?,
            Paradigm::GenericPriming(p) => p.validate()?,
        }
        self.validate_keys()
    }

    fn validate_keys(&self) -> Result<()> {
        if self.response_keys.is_empty() {
            return Err(Error::invalid("no response keys bound"));
        }
        let mut seen = BTreeSet::new();
        for (label, key) in &self.response_keys.0 {
            if key.trim().is_empty() {
                return Err(Error::invalid(format!("response '{label}' has no key")));
            }
            if !seen.insert(key.to_ascii_lowercase()) {
                return Err(Error::invalid(format!(
                    "key '{key}' is bound to more than one response"
                )));
            }
        }
        for label in self.answer_labels() {
            if !self.response_keys.contains_label(&label) {
                return Err(Error::invalid(format!(
                    "correct response '{label}' has no key binding"
                )));
            }
        }
        Ok(())
    }

    /// Labels that can be a trial's correct response.
    fn answer_labels(&self) -> Vec<String> {
        match &self.paradigm {
            Paradigm::Stroop(p) => p.colors.iter().map(|c| c.name.clone()).collect(),
            Paradigm::NumberPriming(_) => vec![SMALLER.to_string(), LARGER.to_string()],
            Paradigm::GenericPriming(p) => p
                .pairings
                .iter()
                .flatten()
                .filter_map(|pairing| pairing.correct_response.clone())
                .collect(),
        }
    }

    /// Arithmetic prediction of how many trials `generate` will produce.
    pub fn expected_trial_count(&self) -> usize {
        match &self.paradigm {
            Paradigm::Stroop(p) => p.expected_trials(),
            Paradigm::NumberPriming(p) => p.expected_trials(),
            Paradigm::GenericPriming(p) => p.expected_trials(),
        }
    }

    /// Phases played before the target, with their durations, zero-duration
    /// phases omitted.
    pub fn lead_in(&self) -> Vec<(TrialPhase, u64)> {
        let phases: &[TrialPhase] = match &self.paradigm {
            Paradigm::Stroop(_) => &[TrialPhase::Fixation],
            Paradigm::NumberPriming(_) => &TrialPhase::LEAD_IN,
            Paradigm::GenericPriming(p) => match p.presentation {
                PresentationMode::Simultaneous => &[TrialPhase::Fixation],
                PresentationMode::Sequential => &[
                    TrialPhase::Fixation,
                    TrialPhase::Prime,
                    TrialPhase::BackwardMask,
                ],
            },
        };
        phases
            .iter()
            .map(|p| (*p, self.timing.of(*p)))
            .filter(|(_, ms)| *ms > 0)
            .collect()
    }

    pub fn mask_pattern(&self) -> Option<&str> {
        match &self.paradigm {
            Paradigm::NumberPriming(p) => Some(&p.mask),
            _ => None,
        }
    }
}
