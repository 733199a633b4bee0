use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stimulus::Stimulus;

/// Which side of the condition contrast a trial falls on.
///
/// Congruent trials (and generic trials outside the baseline condition) are
/// the treatment group; incongruent and baseline trials are the comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Contrast {
    Treatment,
    Baseline,
}

/// Condition fields of a planned trial, per paradigm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "paradigm", rename_all = "camelCase")]
pub enum TrialCondition {
    #[serde(rename_all = "camelCase")]
    Stroop {
        language: String,
        ink_color: String,
        ink_hex: String,
        word: String,
        word_meaning: String,
        congruent: bool,
    },
    #[serde(rename_all = "camelCase")]
    NumberPriming {
        prime: i64,
        target: i64,
        congruent: bool,
    },
    #[serde(rename_all = "camelCase")]
    GenericPriming {
        prime_index: usize,
        target_index: usize,
        prime: String,
        target: String,
        condition: String,
        /// `None` when no baseline condition is configured.
        baseline: Option<bool>,
    },
}

impl TrialCondition {
    pub fn congruent(&self) -> Option<bool> {
        match self {
            TrialCondition::Stroop { congruent, .. }
            | TrialCondition::NumberPriming { congruent, .. } => Some(*congruent),
            TrialCondition::GenericPriming { .. } => None,
        }
    }

    pub fn contrast(&self) -> Option<Contrast> {
        let baseline = match self {
            TrialCondition::Stroop { congruent, .. }
            | TrialCondition::NumberPriming { congruent, .. } => Some(!*congruent),
            TrialCondition::GenericPriming { baseline, .. } => *baseline,
        }?;
        Some(if baseline {
            Contrast::Baseline
        } else {
            Contrast::Treatment
        })
    }

    pub fn language(&self) -> Option<&str> {
        match self {
            TrialCondition::Stroop { language, .. } => Some(language),
            _ => None,
        }
    }
}

/// What a front end shows in the prime and target phases of a trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialDisplay {
    pub prime: Option<Stimulus>,
    pub target: Stimulus,
}

/// One planned presentation unit. Read-only once generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trial {
    pub condition: TrialCondition,
    pub correct_response: Option<String>,
    pub display: TrialDisplay,
}

/// Recorded outcome of one played trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialResult {
    /// 1-based position in play order.
    pub trial_number: usize,
    pub condition: TrialCondition,
    pub correct_response: Option<String>,
    /// `None` means the response window timed out.
    pub response: Option<String>,
    /// Milliseconds from target onset, full precision.
    pub rt_ms: Option<f64>,
    pub correct: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

impl TrialResult {
    pub fn is_timeout(&self) -> bool {
        self.response.is_none()
    }

    /// Reaction time rounded to whole milliseconds for display.
    pub fn rt_display(&self) -> Option<i64> {
        self.rt_ms.map(|rt| rt.round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(congruent: bool) -> TrialCondition {
        TrialCondition::NumberPriming {
            prime: 3,
            target: if congruent { 2 } else { 8 },
            congruent,
        }
    }

    #[test]
    fn congruency_maps_to_contrast() {
        assert_eq!(number(true).contrast(), Some(Contrast::Treatment));
        assert_eq!(number(false).contrast(), Some(Contrast::Baseline));
    }

    #[test]
    fn generic_without_baseline_has_no_contrast() {
        let c = TrialCondition::GenericPriming {
            prime_index: 0,
            target_index: 1,
            prime: "doctor".into(),
            target: "nurse".into(),
            condition: "default".into(),
            baseline: None,
        };
        assert_eq!(c.contrast(), None);
        assert_eq!(c.congruent(), None);
    }

    #[test]
    fn rt_rounds_for_display_only() {
        let result = TrialResult {
            trial_number: 1,
            condition: number(true),
            correct_response: Some("smaller".into()),
            response: Some("smaller".into()),
            rt_ms: Some(512.6),
            correct: Some(true),
            timestamp: Utc::now(),
        };
        assert_eq!(result.rt_display(), Some(513));
        assert_eq!(result.rt_ms, Some(512.6));
        assert!(!result.is_timeout());
    }
}
