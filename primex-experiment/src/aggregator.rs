//! End-of-run statistics and their plain-language reading.
//!
//! Everything here is recomputed from the complete result list; nothing is
//! maintained incrementally.

use std::collections::BTreeMap;
use std::fmt;

use primex_core::{Contrast, TrialCondition, TrialResult, stats};
use serde::Serialize;

use crate::config::ParadigmKind;

/// Which results feed the reaction-time statistics. Timeouts never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RtFilter {
    /// Only `correct == Some(true)`.
    CorrectOnly,
    /// Anything not marked incorrect, including unscored responses.
    NonIncorrect,
}

impl RtFilter {
    pub fn for_paradigm(kind: ParadigmKind) -> Self {
        match kind {
            ParadigmKind::Stroop | ParadigmKind::NumberPriming => RtFilter::CorrectOnly,
            ParadigmKind::GenericPriming => RtFilter::NonIncorrect,
        }
    }

    fn admits(&self, r: &TrialResult) -> Option<f64> {
        let rt = r.rt_ms?;
        let keep = match self {
            RtFilter::CorrectOnly => r.correct == Some(true),
            RtFilter::NonIncorrect => r.correct != Some(false),
        };
        keep.then_some(rt)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageSummary {
    pub language: String,
    pub trials: usize,
    pub mean_rt: Option<f64>,
    pub congruent_mean_rt: Option<f64>,
    pub incongruent_mean_rt: Option<f64>,
    pub effect: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionSummary {
    pub condition: String,
    pub trials: usize,
    pub mean_rt: Option<f64>,
}

/// Derived view of a run. Never stored as authoritative state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStatistics {
    pub paradigm: ParadigmKind,
    pub rt_filter: RtFilter,
    pub total_trials: usize,
    /// Trials whose correctness is defined.
    pub scored_trials: usize,
    pub correct_count: usize,
    pub timeouts: usize,
    pub accuracy: Option<f64>,
    pub error_rate: Option<f64>,
    pub mean_rt: Option<f64>,
    pub median_rt: Option<f64>,
    pub sd_rt: Option<f64>,
    /// Congruent trials, or the non-baseline conditions of generic priming.
    pub treatment_mean_rt: Option<f64>,
    /// Incongruent trials, or the baseline condition of generic priming.
    pub baseline_mean_rt: Option<f64>,
    /// `baseline_mean_rt - treatment_mean_rt`. Positive means responses were
    /// faster under the treatment (congruent) condition.
    pub effect: Option<f64>,
    pub languages: Vec<LanguageSummary>,
    pub conditions: Vec<ConditionSummary>,
}

impl SummaryStatistics {
    /// Language with the larger effect. Needs two languages with an effect
    /// each; a tie goes to the second.
    pub fn dominant_language(&self) -> Option<&LanguageSummary> {
        match self.languages.as_slice() {
            [a, b] => {
                let (ea, eb) = (a.effect?, b.effect?);
                Some(if ea > eb { a } else { b })
            }
            _ => None,
        }
    }
}

fn mean_where<'a>(
    results: impl Iterator<Item = &'a TrialResult>,
    filter: RtFilter,
) -> Option<f64> {
    let rts: Vec<f64> = results.filter_map(|r| filter.admits(r)).collect();
    stats::mean(&rts)
}

fn contrast_means<'a, I>(results: I, filter: RtFilter) -> (Option<f64>, Option<f64>, Option<f64>)
where
    I: Iterator<Item = &'a TrialResult> + Clone,
{
    let of = |c: Contrast| {
        mean_where(
            results.clone().filter(move |r| r.condition.contrast() == Some(c)),
            filter,
        )
    };
    let treatment = of(Contrast::Treatment);
    let baseline = of(Contrast::Baseline);
    let effect = baseline.zip(treatment).map(|(b, t)| b - t);
    (treatment, baseline, effect)
}

pub fn summarize(results: &[TrialResult], paradigm: ParadigmKind) -> SummaryStatistics {
    let filter = RtFilter::for_paradigm(paradigm);

    let scored_trials = results.iter().filter(|r| r.correct.is_some()).count();
    let correct_count = results.iter().filter(|r| r.correct == Some(true)).count();
    let timeouts = results.iter().filter(|r| r.is_timeout()).count();
    let total = results.len();
    let accuracy = (total > 0).then(|| correct_count as f64 / total as f64 * 100.0);

    let rts: Vec<f64> = results.iter().filter_map(|r| filter.admits(r)).collect();
    let (treatment_mean_rt, baseline_mean_rt, effect) = contrast_means(results.iter(), filter);

    let mut languages: Vec<LanguageSummary> = Vec::new();
    let mut order: Vec<&str> = Vec::new();
    for r in results {
        if let Some(lang) = r.condition.language() {
            if !order.contains(&lang) {
                order.push(lang);
            }
        }
    }
    for lang in order {
        let of_lang = results
            .iter()
            .filter(move |r| r.condition.language() == Some(lang));
        let (congruent_mean_rt, incongruent_mean_rt, effect) = contrast_means(of_lang.clone(), filter);
        languages.push(LanguageSummary {
            language: lang.to_string(),
            trials: of_lang.clone().count(),
            mean_rt: mean_where(of_lang, filter),
            congruent_mean_rt,
            incongruent_mean_rt,
            effect,
        });
    }

    let mut by_condition: BTreeMap<&str, Vec<&TrialResult>> = BTreeMap::new();
    for r in results {
        if let TrialCondition::GenericPriming { condition, .. } = &r.condition {
            by_condition.entry(condition.as_str()).or_default().push(r);
        }
    }
    let conditions = by_condition
        .into_iter()
        .map(|(condition, rs)| ConditionSummary {
            condition: condition.to_string(),
            trials: rs.len(),
            mean_rt: mean_where(rs.into_iter(), filter),
        })
        .collect();

    SummaryStatistics {
        paradigm,
        rt_filter: filter,
        total_trials: total,
        scored_trials,
        correct_count,
        timeouts,
        accuracy,
        error_rate: accuracy.map(|a| 100.0 - a),
        mean_rt: stats::mean(&rts),
        median_rt: stats::median(&rts),
        sd_rt: stats::std_dev(&rts),
        treatment_mean_rt,
        baseline_mean_rt,
        effect,
        languages,
        conditions,
    }
}

/// Qualitative reading of an effect size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectBand {
    /// Accuracy too low for the effect to mean anything.
    Unreliable,
    Robust,
    Moderate,
    Small,
    NoEffect,
    Reversed,
    /// No effect could be computed.
    Undetermined,
}

impl fmt::Display for EffectBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EffectBand::Unreliable => "unreliable",
            EffectBand::Robust => "robust",
            EffectBand::Moderate => "moderate",
            EffectBand::Small => "small",
            EffectBand::NoEffect => "none",
            EffectBand::Reversed => "reversed",
            EffectBand::Undetermined => "undetermined",
        };
        f.write_str(s)
    }
}

/// Band thresholds in percent and milliseconds. `robust_ms` must exceed
/// `moderate_ms`, which must be non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpretationBands {
    pub min_accuracy: f64,
    pub robust_ms: f64,
    pub moderate_ms: f64,
}

impl Default for InterpretationBands {
    fn default() -> Self {
        Self {
            min_accuracy: 60.0,
            robust_ms: 30.0,
            moderate_ms: 10.0,
        }
    }
}

impl InterpretationBands {
    /// Effects are banded on whole milliseconds.
    pub fn classify(&self, effect: Option<f64>, accuracy: Option<f64>) -> EffectBand {
        if accuracy.is_some_and(|a| a < self.min_accuracy) {
            return EffectBand::Unreliable;
        }
        let Some(effect) = effect.map(f64::round) else {
            return EffectBand::Undetermined;
        };
        if effect > self.robust_ms {
            EffectBand::Robust
        } else if effect > self.moderate_ms {
            EffectBand::Moderate
        } else if effect > 0.0 {
            EffectBand::Small
        } else if effect == 0.0 {
            EffectBand::NoEffect
        } else {
            EffectBand::Reversed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interpretation {
    pub band: EffectBand,
    pub text: String,
}

fn condition_names(paradigm: ParadigmKind) -> (&'static str, &'static str) {
    match paradigm {
        ParadigmKind::GenericPriming => ("treatment", "baseline"),
        _ => ("congruent", "incongruent"),
    }
}

/// Deterministic text for a summary. `language_name` maps language codes to
/// display names for the dominance sentence.
pub fn interpret(
    summary: &SummaryStatistics,
    bands: &InterpretationBands,
    language_name: impl Fn(&str) -> String,
) -> Interpretation {
    let band = bands.classify(summary.effect, summary.accuracy);
    let (fast, slow) = condition_names(summary.paradigm);
    let effect = summary.effect.map(f64::round).unwrap_or_default();

    let mut text = match band {
        EffectBand::Unreliable => format!(
            "Accuracy ({:.1}%) was below {}%, so the effect cannot be reliably interpreted.",
            summary.accuracy.unwrap_or_default(),
            bands.min_accuracy
        ),
        EffectBand::Undetermined => format!(
            "No effect could be computed: there were no usable {fast} and {slow} responses to compare."
        ),
        EffectBand::Robust => format!(
            "A robust effect of {effect}ms: {fast} trials were answered clearly faster than {slow} trials."
        ),
        EffectBand::Moderate => format!(
            "A moderate effect of {effect}ms: {fast} trials were answered faster than {slow} trials."
        ),
        EffectBand::Small => format!(
            "A small effect of {effect}ms in the expected direction ({fast} faster than {slow})."
        ),
        EffectBand::NoEffect => format!(
            "No effect: {fast} and {slow} trials were answered equally fast."
        ),
        EffectBand::Reversed => format!(
            "A reversed effect of {}ms: {slow} trials were answered faster than {fast} trials.",
            effect.abs()
        ),
    };

    if band != EffectBand::Unreliable {
        if let Some(sentence) = dominance_sentence(summary, &language_name) {
            text.push(' ');
            text.push_str(&sentence);
        }
    }
    Interpretation { band, text }
}

fn dominance_sentence(
    summary: &SummaryStatistics,
    language_name: &impl Fn(&str) -> String,
) -> Option<String> {
    let dominant = summary.dominant_language()?;
    let [a, b] = summary.languages.as_slice() else {
        return None;
    };
    let (ea, eb) = (a.effect?.round(), b.effect?.round());
    let (na, nb) = (language_name(&a.language), language_name(&b.language));
    let nd = language_name(&dominant.language);

    let sentence = if (ea > 0.0 && eb < 0.0) || (ea < 0.0 && eb > 0.0) {
        format!(
            "Only one language showed a classic Stroop effect ({na}: {ea}ms, {nb}: {eb}ms), \
             suggesting {nd} is the more dominant language for reading."
        )
    } else if ea < 0.0 && eb < 0.0 {
        format!(
            "Both languages showed reversed effects ({na}: {ea}ms, {nb}: {eb}ms); \
             based on the smaller reversal, {nd} may be the more dominant language."
        )
    } else {
        format!(
            "The Stroop effect was {na}: {ea}ms and {nb}: {eb}ms. A larger effect indicates more \
             automatic word reading, suggesting {nd} is the more dominant language."
        )
    };
    Some(sentence)
}
