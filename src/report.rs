//! Terminal rendering of trial lists and run summaries.

use std::fmt::Write;

use primex_core::{Trial, TrialCondition};
use primex_experiment::export::{summary_table, Cell};
use primex_experiment::{
    interpret, ExperimentConfig, Interpretation, InterpretationBands, Paradigm, ResultRecord,
    SummaryStatistics,
};
use serde::Serialize;

/// Display name of a Stroop language code, falling back to the code itself.
pub fn language_name(config: &ExperimentConfig, code: &str) -> String {
    match &config.paradigm {
        Paradigm::Stroop(p) => p
            .languages
            .iter()
            .find(|l| l.code == code)
            .map(|l| l.name.clone())
            .unwrap_or_else(|| code.to_string()),
        _ => code.to_string(),
    }
}

pub fn interpretation(config: &ExperimentConfig, summary: &SummaryStatistics) -> Interpretation {
    interpret(summary, &InterpretationBands::default(), |code| {
        language_name(config, code)
    })
}

/// Machine-readable run report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport<'a> {
    pub experiment_id: &'a str,
    pub participant_id: &'a str,
    pub external_id: Option<&'a str>,
    pub summary: &'a SummaryStatistics,
    pub interpretation: &'a Interpretation,
}

fn condition_label(condition: &TrialCondition) -> String {
    match condition {
        TrialCondition::Stroop {
            language,
            word,
            ink_color,
            congruent,
            ..
        } => format!(
            "[{language}] {word} in {ink_color} ({})",
            if *congruent { "congruent" } else { "incongruent" }
        ),
        TrialCondition::NumberPriming {
            prime,
            target,
            congruent,
        } => format!(
            "{prime} -> {target} ({})",
            if *congruent { "congruent" } else { "incongruent" }
        ),
        TrialCondition::GenericPriming {
            prime,
            target,
            condition,
            ..
        } => format!("{prime} -> {target} ({condition})"),
    }
}

pub fn render_trials(trials: &[Trial]) -> String {
    let mut out = String::new();
    for (i, trial) in trials.iter().enumerate() {
        let answer = trial.correct_response.as_deref().unwrap_or("-");
        let _ = writeln!(
            out,
            "{:>4}  {:<44} {}",
            i + 1,
            condition_label(&trial.condition),
            answer
        );
    }
    let _ = writeln!(out, "{} trials", trials.len());
    out
}

/// One line per stored row: who, which trial, what they answered and how fast.
pub fn render_records(records: &[ResultRecord]) -> String {
    let mut out = String::new();
    for r in records {
        let verdict = match r.correct {
            Some(true) => "correct",
            Some(false) => "wrong",
            None => "-",
        };
        let rt = r
            .rt
            .map_or_else(|| "timeout".to_string(), |rt| format!("{:.0}ms", rt));
        let _ = writeln!(
            out,
            "{:<24} {:>4}  {:<16} {:<12} {:<8} {}",
            r.external_id.as_deref().unwrap_or(&r.participant_id),
            r.trial_number,
            r.paradigm,
            r.response.as_deref().unwrap_or("-"),
            verdict,
            rt
        );
    }
    let _ = writeln!(out, "{} rows", records.len());
    out
}

pub fn render_summary(
    config: &ExperimentConfig,
    summary: &SummaryStatistics,
    interpretation: &Interpretation,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", config.name);
    let _ = writeln!(out, "{}", "=".repeat(config.name.chars().count().max(8)));
    let table = summary_table(summary);
    let width = table
        .rows
        .iter()
        .filter_map(|row| row.first())
        .map(|c| c.to_string().chars().count())
        .max()
        .unwrap_or(0);
    for row in &table.rows {
        let (metric, value) = match row.as_slice() {
            [metric, value, ..] => (metric.to_string(), value),
            _ => continue,
        };
        let value = match value {
            Cell::Empty => "-".to_string(),
            other => other.to_string(),
        };
        let _ = writeln!(out, "  {metric:<width$}  {value}");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Effect: {}", interpretation.band);
    let _ = writeln!(out, "{}", interpretation.text);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use primex_core::TrialResult;
    use primex_experiment::{summarize, PrimeMode};

    fn stroop_result(n: usize, language: &str, congruent: bool, rt: f64) -> TrialResult {
        TrialResult {
            trial_number: n,
            condition: TrialCondition::Stroop {
                language: language.into(),
                ink_color: "red".into(),
                ink_hex: "#ff4444".into(),
                word: "RED".into(),
                word_meaning: "red".into(),
                congruent,
            },
            correct_response: Some("red".into()),
            response: Some("red".into()),
            rt_ms: Some(rt),
            correct: Some(true),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn language_codes_resolve_to_names() {
        let config = ExperimentConfig::stroop("en", "he").unwrap();
        assert_eq!(language_name(&config, "he"), "Hebrew");
        assert_eq!(language_name(&config, "fr"), "fr");
    }

    #[test]
    fn summary_mentions_dominant_language_by_name() {
        let config = ExperimentConfig::stroop("en", "he").unwrap();
        let results = vec![
            stroop_result(1, "en", true, 500.0),
            stroop_result(2, "en", false, 580.0),
            stroop_result(3, "he", true, 520.0),
            stroop_result(4, "he", false, 530.0),
        ];
        let summary = summarize(&results, config.paradigm.kind());
        let interp = interpretation(&config, &summary);
        let text = render_summary(&config, &summary, &interp);
        assert!(text.starts_with("Stroop Language Dominance\n"));
        assert!(text.contains("Effect: robust"), "{text}");
        assert!(text.contains("English"), "{text}");
    }

    #[test]
    fn stored_rows_prefer_the_external_id() {
        let mut timed_out = stroop_result(2, "he", false, 0.0);
        timed_out.response = None;
        timed_out.rt_ms = None;
        timed_out.correct = Some(false);
        let mut first = ResultRecord::from_result(&stroop_result(1, "en", true, 512.4));
        first.participant_id = "p_1_abcdefghi".into();
        first.external_id = Some("prolific-7".into());
        let mut second = ResultRecord::from_result(&timed_out);
        second.participant_id = "p_1_abcdefghi".into();

        let text = render_records(&[first, second]);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("prolific-7"), "{text}");
        assert!(lines[0].ends_with("correct  512ms"), "{text}");
        assert!(lines[1].starts_with("p_1_abcdefghi"), "{text}");
        assert!(lines[1].ends_with("timeout"), "{text}");
        assert_eq!(lines[2], "2 rows");
    }

    #[test]
    fn trial_listing_counts_trials() {
        let config = ExperimentConfig::number_priming(PrimeMode::Masked);
        let trials = primex_experiment::generate(&config, &mut rand::rng()).unwrap();
        let text = render_trials(&trials);
        assert_eq!(text.lines().count(), 49);
        assert!(text.ends_with("48 trials\n"));
    }
}
