use chrono::{DateTime, Utc};
use primex_core::{Trial, TrialResult};

use crate::run::RunState;

/// Scores one response (or timeout, `response == None`) against a trial.
///
/// `trial_number` is 1-based. The reaction time is dropped on timeout so that
/// `rt_ms` is present exactly when `response` is.
pub fn evaluate(
    trial_number: usize,
    trial: &Trial,
    response: Option<&str>,
    rt_ms: Option<f64>,
    timestamp: DateTime<Utc>,
) -> TrialResult {
    let (correct, rt_ms) = match response {
        None => (trial.correct_response.as_ref().map(|_| false), None),
        Some(r) => (
            trial.correct_response.as_deref().map(|c| c == r),
            rt_ms.or(Some(0.0)),
        ),
    };
    TrialResult {
        trial_number,
        condition: trial.condition.clone(),
        correct_response: trial.correct_response.clone(),
        response: response.map(str::to_string),
        rt_ms,
        correct,
        timestamp,
    }
}

/// Evaluates the trial in progress and appends the result to the run.
pub fn record<'a>(
    run: &'a mut RunState,
    trial: &Trial,
    response: Option<&str>,
    rt_ms: Option<f64>,
) -> &'a TrialResult {
    let result = evaluate(run.current_trial() + 1, trial, response, rt_ms, Utc::now());
    tracing::debug!(
        trial = result.trial_number,
        response = result.response.as_deref().unwrap_or("<timeout>"),
        rt_ms = result.rt_ms,
        correct = result.correct,
        "trial scored"
    );
    run.push_result(result);
    let last = run.results().len() - 1;
    &run.results()[last]
}
