use chrono::{DateTime, Utc};
use primex_core::TrialResult;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Serialize;

/// `p_<unix millis>_<9 random alphanumerics>`.
pub fn generate_participant_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let suffix: String = (0..9)
        .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_lowercase())
        .collect();
    format!("p_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// Mutable state of one run. Owned by exactly one sequencer; a new run gets a
/// new instance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    participant_id: String,
    external_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
    current_trial: usize,
    running: bool,
    results: Vec<TrialResult>,
}

impl RunState {
    pub fn new(participant_id: String, external_id: Option<String>) -> Self {
        Self {
            participant_id,
            external_id,
            started_at: None,
            current_trial: 0,
            running: false,
            results: Vec::new(),
        }
    }

    pub fn with_random_id(external_id: Option<String>) -> Self {
        Self::new(generate_participant_id(&mut rand::rng()), external_id)
    }

    pub(crate) fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.running = true;
    }

    pub(crate) fn stop(&mut self) {
        self.running = false;
    }

    /// Appends a result and advances the position. Only the evaluator calls this.
    pub(crate) fn push_result(&mut self, result: TrialResult) {
        self.results.push(result);
        self.current_trial += 1;
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Index of the trial in progress, which is also the number completed.
    pub fn current_trial(&self) -> usize {
        self.current_trial
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn results(&self) -> &[TrialResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<TrialResult> {
        self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn participant_id_has_expected_shape() {
        let id = generate_participant_id(&mut StdRng::seed_from_u64(1));
        let parts: Vec<_> = id.split('_').collect();
        assert_eq!(parts.len(), 3, "{id}");
        assert_eq!(parts[0], "p");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn participant_ids_do_not_repeat() {
        let mut rng = rand::rng();
        let ids: HashSet<_> = (0..1000)
            .map(|_| generate_participant_id(&mut rng))
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn new_run_is_idle_and_empty() {
        let run = RunState::with_random_id(Some("prolific-42".into()));
        assert!(!run.is_running());
        assert_eq!(run.current_trial(), 0);
        assert!(run.results().is_empty());
        assert_eq!(run.external_id(), Some("prolific-42"));
        assert!(run.participant_id().starts_with("p_"));
    }
}
