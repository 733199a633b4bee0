use std::time::Duration;

use primex_core::{FeedbackOutcome, Stimulus, Trial, TrialPhase, TrialResult};
use primex_timing::{Scheduler, Timer, TimerHandle};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::ExperimentConfig;
use crate::error::{Error, Result};
use crate::evaluator;
use crate::generator;
use crate::run::RunState;

/// What a front end needs to know as the run unfolds.
#[derive(Debug, Clone, PartialEq)]
pub enum SequencerEvent {
    /// `trial` is the 0-based index into the trial list.
    PhaseEntered {
        trial: usize,
        phase: TrialPhase,
        stimulus: Stimulus,
    },
    TrialCompleted(TrialResult),
    RunFinished { completed: usize },
}

/// Where the sequencer is. `Running` always names the trial in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Running { trial: usize, phase: TrialPhase },
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    PhaseElapsed { trial: usize, phase: TrialPhase },
    ResponseTimeout { trial: usize },
}

#[derive(Debug, Clone, Copy)]
struct ResponseWindow {
    trial: usize,
    onset_ns: u64,
    timeout: Option<TimerHandle>,
}

/// Plays a fixed trial list through its timed phases.
///
/// Single-threaded and cooperative: every phase schedules exactly one
/// transition on the internal [`Scheduler`]; the owner calls [`advance`]
/// whenever [`next_deadline`] passes and forwards key presses to
/// [`handle_key`]. The response window is a race between the first qualifying
/// response and the target timeout; whichever comes first disarms the other.
///
/// [`advance`]: Sequencer::advance
/// [`next_deadline`]: Sequencer::next_deadline
/// [`handle_key`]: Sequencer::handle_key
#[derive(Debug)]
pub struct Sequencer<T: Timer> {
    config: ExperimentConfig,
    lead_in: Vec<(TrialPhase, u64)>,
    trials: Vec<Trial>,
    timer: T,
    scheduler: Scheduler<Transition>,
    state: SequencerState,
    window: Option<ResponseWindow>,
    run: RunState,
}

impl<T: Timer> Sequencer<T> {
    pub fn new(config: ExperimentConfig, trials: Vec<Trial>, run: RunState, timer: T) -> Result<Self> {
        config.validate()?;
        if trials.is_empty() {
            return Err(Error::invalid("no trials to play"));
        }
        Ok(Self {
            lead_in: config.lead_in(),
            config,
            trials,
            timer,
            scheduler: Scheduler::new(),
            state: SequencerState::Idle,
            window: None,
            run,
        })
    }

    /// Generates the trial list and builds a sequencer around it.
    pub fn prepare<R: Rng + ?Sized>(
        config: ExperimentConfig,
        rng: &mut R,
        run: RunState,
        timer: T,
    ) -> Result<Self> {
        let trials = generator::generate(&config, rng)?;
        Self::new(config, trials, run, timer)
    }

    pub fn start(&mut self) -> Vec<SequencerEvent> {
        let mut events = Vec::new();
        if self.state != SequencerState::Idle {
            warn!(state = ?self.state, "start ignored, run already started");
            return events;
        }
        self.run.start();
        info!(
            participant = self.run.participant_id(),
            trials = self.trials.len(),
            "run started"
        );
        self.enter_trial(0, &mut events);
        events
    }

    /// Fires every transition that is due at the timer's current time.
    pub fn advance(&mut self) -> Vec<SequencerEvent> {
        let mut events = Vec::new();
        if self.is_terminal() {
            return events;
        }
        let now = self.timer.now();
        while let Some((_, transition)) = self.scheduler.pop_due(now) {
            match transition {
                Transition::PhaseElapsed { trial, phase } => {
                    self.on_phase_elapsed(trial, phase, &mut events)
                }
                Transition::ResponseTimeout { trial } => self.on_timeout(trial, &mut events),
            }
        }
        events
    }

    /// Maps a physical key to its response label; unbound keys are ignored.
    pub fn handle_key(&mut self, key: &str) -> Vec<SequencerEvent> {
        match self.config.response_keys.label_for_key(key) {
            Some(label) => {
                let label = label.to_string();
                self.respond(&label)
            }
            None => {
                debug!(key, "unbound key ignored");
                Vec::new()
            }
        }
    }

    /// Records a response if, and only if, the response window is open.
    pub fn respond(&mut self, label: &str) -> Vec<SequencerEvent> {
        let mut events = Vec::new();
        if !self.config.response_keys.contains_label(label) {
            debug!(label, "unknown response label ignored");
            return events;
        }
        let Some(window) = self.open_window() else {
            debug!(label, state = ?self.state, "response outside window ignored");
            return events;
        };
        let now = self.timer.now();
        let rt_ms = now.saturating_sub(window.onset_ns) as f64 / 1_000_000.0;
        if let Some(handle) = window.timeout {
            self.scheduler.cancel(handle);
        }
        self.close_window(window.trial, Some(label), Some(rt_ms), &mut events);
        events
    }

    /// Aborts the run. Pending transitions are dropped and nothing touches
    /// the run state afterwards.
    pub fn cancel(&mut self) {
        if self.is_terminal() {
            return;
        }
        let dropped = self.scheduler.cancel_all();
        self.window = None;
        self.state = SequencerState::Cancelled;
        self.run.stop();
        info!(
            completed = self.run.current_trial(),
            dropped_timers = dropped,
            "run cancelled"
        );
    }

    /// Cancels whatever is in flight and installs a fresh run, returning the
    /// previous run state.
    pub fn reset(&mut self, trials: Vec<Trial>, run: RunState) -> Result<RunState> {
        if trials.is_empty() {
            return Err(Error::invalid("no trials to play"));
        }
        self.cancel();
        self.scheduler.cancel_all();
        self.trials = trials;
        self.state = SequencerState::Idle;
        Ok(std::mem::replace(&mut self.run, run))
    }

    pub fn next_deadline(&self) -> Option<u64> {
        if self.is_terminal() {
            return None;
        }
        self.scheduler.next_deadline()
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == SequencerState::Finished
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            SequencerState::Finished | SequencerState::Cancelled
        )
    }

    pub fn awaiting_response(&self) -> bool {
        self.open_window().is_some()
    }

    /// (1-based trial in progress, total trials).
    pub fn progress(&self) -> (usize, usize) {
        let total = self.trials.len();
        ((self.run.current_trial() + 1).min(total), total)
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn run(&self) -> &RunState {
        &self.run
    }

    pub fn results(&self) -> &[TrialResult] {
        self.run.results()
    }

    pub fn into_run(self) -> RunState {
        self.run
    }

    fn open_window(&self) -> Option<ResponseWindow> {
        match (self.state, self.window) {
            (
                SequencerState::Running {
                    trial,
                    phase: TrialPhase::Target,
                },
                Some(w),
            ) if w.trial == trial => Some(w),
            _ => None,
        }
    }

    fn enter_trial(&mut self, trial: usize, events: &mut Vec<SequencerEvent>) {
        match self.lead_in.first().copied() {
            Some((phase, ms)) => self.enter_phase(trial, phase, ms, events),
            None => self.open_target(trial, events),
        }
    }

    fn enter_phase(
        &mut self,
        trial: usize,
        phase: TrialPhase,
        ms: u64,
        events: &mut Vec<SequencerEvent>,
    ) {
        self.state = SequencerState::Running { trial, phase };
        let now = self.timer.now();
        self.scheduler.schedule_after(
            now,
            Duration::from_millis(ms),
            Transition::PhaseElapsed { trial, phase },
        );
        debug!(trial, %phase, ms, "phase entered");
        events.push(SequencerEvent::PhaseEntered {
            trial,
            phase,
            stimulus: self.stimulus_for(trial, phase),
        });
    }

    fn open_target(&mut self, trial: usize, events: &mut Vec<SequencerEvent>) {
        let onset_ns = self.timer.now();
        self.state = SequencerState::Running {
            trial,
            phase: TrialPhase::Target,
        };
        let timeout_ms = self.config.timing.target_timeout;
        let timeout = (timeout_ms > 0).then(|| {
            self.scheduler.schedule_after(
                onset_ns,
                Duration::from_millis(timeout_ms),
                Transition::ResponseTimeout { trial },
            )
        });
        self.window = Some(ResponseWindow {
            trial,
            onset_ns,
            timeout,
        });
        debug!(trial, onset_ns, timeout_ms, "response window opened");
        events.push(SequencerEvent::PhaseEntered {
            trial,
            phase: TrialPhase::Target,
            stimulus: self.trials[trial].display.target.clone(),
        });
    }

    fn on_phase_elapsed(&mut self, trial: usize, phase: TrialPhase, events: &mut Vec<SequencerEvent>) {
        if self.state != (SequencerState::Running { trial, phase }) {
            debug!(trial, %phase, "stale transition dropped");
            return;
        }
        match phase {
            TrialPhase::Feedback => self.after_feedback(trial, events),
            TrialPhase::InterTrial => self.enter_trial(trial + 1, events),
            TrialPhase::Target => {}
            current => {
                let next = self
                    .lead_in
                    .iter()
                    .skip_while(|(p, _)| *p != current)
                    .nth(1)
                    .copied();
                match next {
                    Some((next_phase, ms)) => self.enter_phase(trial, next_phase, ms, events),
                    None => self.open_target(trial, events),
                }
            }
        }
    }

    fn on_timeout(&mut self, trial: usize, events: &mut Vec<SequencerEvent>) {
        match self.open_window() {
            Some(w) if w.trial == trial => {
                debug!(trial, "response window timed out");
                self.close_window(trial, None, None, events);
            }
            _ => debug!(trial, "stale timeout dropped"),
        }
    }

    fn close_window(
        &mut self,
        trial: usize,
        response: Option<&str>,
        rt_ms: Option<f64>,
        events: &mut Vec<SequencerEvent>,
    ) {
        self.window = None;
        let result = evaluator::record(&mut self.run, &self.trials[trial], response, rt_ms).clone();
        let feedback = self.feedback_for(&result);
        events.push(SequencerEvent::TrialCompleted(result));

        let feedback_ms = self.config.timing.feedback;
        if self.config.feedback.show && feedback_ms > 0 {
            self.state = SequencerState::Running {
                trial,
                phase: TrialPhase::Feedback,
            };
            let now = self.timer.now();
            self.scheduler.schedule_after(
                now,
                Duration::from_millis(feedback_ms),
                Transition::PhaseElapsed {
                    trial,
                    phase: TrialPhase::Feedback,
                },
            );
            events.push(SequencerEvent::PhaseEntered {
                trial,
                phase: TrialPhase::Feedback,
                stimulus: feedback,
            });
        } else {
            self.after_feedback(trial, events);
        }
    }

    fn after_feedback(&mut self, trial: usize, events: &mut Vec<SequencerEvent>) {
        if trial + 1 >= self.trials.len() {
            self.finish(events);
            return;
        }
        let iti = self.config.timing.inter_trial;
        if iti > 0 {
            self.enter_phase(trial, TrialPhase::InterTrial, iti, events);
        } else {
            self.enter_trial(trial + 1, events);
        }
    }

    fn finish(&mut self, events: &mut Vec<SequencerEvent>) {
        self.scheduler.cancel_all();
        self.state = SequencerState::Finished;
        self.run.stop();
        let completed = self.run.results().len();
        info!(completed, participant = self.run.participant_id(), "run finished");
        events.push(SequencerEvent::RunFinished { completed });
    }

    fn stimulus_for(&self, trial: usize, phase: TrialPhase) -> Stimulus {
        let display = &self.trials[trial].display;
        match phase {
            TrialPhase::Fixation => Stimulus::Fixation,
            TrialPhase::ForwardMask | TrialPhase::BackwardMask => match self.config.mask_pattern() {
                Some(pattern) => Stimulus::Mask {
                    pattern: pattern.to_string(),
                },
                None => Stimulus::Blank,
            },
            TrialPhase::Prime => display.prime.clone().unwrap_or(Stimulus::Blank),
            TrialPhase::Target => display.target.clone(),
            TrialPhase::Feedback | TrialPhase::InterTrial => Stimulus::Blank,
        }
    }

    fn feedback_for(&self, result: &TrialResult) -> Stimulus {
        let texts = &self.config.feedback;
        let (outcome, text) = match (result.correct, result.is_timeout()) {
            (_, true) => (FeedbackOutcome::Timeout, texts.timeout_text.clone()),
            (Some(true), _) => (FeedbackOutcome::Correct, texts.correct_text.clone()),
            (Some(false), _) => (FeedbackOutcome::Incorrect, texts.incorrect_text.clone()),
            (None, _) => (FeedbackOutcome::Recorded, String::new()),
        };
        Stimulus::Feedback { outcome, text }
    }
}

/// A key press a [`Responder`] wants delivered at an absolute time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedKey {
    pub at_ns: u64,
    pub key: String,
}

/// Input source for [`drive`]: sees every event and may plan one key press.
pub trait Responder {
    fn observe(&mut self, event: &SequencerEvent, now_ns: u64) -> Option<PlannedKey>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    Finished,
    /// Nothing scheduled and no key planned: the window has no timeout and the
    /// responder stayed silent.
    Stalled,
}

/// Runs the sequencer to completion, sleeping on its timer between events.
///
/// A key press and a timeout due at the same instant resolve in favour of the
/// key press. A planned key is dropped once its trial completes.
pub fn drive<T: Timer, R: Responder>(seq: &mut Sequencer<T>, responder: &mut R) -> DriveOutcome {
    let mut pending: Option<PlannedKey> = None;
    let mut events = seq.start();
    loop {
        let now = seq.timer().now();
        for event in &events {
            if matches!(event, SequencerEvent::TrialCompleted(_)) {
                pending = None;
            }
            if let Some(planned) = responder.observe(event, now) {
                pending = Some(planned);
            }
        }
        if seq.is_terminal() {
            return DriveOutcome::Finished;
        }

        let wake = match (seq.next_deadline(), pending.as_ref().map(|k| k.at_ns)) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => {
                warn!(state = ?seq.state(), "run stalled waiting for input");
                return DriveOutcome::Stalled;
            }
        };
        seq.timer().sleep_until(wake);

        events = Vec::new();
        let now = seq.timer().now();
        if let Some(k) = pending.take_if(|k| k.at_ns <= now) {
            events.extend(seq.handle_key(&k.key));
        }
        events.extend(seq.advance());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PhaseDurations, PrimeMode};
    use assert_matches::assert_matches;
    use primex_timing::ManualTimer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn number_config(timing: PhaseDurations) -> ExperimentConfig {
        let mut config = ExperimentConfig::number_priming(PrimeMode::Masked);
        config.timing = timing;
        config.randomize = false;
        if let crate::config::Paradigm::NumberPriming(p) = &mut config.paradigm {
            p.trials_per_condition = 1;
        }
        config
    }

    fn full_timing() -> PhaseDurations {
        PhaseDurations {
            fixation: 500,
            forward_mask: 71,
            prime: 43,
            backward_mask: 71,
            target_timeout: 2000,
            feedback: 300,
            inter_trial: 1000,
        }
    }

    fn sequencer(config: ExperimentConfig) -> (Sequencer<ManualTimer>, ManualTimer) {
        let timer = ManualTimer::new();
        let seq = Sequencer::prepare(
            config,
            &mut StdRng::seed_from_u64(9),
            RunState::new("p_test".into(), None),
            timer.clone(),
        )
        .unwrap();
        (seq, timer)
    }

    fn phases(events: &[SequencerEvent]) -> Vec<TrialPhase> {
        events
            .iter()
            .filter_map(|e| match e {
                SequencerEvent::PhaseEntered { phase, .. } => Some(*phase),
                _ => None,
            })
            .collect()
    }

    /// Steps the clock to each deadline until the response window opens.
    fn run_to_target(seq: &mut Sequencer<ManualTimer>, timer: &ManualTimer) -> Vec<TrialPhase> {
        let mut seen = Vec::new();
        while !seq.awaiting_response() {
            let deadline = seq.next_deadline().expect("sequencer stalled");
            timer.set(deadline);
            seen.extend(phases(&seq.advance()));
        }
        seen
    }

    #[test]
    fn masked_trial_plays_all_lead_in_phases() {
        let (mut seq, timer) = sequencer(number_config(full_timing()));
        let mut seen = phases(&seq.start());
        seen.extend(run_to_target(&mut seq, &timer));
        assert_eq!(
            seen,
            vec![
                TrialPhase::Fixation,
                TrialPhase::ForwardMask,
                TrialPhase::Prime,
                TrialPhase::BackwardMask,
                TrialPhase::Target,
            ]
        );
        // 500 + 71 + 43 + 71 ms of lead-in.
        assert_eq!(timer.now(), 685_000_000);
    }

    #[test]
    fn zero_duration_phases_are_never_entered() {
        let timing = PhaseDurations {
            forward_mask: 0,
            backward_mask: 0,
            ..full_timing()
        };
        let (mut seq, timer) = sequencer(number_config(timing));
        let mut seen = phases(&seq.start());
        seen.extend(run_to_target(&mut seq, &timer));
        assert_eq!(
            seen,
            vec![TrialPhase::Fixation, TrialPhase::Prime, TrialPhase::Target]
        );
    }

    #[test]
    fn response_measures_rt_from_target_onset() {
        let (mut seq, timer) = sequencer(number_config(full_timing()));
        seq.start();
        run_to_target(&mut seq, &timer);
        timer.advance(Duration::from_micros(432_500));

        let answer = seq.trials()[0].correct_response.clone().unwrap();
        let key = seq.config().response_keys.key_for(&answer).unwrap().to_string();
        let events = seq.handle_key(&key.to_lowercase());

        let result = events
            .iter()
            .find_map(|e| match e {
                SequencerEvent::TrialCompleted(r) => Some(r.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(result.rt_ms, Some(432.5));
        assert_eq!(result.correct, Some(true));
        assert_eq!(phases(&events), vec![TrialPhase::Feedback]);
        // The timeout was disarmed; only the feedback transition remains.
        assert_eq!(seq.next_deadline(), Some(timer.now() + 300_000_000));
    }

    #[test]
    fn timeout_records_null_response_and_rt() {
        let (mut seq, timer) = sequencer(number_config(full_timing()));
        seq.start();
        run_to_target(&mut seq, &timer);
        timer.advance_ms(2000);
        let events = seq.advance();

        assert_matches!(&events[0], SequencerEvent::TrialCompleted(r)
            if r.response.is_none() && r.rt_ms.is_none() && r.correct == Some(false));
        assert_matches!(&events[1], SequencerEvent::PhaseEntered {
            phase: TrialPhase::Feedback,
            stimulus: Stimulus::Feedback { outcome: FeedbackOutcome::Timeout, .. },
            ..
        });
    }

    #[test]
    fn response_after_timeout_is_ignored() {
        let (mut seq, timer) = sequencer(number_config(full_timing()));
        seq.start();
        run_to_target(&mut seq, &timer);
        timer.advance_ms(2000);
        seq.advance();
        assert!(seq.respond("smaller").is_empty());
        assert!(seq.respond("larger").is_empty());
        assert_eq!(seq.results().len(), 1);
    }

    #[test]
    fn responses_before_target_are_ignored() {
        let (mut seq, timer) = sequencer(number_config(full_timing()));
        seq.start();
        assert!(seq.handle_key("ArrowLeft").is_empty());
        timer.advance_ms(600);
        seq.advance();
        assert!(seq.handle_key("ArrowRight").is_empty());
        assert!(seq.results().is_empty());
    }

    #[test]
    fn unbound_keys_do_not_close_the_window() {
        let (mut seq, timer) = sequencer(number_config(full_timing()));
        seq.start();
        run_to_target(&mut seq, &timer);
        assert!(seq.handle_key("q").is_empty());
        assert!(seq.awaiting_response());
    }

    #[test]
    fn inter_trial_interval_precedes_next_trial_but_not_run_end() {
        struct Recorder(Vec<SequencerEvent>);
        impl Responder for Recorder {
            fn observe(&mut self, event: &SequencerEvent, now_ns: u64) -> Option<PlannedKey> {
                self.0.push(event.clone());
                matches!(event, SequencerEvent::PhaseEntered { phase: TrialPhase::Target, .. })
                    .then(|| PlannedKey {
                        at_ns: now_ns + 300_000_000,
                        key: "ArrowLeft".into(),
                    })
            }
        }

        let (mut seq, _timer) = sequencer(number_config(full_timing()));
        let mut recorder = Recorder(Vec::new());
        assert_eq!(drive(&mut seq, &mut recorder), DriveOutcome::Finished);

        let seen = phases(&recorder.0);
        let iti_count = seen.iter().filter(|p| **p == TrialPhase::InterTrial).count();
        assert_eq!(iti_count, seq.trials().len() - 1);
        assert_eq!(seen.last(), Some(&TrialPhase::Feedback));
        assert_matches!(recorder.0.last(), Some(SequencerEvent::RunFinished { completed: 4 }));
        assert!(!seq.run().is_running());
    }

    #[test]
    fn cancel_disarms_everything() {
        let (mut seq, timer) = sequencer(number_config(full_timing()));
        seq.start();
        run_to_target(&mut seq, &timer);
        seq.cancel();

        assert_eq!(seq.state(), SequencerState::Cancelled);
        assert_eq!(seq.next_deadline(), None);
        timer.advance_ms(10_000);
        assert!(seq.advance().is_empty());
        assert!(seq.respond("smaller").is_empty());
        assert!(seq.results().is_empty());
        assert!(!seq.run().is_running());
    }

    #[test]
    fn reset_hands_back_previous_run() {
        let (mut seq, timer) = sequencer(number_config(full_timing()));
        seq.start();
        run_to_target(&mut seq, &timer);
        seq.respond("larger");

        let trials = seq.trials().to_vec();
        let previous = seq
            .reset(trials, RunState::new("p_second".into(), None))
            .unwrap();
        assert_eq!(previous.results().len(), 1);
        assert_eq!(seq.state(), SequencerState::Idle);
        assert!(seq.results().is_empty());
        assert_eq!(seq.run().participant_id(), "p_second");

        // Old timers cannot leak into the new run.
        timer.advance_ms(60_000);
        assert!(seq.advance().is_empty());
        assert_eq!(phases(&seq.start()), vec![TrialPhase::Fixation]);
    }

    #[test]
    fn start_twice_is_a_no_op() {
        let (mut seq, _timer) = sequencer(number_config(full_timing()));
        assert!(!seq.start().is_empty());
        assert!(seq.start().is_empty());
    }

    #[test]
    fn no_timeout_waits_for_input() {
        let timing = PhaseDurations {
            target_timeout: 0,
            ..full_timing()
        };
        let (mut seq, timer) = sequencer(number_config(timing));
        seq.start();
        run_to_target(&mut seq, &timer);
        assert_eq!(seq.next_deadline(), None);
        timer.advance_ms(60_000);
        assert!(seq.advance().is_empty());
        assert!(seq.awaiting_response());
    }

    struct AlwaysRight {
        rt_ms: u64,
    }

    impl Responder for AlwaysRight {
        fn observe(&mut self, event: &SequencerEvent, now_ns: u64) -> Option<PlannedKey> {
            match event {
                SequencerEvent::PhaseEntered {
                    phase: TrialPhase::Target,
                    ..
                } => Some(PlannedKey {
                    at_ns: now_ns + self.rt_ms * 1_000_000,
                    key: "ArrowRight".into(),
                }),
                _ => None,
            }
        }
    }

    #[test]
    fn drive_plays_every_trial_once() {
        let (mut seq, _timer) = sequencer(number_config(full_timing()));
        let outcome = drive(&mut seq, &mut AlwaysRight { rt_ms: 450 });
        assert_eq!(outcome, DriveOutcome::Finished);

        let results = seq.results();
        assert_eq!(results.len(), 4);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.trial_number, i + 1);
            assert_eq!(r.response.as_deref(), Some("larger"));
            assert_eq!(r.rt_ms, Some(450.0));
            assert_eq!(r.correct, Some(r.correct_response.as_deref() == Some("larger")));
        }
    }

    #[test]
    fn drive_response_past_timeout_becomes_timeout() {
        let (mut seq, _timer) = sequencer(number_config(full_timing()));
        drive(&mut seq, &mut AlwaysRight { rt_ms: 2500 });
        assert!(seq.results().iter().all(|r| r.is_timeout()));
        assert!(seq.results().iter().all(|r| r.correct == Some(false)));
    }

    #[test]
    fn drive_reports_stall_without_timeout_or_input() {
        struct Silent;
        impl Responder for Silent {
            fn observe(&mut self, _: &SequencerEvent, _: u64) -> Option<PlannedKey> {
                None
            }
        }
        let timing = PhaseDurations {
            target_timeout: 0,
            ..full_timing()
        };
        let (mut seq, _timer) = sequencer(number_config(timing));
        assert_eq!(drive(&mut seq, &mut Silent), DriveOutcome::Stalled);
        assert!(seq.awaiting_response());
    }

    #[test]
    fn empty_trial_list_is_rejected() {
        let config = number_config(full_timing());
        let result = Sequencer::new(
            config,
            Vec::new(),
            RunState::new("p".into(), None),
            ManualTimer::new(),
        );
        assert_matches!(result, Err(Error::InvalidConfiguration(_)));
    }
}
