//! Simulated participant and the blocking run loop around it.

use anyhow::{bail, Context, Result};
use primex_core::{Contrast, Trial, TrialPhase};
use primex_experiment::{
    drive, DriveOutcome, ExperimentConfig, PlannedKey, Responder, RunState, Sequencer,
    SequencerEvent,
};
use primex_timing::{HighPrecisionTimer, ManualTimer, Timer};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::cli::SimulateArgs;
use crate::settings::SimulationSettings;

/// Fastest plausible keyboard response.
const RT_FLOOR_MS: f64 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticipantModel {
    pub mean_rt_ms: f64,
    pub sd_rt_ms: f64,
    pub accuracy: f64,
    pub effect_ms: f64,
    pub miss_rate: f64,
}

impl ParticipantModel {
    /// Settings values with command-line overrides applied.
    pub fn from_settings(settings: &SimulationSettings, args: &SimulateArgs) -> Self {
        Self {
            mean_rt_ms: args.mean_rt.unwrap_or(settings.mean_rt_ms),
            sd_rt_ms: settings.sd_rt_ms,
            accuracy: args.accuracy.unwrap_or(settings.accuracy),
            effect_ms: args.effect.unwrap_or(settings.effect_ms),
            miss_rate: settings.miss_rate,
        }
    }
}

impl Default for ParticipantModel {
    fn default() -> Self {
        let s = SimulationSettings::default();
        Self {
            mean_rt_ms: s.mean_rt_ms,
            sd_rt_ms: s.sd_rt_ms,
            accuracy: s.accuracy,
            effect_ms: s.effect_ms,
            miss_rate: s.miss_rate,
        }
    }
}

/// Answers every target after a sampled delay, slower on incongruent and
/// baseline trials by the model's effect.
pub struct SimulatedParticipant<R: Rng> {
    model: ParticipantModel,
    config: ExperimentConfig,
    trials: Vec<Trial>,
    rng: R,
}

impl<R: Rng> SimulatedParticipant<R> {
    pub fn new(model: ParticipantModel, config: ExperimentConfig, trials: Vec<Trial>, rng: R) -> Self {
        Self {
            model,
            config,
            trials,
            rng,
        }
    }

    fn sample_rt(&mut self, contrast: Option<Contrast>) -> f64 {
        let mut mean = self.model.mean_rt_ms;
        if contrast == Some(Contrast::Baseline) {
            mean += self.model.effect_ms;
        }
        let rt = mean + self.model.sd_rt_ms * standard_normal(&mut self.rng);
        rt.max(RT_FLOOR_MS)
    }

    fn choose_label(&mut self, correct: Option<&str>) -> Option<String> {
        let labels: Vec<&String> = self.config.response_keys.0.keys().collect();
        let pick_correct = self.rng.random_bool(self.model.accuracy);
        match correct {
            Some(answer) if pick_correct => Some(answer.to_string()),
            Some(answer) => {
                let others: Vec<&&String> = labels.iter().filter(|l| l.as_str() != answer).collect();
                match others.choose(&mut self.rng) {
                    Some(label) => Some(label.to_string()),
                    None => Some(answer.to_string()),
                }
            }
            None => labels.choose(&mut self.rng).map(|l| l.to_string()),
        }
    }
}

impl<R: Rng> Responder for SimulatedParticipant<R> {
    fn observe(&mut self, event: &SequencerEvent, now_ns: u64) -> Option<PlannedKey> {
        let SequencerEvent::PhaseEntered {
            trial,
            phase: TrialPhase::Target,
            ..
        } = event
        else {
            return None;
        };
        let trial = self.trials.get(*trial)?.clone();

        if self.config.timing.target_timeout > 0 && self.rng.random_bool(self.model.miss_rate) {
            debug!("simulated participant lets the window time out");
            return None;
        }
        let rt_ms = self.sample_rt(trial.condition.contrast());
        let label = self.choose_label(trial.correct_response.as_deref())?;
        let key = self.config.response_keys.key_for(&label)?.to_string();
        Some(PlannedKey {
            at_ns: now_ns + (rt_ms * 1_000_000.0).round() as u64,
            key,
        })
    }
}

/// Box-Muller transform.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

/// Plays one complete run. Blocks; call from a blocking context.
pub fn run_simulation(
    config: ExperimentConfig,
    model: ParticipantModel,
    seed: Option<u64>,
    external_id: Option<String>,
    realtime: bool,
) -> Result<RunState> {
    let mut rng = rng_from_seed(seed);
    let run = RunState::new(
        primex_experiment::run::generate_participant_id(&mut rng),
        external_id,
    );
    if realtime {
        play(config, model, rng, run, HighPrecisionTimer::new())
    } else {
        play(config, model, rng, run, ManualTimer::new())
    }
}

fn play<T: Timer>(
    config: ExperimentConfig,
    model: ParticipantModel,
    mut rng: StdRng,
    run: RunState,
    timer: T,
) -> Result<RunState> {
    let mut seq = Sequencer::prepare(config.clone(), &mut rng, run, timer)
        .context("Failed to prepare the run")?;
    let mut participant = SimulatedParticipant::new(model, config, seq.trials().to_vec(), rng);

    let started = seq.timer().now();
    match drive(&mut seq, &mut participant) {
        DriveOutcome::Finished => {}
        DriveOutcome::Stalled => {
            let (done, total) = seq.progress();
            bail!("run stalled after {done} of {total} trials waiting for a response");
        }
    }
    let elapsed = seq.timer().elapsed(started);
    info!(
        trials = seq.results().len(),
        experiment_seconds = elapsed.as_secs_f64(),
        "simulation finished"
    );
    Ok(seq.into_run())
}
