//! Trial list construction for each paradigm.
//!
//! Generation is a pure function of the configuration and the supplied random
//! source; the list is fixed (and shuffled at most once) before any phase plays.

use primex_core::{Stimulus, StimulusKind, Trial, TrialCondition, TrialDisplay, stats};
use rand::Rng;
use tracing::info;

use crate::config::{
    ExperimentConfig, GenericPrimingParams, LARGER, NumberPrimingParams, Paradigm,
    PresentationMode, SMALLER, StroopParams,
};
use crate::error::Result;

pub fn generate<R: Rng + ?Sized>(config: &ExperimentConfig, rng: &mut R) -> Result<Vec<Trial>> {
    config.validate()?;

    let mut trials = match &config.paradigm {
        Paradigm::Stroop(p) => stroop_trials(p),
        Paradigm::NumberPriming(p) => number_trials(p, rng),
        Paradigm::GenericPriming(p) => generic_trials(p),
    };

    if config.randomize {
        stats::shuffle(&mut trials, rng);
    }

    let congruent = trials
        .iter()
        .filter(|t| t.condition.congruent() == Some(true))
        .count();
    info!(
        paradigm = config.paradigm.kind().as_str(),
        total = trials.len(),
        congruent,
        randomized = config.randomize,
        "generated trials"
    );
    Ok(trials)
}

fn stroop_trials(p: &StroopParams) -> Vec<Trial> {
    let mut trials = Vec::with_capacity(p.expected_trials());
    for lexicon in &p.languages {
        for ink in &p.colors {
            let others: Vec<_> = p.colors.iter().filter(|c| c.name != ink.name).collect();
            let meanings = std::iter::repeat_n(ink, p.congruent_reps)
                .map(|m| (m, true))
                .chain((0..p.incongruent_reps).map(|i| (others[i % others.len()], false)));

            for (meaning, congruent) in meanings {
                // Validation guarantees every colour has a word in every lexicon.
                let word = lexicon.words.get(&meaning.name).cloned().unwrap_or_default();
                trials.push(Trial {
                    display: TrialDisplay {
                        prime: None,
                        target: Stimulus::Text {
                            content: word.clone(),
                            color: Some(ink.hex.clone()),
                        },
                    },
                    condition: TrialCondition::Stroop {
                        language: lexicon.code.clone(),
                        ink_color: ink.name.clone(),
                        ink_hex: ink.hex.clone(),
                        word,
                        word_meaning: meaning.name.clone(),
                        congruent,
                    },
                    correct_response: Some(ink.name.clone()),
                });
            }
        }
    }
    trials
}

fn number_trials<R: Rng + ?Sized>(p: &NumberPrimingParams, rng: &mut R) -> Vec<Trial> {
    let (smaller, larger) = p.partition();
    let mut pick = |set: &[i64]| set[rng.random_range(0..set.len())];
    let mut trials = Vec::with_capacity(p.expected_trials());

    for _ in 0..p.trials_per_condition {
        trials.push(number_trial(pick(&smaller), pick(&smaller), true, SMALLER));
        trials.push(number_trial(pick(&larger), pick(&larger), true, LARGER));
    }
    for _ in 0..p.trials_per_condition {
        trials.push(number_trial(pick(&smaller), pick(&larger), false, LARGER));
        trials.push(number_trial(pick(&larger), pick(&smaller), false, SMALLER));
    }
    trials
}

fn number_trial(prime: i64, target: i64, congruent: bool, answer: &str) -> Trial {
    Trial {
        condition: TrialCondition::NumberPriming {
            prime,
            target,
            congruent,
        },
        correct_response: Some(answer.to_string()),
        display: TrialDisplay {
            prime: Some(Stimulus::Number { value: prime }),
            target: Stimulus::Number { value: target },
        },
    }
}

fn generic_trials(p: &GenericPrimingParams) -> Vec<Trial> {
    let units: Vec<(usize, usize, String, Option<String>)> = match &p.pairings {
        Some(pairings) => pairings
            .iter()
            .map(|pr| {
                (
                    pr.prime_index,
                    pr.target_index,
                    pr.condition.clone(),
                    pr.correct_response.clone(),
                )
            })
            .collect(),
        None => (0..p.primes.items.len())
            .flat_map(|pi| {
                (0..p.targets.items.len()).map(move |ti| (pi, ti, "default".to_string(), None))
            })
            .collect(),
    };

    let mut trials = Vec::with_capacity(units.len() * p.repetitions);
    for (prime_index, target_index, condition, correct_response) in units {
        let prime = &p.primes.items[prime_index];
        let target = &p.targets.items[target_index];
        let display = match p.presentation {
            PresentationMode::Sequential => TrialDisplay {
                prime: Some(Stimulus::from_item(p.primes.kind, prime)),
                target: Stimulus::from_item(p.targets.kind, target),
            },
            PresentationMode::Simultaneous => TrialDisplay {
                prime: None,
                target: simultaneous(p.primes.kind, prime, p.targets.kind, target),
            },
        };
        let baseline = p.baseline_condition.as_ref().map(|b| *b == condition);
        for _ in 0..p.repetitions {
            trials.push(Trial {
                condition: TrialCondition::GenericPriming {
                    prime_index,
                    target_index,
                    prime: prime.clone(),
                    target: target.clone(),
                    condition: condition.clone(),
                    baseline,
                },
                correct_response: correct_response.clone(),
                display: display.clone(),
            });
        }
    }
    trials
}

/// Prime and target shown at once: a word drawn in a colour when one side is
/// text and the other a colour, otherwise both items together.
fn simultaneous(
    prime_kind: StimulusKind,
    prime: &str,
    target_kind: StimulusKind,
    target: &str,
) -> Stimulus {
    match (prime_kind, target_kind) {
        (StimulusKind::Text, StimulusKind::Color) => Stimulus::Text {
            content: prime.to_string(),
            color: Some(target.to_string()),
        },
        (StimulusKind::Color, StimulusKind::Text) => Stimulus::Text {
            content: target.to_string(),
            color: Some(prime.to_string()),
        },
        _ => Stimulus::Compound {
            prime: Box::new(Stimulus::from_item(prime_kind, prime)),
            target: Box::new(Stimulus::from_item(target_kind, target)),
        },
    }
}
