pub mod aggregator;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod export;
pub mod generator;
pub mod persistence;
pub mod run;
pub mod sequencer;
pub mod share;

pub use aggregator::{EffectBand, Interpretation, InterpretationBands, SummaryStatistics, interpret, summarize};
pub use config::{ExperimentConfig, Paradigm, ParadigmKind, PhaseDurations, PrimeMode, ResponseKeys};
pub use error::{Error, Result};
pub use generator::generate;
pub use persistence::{InMemoryGateway, PersistenceGateway, ResultRecord, experimenter_results, submit_in_background};
pub use run::RunState;
pub use sequencer::{DriveOutcome, PlannedKey, Responder, Sequencer, SequencerEvent, SequencerState, drive};
pub use share::{Experimenter, SharedExperiment};
