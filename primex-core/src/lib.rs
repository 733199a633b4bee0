pub mod phase;
pub mod stats;
pub mod stimulus;
pub mod trial;

pub use phase::TrialPhase;
pub use stimulus::{FeedbackOutcome, Stimulus, StimulusKind};
pub use trial::{Contrast, Trial, TrialCondition, TrialDisplay, TrialResult};
