use serde::{Deserialize, Serialize};

/// Timed phases a single trial moves through, in presentation order.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrialPhase {
    Fixation,
    ForwardMask,
    Prime,
    BackwardMask,
    Target,
    Feedback,
    InterTrial,
}

impl TrialPhase {
    /// Phases played before the response window opens.
    pub const LEAD_IN: [TrialPhase; 4] = [
        TrialPhase::Fixation,
        TrialPhase::ForwardMask,
        TrialPhase::Prime,
        TrialPhase::BackwardMask,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TrialPhase::Fixation => "fixation",
            TrialPhase::ForwardMask => "forward-mask",
            TrialPhase::Prime => "prime",
            TrialPhase::BackwardMask => "backward-mask",
            TrialPhase::Target => "target",
            TrialPhase::Feedback => "feedback",
            TrialPhase::InterTrial => "inter-trial",
        }
    }
}

impl std::fmt::Display for TrialPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
