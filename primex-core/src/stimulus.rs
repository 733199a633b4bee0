use serde::{Deserialize, Serialize};

/// How a prime or target item should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StimulusKind {
    #[default]
    Text,
    Image,
    Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedbackOutcome {
    Correct,
    Incorrect,
    Timeout,
    /// Response recorded for a trial without a correct answer.
    Recorded,
}

/// Display content for one phase. A front end draws these; the core never does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Stimulus {
    Fixation,
    Blank,
    Mask {
        pattern: String,
    },
    Text {
        content: String,
        /// CSS-style colour, `None` for the default foreground.
        color: Option<String>,
    },
    Number {
        value: i64,
    },
    Image {
        source: String,
    },
    ColorPatch {
        color: String,
    },
    /// Two items shown together, e.g. a word drawn in a colour.
    Compound {
        prime: Box<Stimulus>,
        target: Box<Stimulus>,
    },
    Feedback {
        outcome: FeedbackOutcome,
        text: String,
    },
}

impl Stimulus {
    /// Builds the stimulus for a configured prime/target item.
    pub fn from_item(kind: StimulusKind, item: &str) -> Self {
        match kind {
            StimulusKind::Text => Stimulus::Text {
                content: item.to_string(),
                color: None,
            },
            StimulusKind::Image => Stimulus::Image {
                source: item.to_string(),
            },
            StimulusKind::Color => Stimulus::ColorPatch {
                color: item.to_string(),
            },
        }
    }

    /// Short plain-text rendering, used for logs and terminal output.
    pub fn describe(&self) -> String {
        match self {
            Stimulus::Fixation => "+".to_string(),
            Stimulus::Blank => String::new(),
            Stimulus::Mask { pattern } => pattern.clone(),
            Stimulus::Text {
                content,
                color: Some(color),
            } => format!("{content} [{color}]"),
            Stimulus::Text { content, .. } => content.clone(),
            Stimulus::Number { value } => value.to_string(),
            Stimulus::Image { source } => format!("<{source}>"),
            Stimulus::ColorPatch { color } => format!("■ {color}"),
            Stimulus::Compound { prime, target } => {
                format!("{} / {}", prime.describe(), target.describe())
            }
            Stimulus::Feedback { text, .. } => text.clone(),
        }
    }
}
