//! Classification of the human's answer to a confirmation question.

const AFFIRMATIVE: &[&str] = &["是", "是的", "确认", "确定", "好", "好的", "yes", "y", "ok"];
const NEGATIVE: &[&str] = &["否", "不", "不是", "取消", "no", "n"];

/// How a reply to a confirmation question reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// The human approved.
    Affirmative,
    /// The human declined.
    Negative,
    /// Anything else.
    Other,
}

impl Reply {
    /// Classifies a reply, ignoring surrounding whitespace, case and a
    /// trailing full stop.
    #[must_use]
    pub fn classify(text: &str) -> Self {
        let normalized = text
            .trim()
            .trim_end_matches(['。', '.', '!', '！'])
            .to_lowercase();

        if AFFIRMATIVE.contains(&normalized.as_str()) {
            Self::Affirmative
        } else if NEGATIVE.contains(&normalized.as_str()) {
            Self::Negative
        } else {
            Self::Other
        }
    }
}
