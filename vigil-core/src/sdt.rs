use serde::{Deserialize, Serialize};

use crate::response::ResponseKind;
use crate::stimulus::{SoundId, Stimulus};

/// Signal Detection Theory outcome classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdtCategory {
    Hit,
    Miss,
    FalseAlarm,
    CorrectRejection,
}

/// The response the task expects for a stimulus. `None` marks the
/// non-target digit, where withholding is the correct behavior.
pub fn expected_response(stimulus: Stimulus) -> Option<ResponseKind> {
    match stimulus {
        Stimulus::Digit(3) => None,
        Stimulus::Digit(_) => Some(ResponseKind::Primary),
        Stimulus::Sound(SoundId::Sound1) => Some(ResponseKind::SecondaryLeft),
        Stimulus::Sound(SoundId::Sound2) => Some(ResponseKind::SecondaryRight),
    }
}

/// Classify one resolved trial.
///
/// A wrong key on a target counts as a false alarm, not a miss: the
/// participant responded, just not with the expected control.
pub fn classify(stimulus: Stimulus, response: Option<ResponseKind>) -> SdtCategory {
    match (expected_response(stimulus), response) {
        (None, None) => SdtCategory::CorrectRejection,
        (None, Some(_)) => SdtCategory::FalseAlarm,
        (Some(_), None) => SdtCategory::Miss,
        (Some(expected), Some(given)) if given == expected => SdtCategory::Hit,
        (Some(_), Some(_)) => SdtCategory::FalseAlarm,
    }
}
