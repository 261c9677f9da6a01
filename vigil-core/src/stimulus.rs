use serde::{Deserialize, Serialize};

/// The two sound cues used by the audio stimulus classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundId {
    Sound1,
    Sound2,
}

/// One presentable stimulus: a digit 1..=9 or a sound cue.
///
/// Digit 3 is the non-target; every other stimulus expects a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stimulus {
    Digit(u8),
    Sound(SoundId),
}

/// Stimulus class, as recorded in run data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StimulusKind {
    Visual,
    Audio1,
    Audio2,
}

impl Stimulus {
    pub fn kind(&self) -> StimulusKind {
        match self {
            Stimulus::Digit(_) => StimulusKind::Visual,
            Stimulus::Sound(SoundId::Sound1) => StimulusKind::Audio1,
            Stimulus::Sound(SoundId::Sound2) => StimulusKind::Audio2,
        }
    }
}
