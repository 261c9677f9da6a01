use rand::Rng;
use rand::seq::SliceRandom;

use vigil_core::{SoundId, Stimulus, TrialSpec};

use crate::config::RunConfig;

/// Build the shuffled trial list for one run.
///
/// Digits are drawn independently and uniformly from 1..=9; 3 is a valid
/// draw and marks the non-target. Audio trials are appended per the group's
/// counts, then the whole list is shuffled in place (Fisher-Yates via
/// `SliceRandom`), so stimulus classes are interleaved rather than blocked.
pub fn generate<R: Rng>(config: &RunConfig, rng: &mut R) -> Vec<TrialSpec> {
    let counts = &config.counts;
    let mut trials = Vec::with_capacity(counts.total());

    for _ in 0..counts.visual {
        trials.push(TrialSpec { stimulus: Stimulus::Digit(rng.random_range(1..=9)) });
    }
    for _ in 0..counts.audio1 {
        trials.push(TrialSpec { stimulus: Stimulus::Sound(SoundId::Sound1) });
    }
    for _ in 0..counts.audio2 {
        trials.push(TrialSpec { stimulus: Stimulus::Sound(SoundId::Sound2) });
    }

    trials.shuffle(rng);
    trials
}
