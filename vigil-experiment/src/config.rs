use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Participant group. Determines which stimulus classes appear and how
/// many trials of each a run presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Group {
    One,
    Two,
    Three,
}

impl Group {
    pub fn as_u8(self) -> u8 {
        self.into()
    }
}

impl From<Group> for u8 {
    fn from(group: Group) -> u8 {
        match group {
            Group::One => 1,
            Group::Two => 2,
            Group::Three => 3,
        }
    }
}

impl TryFrom<u8> for Group {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Group::One),
            2 => Ok(Group::Two),
            3 => Ok(Group::Three),
            other => Err(format!("group must be 1, 2 or 3, got {other}")),
        }
    }
}

/// Practice runs show per-trial feedback and are never aggregated into
/// saved metrics; main runs are the real measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Practice,
    Main,
}

/// Fixed delays and the stimulus window bounds, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "TimingConfig::default_stimulus_min_ms")]
    pub stimulus_min_ms: u64,
    #[serde(default = "TimingConfig::default_stimulus_max_ms")]
    pub stimulus_max_ms: u64,
    #[serde(default = "TimingConfig::default_fixation_ms")]
    pub fixation_ms: u64,
    #[serde(default = "TimingConfig::default_feedback_ms")]
    pub feedback_ms: u64,
    #[serde(default = "TimingConfig::default_countdown_step_ms")]
    pub countdown_step_ms: u64,
}

impl TimingConfig {
    fn default_stimulus_min_ms() -> u64 {
        500
    }
    fn default_stimulus_max_ms() -> u64 {
        1000
    }
    fn default_fixation_ms() -> u64 {
        500
    }
    fn default_feedback_ms() -> u64 {
        1000
    }
    fn default_countdown_step_ms() -> u64 {
        1000
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            stimulus_min_ms: Self::default_stimulus_min_ms(),
            stimulus_max_ms: Self::default_stimulus_max_ms(),
            fixation_ms: Self::default_fixation_ms(),
            feedback_ms: Self::default_feedback_ms(),
            countdown_step_ms: Self::default_countdown_step_ms(),
        }
    }
}

/// How many trials of each stimulus class a run presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialCounts {
    pub visual: usize,
    pub audio1: usize,
    pub audio2: usize,
}

impl TrialCounts {
    /// The literal per-group trial counts.
    pub fn for_group(group: Group, mode: RunMode) -> Self {
        match (mode, group) {
            (RunMode::Practice, Group::One) => Self { visual: 50, audio1: 0, audio2: 0 },
            (RunMode::Practice, Group::Two) => Self { visual: 30, audio1: 10, audio2: 0 },
            (RunMode::Practice, Group::Three) => Self { visual: 25, audio1: 12, audio2: 13 },
            (RunMode::Main, Group::One) => Self { visual: 500, audio1: 0, audio2: 0 },
            (RunMode::Main, Group::Two) => Self { visual: 375, audio1: 125, audio2: 0 },
            (RunMode::Main, Group::Three) => Self { visual: 250, audio1: 125, audio2: 125 },
        }
    }

    pub fn total(&self) -> usize {
        self.visual + self.audio1 + self.audio2
    }
}

/// Everything one run needs, fixed at initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub group: Group,
    pub mode: RunMode,
    #[serde(default)]
    pub timing: TimingConfig,
    pub counts: TrialCounts,
}

impl RunConfig {
    /// Standard configuration for a group and mode: the literal count table
    /// with default timing.
    pub fn standard(group: Group, mode: RunMode) -> Self {
        Self {
            group,
            mode,
            timing: TimingConfig::default(),
            counts: TrialCounts::for_group(group, mode),
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
