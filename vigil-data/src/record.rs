use chrono::{DateTime, Utc};
use serde::Serialize;

use vigil_core::{
    AggregateMetrics, ResponseKind, SdtCategory, SoundId, Stimulus, StimulusKind, TrialOutcome,
};
use vigil_experiment::RunConfig;

use crate::sink::SinkError;

/// Digit or sound label, serialized as the raw number or the sound name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StimulusValue {
    Digit(u8),
    Sound(&'static str),
}

impl From<Stimulus> for StimulusValue {
    fn from(stimulus: Stimulus) -> Self {
        match stimulus {
            Stimulus::Digit(n) => StimulusValue::Digit(n),
            Stimulus::Sound(SoundId::Sound1) => StimulusValue::Sound("sound1"),
            Stimulus::Sound(SoundId::Sound2) => StimulusValue::Sound("sound2"),
        }
    }
}

/// One resolved trial in wire form. Timestamps are milliseconds on the run
/// clock.
#[derive(Debug, Clone, Serialize)]
pub struct TrialRow {
    pub trial_number: usize,
    pub stimulus_type: StimulusKind,
    pub stimulus_value: StimulusValue,
    pub response_given: Option<ResponseKind>,
    pub reaction_time_ms: Option<u64>,
    pub sdt_category: SdtCategory,
    pub stimulus_start_time: u64,
    pub stimulus_end_time: u64,
}

impl TrialRow {
    fn from_outcome(outcome: &TrialOutcome) -> Self {
        Self {
            trial_number: outcome.index + 1,
            stimulus_type: outcome.spec.stimulus.kind(),
            stimulus_value: outcome.spec.stimulus.into(),
            response_given: outcome.response,
            reaction_time_ms: outcome.reaction_time_ms,
            sdt_category: outcome.category,
            stimulus_start_time: outcome.stimulus_start_ns / 1_000_000,
            stimulus_end_time: outcome.stimulus_end_ns / 1_000_000,
        }
    }
}

/// Finalized payload for one completed run, handed to the sink.
///
/// The record is built once and stays in memory regardless of what the
/// sink does with it, so a failed submit can always be retried or dumped.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub unique_id: String,
    pub assigned_group: u8,
    pub total_trials: usize,
    pub total_hits: u32,
    pub total_misses: u32,
    pub total_false_alarms: u32,
    pub total_correct_rejections: u32,
    pub average_reaction_time: Option<u64>,
    pub completed_at: DateTime<Utc>,
    pub trials: Vec<TrialRow>,
}

impl RunRecord {
    pub fn from_run(
        unique_id: impl Into<String>,
        config: &RunConfig,
        outcomes: &[TrialOutcome],
        metrics: &AggregateMetrics,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            unique_id: unique_id.into(),
            assigned_group: config.group.as_u8(),
            total_trials: outcomes.len(),
            total_hits: metrics.hits,
            total_misses: metrics.misses,
            total_false_alarms: metrics.false_alarms,
            total_correct_rejections: metrics.correct_rejections,
            average_reaction_time: metrics.average_reaction_time_ms,
            completed_at,
            trials: outcomes.iter().map(TrialRow::from_outcome).collect(),
        }
    }

    /// Serialize for manual recovery when no sink will accept the record.
    pub fn to_json(&self) -> Result<String, SinkError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
