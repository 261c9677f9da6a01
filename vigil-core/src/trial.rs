use serde::{Deserialize, Serialize};

use crate::response::ResponseKind;
use crate::sdt::SdtCategory;
use crate::stimulus::Stimulus;

/// One planned presentation, produced once per run by sequence generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialSpec {
    pub stimulus: Stimulus,
}

/// Recorded result of one resolved trial.
///
/// Timestamps are monotonic nanoseconds from the run clock. `response` and
/// `reaction_time_ms` are present or absent together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub index: usize,
    pub spec: TrialSpec,
    pub response: Option<ResponseKind>,
    pub reaction_time_ms: Option<u64>,
    pub stimulus_start_ns: u64,
    pub stimulus_end_ns: u64,
    pub category: SdtCategory,
}

impl TrialOutcome {
    pub fn is_well_formed(&self) -> bool {
        self.response.is_some() == self.reaction_time_ms.is_some()
    }
}
