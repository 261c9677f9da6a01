use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::sdt::SdtCategory;
use crate::trial::TrialOutcome;

/// Final sensitivity and bias summary for one run.
///
/// The z-scores of the corrected rates are included so a downstream store
/// can recompute criterion and arrive at the identical value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub hits: u32,
    pub misses: u32,
    pub false_alarms: u32,
    pub correct_rejections: u32,
    pub hit_rate: f64,
    pub false_alarm_rate: f64,
    pub corrected_hit_rate: f64,
    pub corrected_false_alarm_rate: f64,
    pub z_hit: f64,
    pub z_false_alarm: f64,
    pub d_prime: f64,
    pub criterion: f64,
    pub average_reaction_time_ms: Option<u64>,
}

/// Incremental tally of SDT categories and reaction times.
///
/// Counters grow as trials resolve; rates, d' and criterion are computed
/// once at run completion by [`MetricsAggregator::finalize`].
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    hits: u32,
    misses: u32,
    false_alarms: u32,
    correct_rejections: u32,
    processed: u32,
    rt_sum_ms: u64,
    rt_count: u32,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally one resolved trial: its category, and its reaction time when a
    /// response was given and the measured latency is positive.
    pub fn record(&mut self, outcome: &TrialOutcome) {
        self.update(outcome.category);
        if outcome.response.is_some() {
            if let Some(rt) = outcome.reaction_time_ms {
                if rt > 0 {
                    self.rt_sum_ms += rt;
                    self.rt_count += 1;
                }
            }
        }
    }

    /// Increment the counter for one category.
    pub fn update(&mut self, category: SdtCategory) {
        match category {
            SdtCategory::Hit => self.hits += 1,
            SdtCategory::Miss => self.misses += 1,
            SdtCategory::FalseAlarm => self.false_alarms += 1,
            SdtCategory::CorrectRejection => self.correct_rejections += 1,
        }
        self.processed += 1;
    }

    /// Number of outcomes tallied so far.
    pub fn processed(&self) -> u32 {
        self.processed
    }

    /// Category counters must sum to the number of outcomes processed, at
    /// every point during aggregation.
    pub fn is_consistent(&self) -> bool {
        self.hits + self.misses + self.false_alarms + self.correct_rejections == self.processed
    }

    /// Compute the summary. Zero signal or noise trials is a documented
    /// degenerate case: d' and criterion are reported as 0, not an error.
    pub fn finalize(&self) -> AggregateMetrics {
        if !self.is_consistent() {
            warn!(
                hits = self.hits,
                misses = self.misses,
                false_alarms = self.false_alarms,
                correct_rejections = self.correct_rejections,
                processed = self.processed,
                "category tally diverged from trials processed"
            );
        }

        let signal_trials = self.hits + self.misses;
        let noise_trials = self.false_alarms + self.correct_rejections;

        let hit_rate = ratio(self.hits, signal_trials);
        let false_alarm_rate = ratio(self.false_alarms, noise_trials);
        let corrected_hit_rate = correct_extreme(hit_rate, signal_trials);
        let corrected_false_alarm_rate = correct_extreme(false_alarm_rate, noise_trials);

        let (z_hit, z_false_alarm, d_prime, criterion) = if signal_trials == 0 || noise_trials == 0
        {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            let zh = inv_normal(corrected_hit_rate);
            let zf = inv_normal(corrected_false_alarm_rate);
            (zh, zf, round4(zh - zf), round4(-0.5 * (zh + zf)))
        };

        AggregateMetrics {
            hits: self.hits,
            misses: self.misses,
            false_alarms: self.false_alarms,
            correct_rejections: self.correct_rejections,
            hit_rate,
            false_alarm_rate,
            corrected_hit_rate,
            corrected_false_alarm_rate,
            z_hit,
            z_false_alarm,
            d_prime,
            criterion,
            average_reaction_time_ms: if self.rt_count > 0 {
                Some((self.rt_sum_ms as f64 / self.rt_count as f64).round() as u64)
            } else {
                None
            },
        }
    }
}

fn ratio(part: u32, whole: u32) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 / whole as f64 }
}

/// Log-linear substitution for rates of exactly 0 or 1 ahead of z-scoring:
/// 0 becomes 0.5/n, 1 becomes (n - 0.5)/n.
fn correct_extreme(rate: f64, n: u32) -> f64 {
    if n == 0 {
        return rate;
    }
    let n = n as f64;
    if rate == 0.0 {
        0.5 / n
    } else if rate == 1.0 {
        (n - 0.5) / n
    } else {
        rate
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

// Beasley-Springer central coefficients and Moro tail coefficients.
const A: [f64; 4] = [
    2.50662823884,
    -18.61500062529,
    41.39119773534,
    -25.44106049637,
];
const B: [f64; 4] = [
    -8.47351093090,
    23.08336743743,
    -21.06224101826,
    3.13082909833,
];
const C: [f64; 9] = [
    0.3374754822726147,
    0.9761690190917186,
    0.1607979714918209,
    0.0276438810333863,
    0.0038405729373609,
    0.0003951896511919,
    0.0000321767881768,
    0.0000002888167364,
    0.0000003960315187,
];

/// Standard normal inverse CDF, Beasley-Springer-Moro approximation.
///
/// Antisymmetric about 0.5 and exactly 0 at 0.5. Inputs outside
/// [0.0001, 0.9999] are clamped to +/-3.719.
pub fn inv_normal(p: f64) -> f64 {
    if p <= 0.0001 {
        return -3.719;
    }
    if p >= 0.9999 {
        return 3.719;
    }

    let x = p - 0.5;
    if x.abs() <= 0.42 {
        // central rational branch
        let r = x * x;
        let num = x * (((A[3] * r + A[2]) * r + A[1]) * r + A[0]);
        let den = (((B[3] * r + B[2]) * r + B[1]) * r + B[0]) * r + 1.0;
        return num / den;
    }

    // tail branch, mirrored for the lower tail
    let r = if x > 0.0 { 1.0 - p } else { p };
    let s = (-r.ln()).ln();
    let mut t = C[8];
    for c in C[..8].iter().rev() {
        t = t * s + c;
    }
    if x < 0.0 { -t } else { t }
}
