//! Time-weighted mastery score update for a single practiced record.
//!
//! The swing of one attempt is `k * ln(days + 2)`, where `days` is the number
//! of whole days since the record was last practiced. Long-neglected items
//! gain more on success and lose more on failure. The `+2` keeps the weight
//! positive when the item was already practiced today.

use crate::model::validation::clamp_score;
use chrono::NaiveDate;

const LOG_OFFSET_DAYS: f64 = 2.0;

/// Whole days between `last_practiced` and `now`, never negative.
pub fn days_since(last_practiced: NaiveDate, now: NaiveDate) -> i64 {
    (now - last_practiced).num_days().max(0)
}

/// Swing magnitude for one attempt after `days` idle days.
pub fn time_weight(k: f64, days: i64) -> f64 {
    let days = days.max(0) as f64;
    k * (days + LOG_OFFSET_DAYS).ln()
}

/// Returns the new score after one attempt, clamped to `[0, 100]`.
///
/// Pure: callers persist the result and set `last_practiced = now`.
pub fn update_score(score: f64, last_practiced: NaiveDate, success: bool, now: NaiveDate, k: f64) -> f64 {
    let weight = time_weight(k, days_since(last_practiced, now));
    let base = clamp_score(score);
    let updated = if success { base + weight } else { base - weight };
    clamp_score(updated)
}

/// Scorer bound to one deployment's time-weight constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasteryScorer {
    k: f64,
}

impl MasteryScorer {
    /// `k` is expected to be finite and positive; `EngineConfig` enforces it.
    pub fn new(k: f64) -> Self {
        Self { k }
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    pub fn time_weight(&self, days: i64) -> f64 {
        time_weight(self.k, days)
    }

    pub fn update_score(
        &self,
        score: f64,
        last_practiced: NaiveDate,
        success: bool,
        now: NaiveDate,
    ) -> f64 {
        update_score(score, last_practiced, success, now, self.k)
    }
}
