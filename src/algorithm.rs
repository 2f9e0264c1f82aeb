//! SM-2 style scheduling algorithm.
//!
//! Pure functions mapping (prior record, review outcome) to an updated
//! record. Quality of a single answer is graded 0-5 from correctness,
//! confidence, timing and hint/attempt usage; the ease factor follows the
//! classic SM-2 update and the interval grows multiplicatively while the
//! item sits in review.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::error::{InvalidConfigurationSnafu, Result};
use crate::item::{ItemStatus, ReviewInput, SrsRecord};

pub(crate) const EASE_MIN: f32 = 1.3;
pub(crate) const EASE_MAX: f32 = 2.5;
pub(crate) const MINUTES_PER_DAY: f32 = 1440.0;

/// 10 minutes, in days.
pub const FIRST_LEARNING_STEP: f32 = 10.0 / MINUTES_PER_DAY;
/// 30 minutes, in days.
pub const SECOND_LEARNING_STEP: f32 = 30.0 / MINUTES_PER_DAY;

pub(crate) const FAST_RESPONSE_MS: u32 = 2_000;
pub(crate) const SLOW_RESPONSE_MS: u32 = 10_000;
const RESPONSE_TIME_CEILING_MS: u32 = 300_000;
const SPEED_BONUS: f32 = 1.1;
const SPEED_PENALTY: f32 = 0.9;
/// Quality inferred from timing bottoms out at "correct with difficulty".
const SLOW_QUALITY: f32 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrsConfig {
    /// Intraday learning steps, in days.
    pub learning_steps: Vec<f32>,
    /// Consecutive correct answers required to leave the learning state.
    pub graduation_threshold: u32,
    /// Interval assigned on graduation, in days.
    pub graduating_interval: f32,
    /// Hard cap on any single interval, in days.
    pub max_interval: f32,
    /// Minimum interval before an item can be considered mastered.
    pub mastery_interval: f32,
    /// Minimum lifetime accuracy before an item can be considered mastered.
    pub mastery_accuracy: f32,
    /// Lapses while mastered before demotion back to review.
    pub demotion_threshold: u32,
    pub auto_graduate: bool,
    pub auto_master: bool,
    /// Review count after which a persistently failing item counts as a leech.
    pub leech_threshold: u32,
    pub leech_accuracy: f32,
}

impl Default for SrsConfig {
    fn default() -> Self {
        Self {
            learning_steps: vec![FIRST_LEARNING_STEP, SECOND_LEARNING_STEP],
            graduation_threshold: 3,
            graduating_interval: 1.0,
            max_interval: 365.0,
            mastery_interval: 21.0,
            mastery_accuracy: 0.9,
            demotion_threshold: 1,
            auto_graduate: true,
            auto_master: true,
            leech_threshold: 8,
            leech_accuracy: 0.5,
        }
    }
}

impl SrsConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.learning_steps.is_empty() && self.learning_steps.iter().all(|s| *s > 0.0),
            InvalidConfigurationSnafu
        );
        ensure!(self.graduation_threshold > 0, InvalidConfigurationSnafu);
        let last_step = self.learning_steps.last().copied().unwrap_or_default();
        ensure!(
            self.graduating_interval >= last_step
                && self.max_interval >= self.graduating_interval,
            InvalidConfigurationSnafu
        );
        ensure!(
            (0.0..=1.0).contains(&self.mastery_accuracy) && self.demotion_threshold > 0,
            InvalidConfigurationSnafu
        );
        Ok(())
    }

    pub(crate) fn first_step(&self) -> f32 {
        self.learning_steps.first().copied().unwrap_or(FIRST_LEARNING_STEP)
    }

    /// Step for the nth consecutive correct answer (1-based), clamped to the
    /// last configured step.
    pub(crate) fn learning_step(&self, repetitions: u32) -> f32 {
        let idx = (repetitions.saturating_sub(1) as usize)
            .min(self.learning_steps.len().saturating_sub(1));
        self.learning_steps.get(idx).copied().unwrap_or(FIRST_LEARNING_STEP)
    }
}

/// Clamps out-of-range fields instead of rejecting them. Malformed input is
/// never surfaced as an error.
fn sanitize(input: &ReviewInput) -> ReviewInput {
    ReviewInput {
        correct: input.correct,
        response_time_ms: input.response_time_ms.min(RESPONSE_TIME_CEILING_MS),
        confidence: input.confidence.map(|c| c.clamp(1, 5)),
        hints_used: input.hints_used.min(5),
        attempt_count: input.attempt_count.max(1),
    }
}

/// Grades one answer 0-5. Incorrect is always 0. Correct answers start from
/// explicit confidence when given, otherwise from response time (under 2 s
/// scores 5, over 10 s scores 3, linear between), then lose a point per hint
/// and a point for needing more than one attempt.
pub fn quality_score(input: &ReviewInput) -> u8 {
    if !input.correct {
        return 0;
    }
    let base = match input.confidence {
        Some(c) => c.clamp(1, 5) as f32,
        None => {
            let ms = input.response_time_ms;
            if ms <= FAST_RESPONSE_MS {
                5.0
            } else if ms >= SLOW_RESPONSE_MS {
                SLOW_QUALITY
            } else {
                let span = (SLOW_RESPONSE_MS - FAST_RESPONSE_MS) as f32;
                5.0 - (5.0 - SLOW_QUALITY) * (ms - FAST_RESPONSE_MS) as f32 / span
            }
        }
    };
    let penalized = (base - input.hints_used as f32).max(0.0)
        - if input.attempt_count > 1 { 1.0 } else { 0.0 };
    penalized.clamp(0.0, 5.0).round() as u8
}

/// SM-2 ease update: `EF' = EF + (0.1 - (5-q)(0.08 + (5-q)*0.02))`, clamped
/// to [1.3, 2.5]. Applied on every answer, so failures stay punishing.
pub fn next_ease_factor(ease_factor: f32, quality: u8) -> f32 {
    let q = quality.min(5) as f32;
    let delta = 0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02);
    (ease_factor + delta).clamp(EASE_MIN, EASE_MAX)
}

fn speed_factor(response_time_ms: u32) -> f32 {
    if response_time_ms <= FAST_RESPONSE_MS {
        SPEED_BONUS
    } else if response_time_ms >= SLOW_RESPONSE_MS {
        SPEED_PENALTY
    } else {
        1.0
    }
}

fn interval_duration(interval_days: f32) -> Duration {
    Duration::seconds((interval_days * 86_400.0).round() as i64)
}

/// Applies one review to a record. A missing record is equivalent to
/// `status = New`. Deterministic and total over well-typed input.
pub fn next_record(
    prior: Option<&SrsRecord>,
    input: &ReviewInput,
    config: &SrsConfig,
    now: DateTime<Utc>,
) -> SrsRecord {
    let input = sanitize(input);
    let mut rec = prior.cloned().unwrap_or_default();
    let prior_status = rec.status;

    let quality = quality_score(&input);
    rec.ease_factor = next_ease_factor(rec.ease_factor, quality);
    rec.review_count += 1;
    if input.correct {
        rec.correct_count += 1;
        rec.repetitions += 1;
        rec.streak += 1;
        rec.best_streak = rec.best_streak.max(rec.streak);
    } else {
        rec.repetitions = 0;
        rec.streak = 0;
        rec.lapses += 1;
    }

    if input.correct {
        match prior_status {
            ItemStatus::New => {
                rec.status = ItemStatus::Learning;
                rec.interval = config.first_step();
            }
            ItemStatus::Learning => {
                if config.auto_graduate && rec.repetitions >= config.graduation_threshold {
                    rec.status = ItemStatus::Review;
                    rec.interval = config.graduating_interval;
                } else {
                    rec.interval = config.learning_step(rec.repetitions);
                }
            }
            ItemStatus::Review | ItemStatus::Mastered => {
                let speed = speed_factor(input.response_time_ms);
                rec.interval = (rec.interval * rec.ease_factor * speed)
                    .round()
                    .clamp(1.0, config.max_interval);
                if prior_status == ItemStatus::Review
                    && config.auto_master
                    && rec.interval >= config.mastery_interval
                    && rec.accuracy() >= config.mastery_accuracy
                {
                    rec.status = ItemStatus::Mastered;
                    rec.lapses_while_mastered = 0;
                }
            }
        }
    } else if prior_status == ItemStatus::Mastered {
        // A mastered item lapses in place until the demotion threshold,
        // then drops back to review at a halved interval.
        rec.lapses_while_mastered += 1;
        if rec.lapses_while_mastered >= config.demotion_threshold {
            rec.status = ItemStatus::Review;
            rec.interval = (rec.interval * 0.5).max(config.graduating_interval);
            rec.lapses_while_mastered = 0;
        }
    } else {
        rec.status = ItemStatus::Learning;
        rec.interval = config.first_step();
    }

    rec.last_reviewed_at = Some(now);
    rec.next_review_at = Some(now + interval_duration(rec.interval));
    rec
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestHelper;

    fn now() -> DateTime<Utc> {
        crate::test_helpers::fixed_now()
    }

    #[test]
    fn first_review_enters_learning_at_first_step() {
        let input = ReviewInput::correct(3000).with_confidence(4);
        let rec = next_record(None, &input, &SrsConfig::default(), now());
        assert_eq!(rec.status, ItemStatus::Learning);
        [rec.interval].assert_approx_eq([FIRST_LEARNING_STEP]);
        assert_eq!(rec.review_count, 1);
        assert_eq!(rec.streak, 1);
        // confidence 4 leaves the ease factor exactly where it was
        [rec.ease_factor].assert_approx_eq([2.5]);
    }

    #[test]
    fn learning_steps_advance_then_graduate() {
        let config = SrsConfig::default();
        let input = ReviewInput::correct(1500);
        let r1 = next_record(None, &input, &config, now());
        let r2 = next_record(Some(&r1), &input, &config, now());
        assert_eq!(r2.status, ItemStatus::Learning);
        [r2.interval].assert_approx_eq([SECOND_LEARNING_STEP]);
        let r3 = next_record(Some(&r2), &input, &config, now());
        assert_eq!(r3.status, ItemStatus::Review);
        [r3.interval].assert_approx_eq([1.0]);
    }

    #[test]
    fn fast_review_growth_beats_slow_path() {
        let prior = SrsRecord {
            interval: 10.0,
            ease_factor: 2.5,
            repetitions: 3,
            status: ItemStatus::Review,
            review_count: 3,
            correct_count: 3,
            streak: 3,
            best_streak: 3,
            ..Default::default()
        };
        let rec = next_record(
            Some(&prior),
            &ReviewInput::correct(1000),
            &SrsConfig::default(),
            now(),
        );
        assert!(rec.interval > 10.0 * 2.5 * 0.9);
        assert!(rec.interval <= 365.0);
        [rec.interval].assert_approx_eq([28.0]);
        // 28 days with perfect accuracy also crosses the mastery bar
        assert_eq!(rec.status, ItemStatus::Mastered);
    }

    #[test]
    fn interval_never_exceeds_cap() {
        let prior = SrsRecord {
            interval: 300.0,
            ease_factor: 2.5,
            status: ItemStatus::Review,
            review_count: 10,
            correct_count: 8,
            ..Default::default()
        };
        let rec = next_record(
            Some(&prior),
            &ReviewInput::correct(1000),
            &SrsConfig::default(),
            now(),
        );
        [rec.interval].assert_approx_eq([365.0]);
    }

    #[test]
    fn incorrect_resets_to_learning() {
        for status in [ItemStatus::New, ItemStatus::Learning, ItemStatus::Review] {
            let prior = SrsRecord {
                interval: 12.0,
                repetitions: 4,
                streak: 4,
                best_streak: 4,
                status,
                review_count: 6,
                correct_count: 6,
                ..Default::default()
            };
            let rec = next_record(
                Some(&prior),
                &ReviewInput::incorrect(4000),
                &SrsConfig::default(),
                now(),
            );
            assert_eq!(rec.status, ItemStatus::Learning, "from {status}");
            assert_eq!(rec.streak, 0);
            assert_eq!(rec.repetitions, 0);
            assert_eq!(rec.lapses, 1);
            [rec.interval].assert_approx_eq([FIRST_LEARNING_STEP]);
        }
    }

    #[test]
    fn mastered_lapse_demotes_to_review() {
        let prior = SrsRecord {
            interval: 30.0,
            ease_factor: 2.5,
            repetitions: 10,
            streak: 10,
            best_streak: 10,
            status: ItemStatus::Mastered,
            review_count: 20,
            correct_count: 19,
            ..Default::default()
        };
        let rec = next_record(
            Some(&prior),
            &ReviewInput::incorrect(5000),
            &SrsConfig::default(),
            now(),
        );
        assert_eq!(rec.status, ItemStatus::Review);
        assert!(rec.interval < prior.interval);
        assert_eq!(rec.streak, 0);
        assert_eq!(rec.repetitions, 0);
        // a failed answer is still punishing on the ease factor
        [rec.ease_factor].assert_approx_eq([1.7]);
    }

    #[test]
    fn mastered_survives_lapses_below_threshold() {
        let config = SrsConfig {
            demotion_threshold: 2,
            ..Default::default()
        };
        let prior = SrsRecord {
            interval: 40.0,
            status: ItemStatus::Mastered,
            review_count: 20,
            correct_count: 19,
            streak: 5,
            repetitions: 5,
            ..Default::default()
        };
        let first = next_record(Some(&prior), &ReviewInput::incorrect(5000), &config, now());
        assert_eq!(first.status, ItemStatus::Mastered);
        assert_eq!(first.lapses_while_mastered, 1);
        let second = next_record(Some(&first), &ReviewInput::incorrect(5000), &config, now());
        assert_eq!(second.status, ItemStatus::Review);
        assert_eq!(second.lapses_while_mastered, 0);
    }

    #[test]
    fn ease_stays_clamped_and_interval_monotone_without_lapse() {
        let config = SrsConfig::default();
        let mut rec = SrsRecord {
            interval: 1.0,
            ease_factor: 1.3,
            status: ItemStatus::Review,
            review_count: 4,
            correct_count: 2,
            ..Default::default()
        };
        for ms in [1000, 12_000, 5000, 800, 15_000, 3000, 1200, 9000] {
            let prev_interval = rec.interval;
            rec = next_record(Some(&rec), &ReviewInput::correct(ms), &config, now());
            assert!((EASE_MIN..=EASE_MAX).contains(&rec.ease_factor));
            assert!(rec.interval >= prev_interval);
            assert!(rec.interval <= config.max_interval);
        }
    }

    #[test]
    fn quality_prefers_confidence_over_timing() {
        let timed = ReviewInput::correct(15_000);
        assert_eq!(quality_score(&timed), 3);
        assert_eq!(quality_score(&timed.clone().with_confidence(5)), 5);
    }

    #[test]
    fn quality_interpolates_between_fast_and_slow() {
        assert_eq!(quality_score(&ReviewInput::correct(1000)), 5);
        assert_eq!(quality_score(&ReviewInput::correct(6000)), 4);
        assert_eq!(quality_score(&ReviewInput::correct(20_000)), 3);
    }

    #[test]
    fn hints_and_retries_reduce_quality() {
        let mut input = ReviewInput::correct(1000);
        input.hints_used = 2;
        assert_eq!(quality_score(&input), 3);
        input.attempt_count = 3;
        assert_eq!(quality_score(&input), 2);
        input.hints_used = 9;
        assert_eq!(quality_score(&input), 0);
        assert!(!ReviewInput::incorrect(1000).correct);
        assert_eq!(quality_score(&ReviewInput::incorrect(1000)), 0);
    }

    #[test]
    fn out_of_range_input_is_clamped_not_rejected() {
        let input = ReviewInput {
            correct: true,
            response_time_ms: u32::MAX,
            confidence: Some(99),
            hints_used: 40,
            attempt_count: 0,
        };
        let rec = next_record(None, &input, &SrsConfig::default(), now());
        assert_eq!(rec.status, ItemStatus::Learning);
        assert_eq!(rec.review_count, 1);
        // confidence clamps to 5, hints to 5: quality lands at 0, ease drops
        [rec.ease_factor].assert_approx_eq([1.7]);
    }

    #[test]
    fn streak_never_exceeds_review_count() {
        let config = SrsConfig::default();
        let mut rec: Option<SrsRecord> = None;
        for i in 0..20 {
            let input = if i % 5 == 4 {
                ReviewInput::incorrect(3000)
            } else {
                ReviewInput::correct(3000)
            };
            let next = next_record(rec.as_ref(), &input, &config, now());
            assert!(next.streak <= next.review_count);
            assert!(next.best_streak >= next.streak);
            rec = Some(next);
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(SrsConfig::default().validate().is_ok());
        let bad = SrsConfig {
            learning_steps: vec![],
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
