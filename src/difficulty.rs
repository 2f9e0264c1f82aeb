//! Continuous per-item difficulty in [0, 1].
//!
//! The initial score is a weighted blend of structural signals read off the
//! content kind; later reviews nudge it with a bounded step so one bad
//! session cannot whipsaw the score.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::algorithm::{FAST_RESPONSE_MS, SLOW_RESPONSE_MS};
use crate::item::{ContentKind, KanaScript, ReviewableItem, ReviewInput};

pub(crate) const DIFFICULTY_MIN: f32 = 0.0;
pub(crate) const DIFFICULTY_MAX: f32 = 1.0;
/// Largest movement a single adjustment may apply.
const MAX_ADJUST_STEP: f32 = 0.1;
/// Only the tail of the review history influences an adjustment.
const HISTORY_WINDOW: usize = 5;

const FAILURE_NUDGE: f32 = 0.05;
const SLOW_NUDGE: f32 = 0.02;
const FAST_CORRECT_NUDGE: f32 = -0.03;
const CORRECT_NUDGE: f32 = -0.01;

/// Relative weight of each structural signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyFactors {
    pub length_weight: f32,
    pub complexity_weight: f32,
    pub level_weight: f32,
    pub frequency_weight: f32,
}

impl Default for DifficultyFactors {
    fn default() -> Self {
        Self {
            length_weight: 0.2,
            complexity_weight: 0.35,
            level_weight: 0.25,
            frequency_weight: 0.2,
        }
    }
}

/// (length, complexity, level, frequency) signals, each already in [0, 1].
fn structural_signals(kind: &ContentKind) -> [f32; 4] {
    match kind {
        ContentKind::Kana { script } => {
            let complexity = match script {
                KanaScript::Hiragana => 0.15,
                KanaScript::Katakana => 0.3,
            };
            [0.1, complexity, 0.05, 0.05]
        }
        ContentKind::Kanji { strokes, grade } => [
            0.4,
            (*strokes as f32 / 24.0).min(1.0),
            (*grade as f32 / 9.0).min(1.0),
            0.5,
        ],
        ContentKind::Vocabulary {
            word_length,
            frequency_rank,
        } => [
            (*word_length as f32 / 10.0).min(1.0),
            0.4,
            0.5,
            frequency_rank
                .map(|rank| (rank as f32 / 10_000.0).min(1.0))
                .unwrap_or(0.5),
        ],
        ContentKind::Sentence { token_count } => {
            [(*token_count as f32 / 20.0).min(1.0), 0.6, 0.5, 0.5]
        }
    }
}

/// Weighted combination of the item's structural signals.
pub fn initial_difficulty(item: &ReviewableItem, factors: &DifficultyFactors) -> f32 {
    let [length, complexity, level, frequency] = structural_signals(&item.kind);
    let weight_sum = factors.length_weight
        + factors.complexity_weight
        + factors.level_weight
        + factors.frequency_weight;
    if weight_sum <= 0.0 {
        return 0.5;
    }
    let score = (length * factors.length_weight
        + complexity * factors.complexity_weight
        + level * factors.level_weight
        + frequency * factors.frequency_weight)
        / weight_sum;
    score.clamp(DIFFICULTY_MIN, DIFFICULTY_MAX)
}

/// Nudges difficulty toward harder on recent failures and slow answers,
/// toward easier on fast correct streaks. The net movement per call is
/// clamped to [`MAX_ADJUST_STEP`] so the score cannot oscillate.
pub fn adjust_difficulty(current: f32, history: &[ReviewInput]) -> f32 {
    let current = current.clamp(DIFFICULTY_MIN, DIFFICULTY_MAX);
    if history.is_empty() {
        return current;
    }
    let recent = &history[history.len().saturating_sub(HISTORY_WINDOW)..];
    let mut delta = 0.0;
    for input in recent {
        if !input.correct {
            delta += FAILURE_NUDGE;
        } else if input.response_time_ms <= FAST_RESPONSE_MS && input.hints_used == 0 {
            delta += FAST_CORRECT_NUDGE;
        } else if input.response_time_ms >= SLOW_RESPONSE_MS {
            delta += SLOW_NUDGE;
        } else {
            delta += CORRECT_NUDGE;
        }
    }
    let delta = delta.clamp(-MAX_ADJUST_STEP, MAX_ADJUST_STEP);
    (current + delta).clamp(DIFFICULTY_MIN, DIFFICULTY_MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum DifficultyBand {
    Easy,
    Medium,
    Hard,
}

impl DifficultyBand {
    pub fn of(difficulty: f32) -> Self {
        if difficulty < 0.34 {
            Self::Easy
        } else if difficulty < 0.67 {
            Self::Medium
        } else {
            Self::Hard
        }
    }
}

const BAND_ORDER: [DifficultyBand; 3] = [
    DifficultyBand::Easy,
    DifficultyBand::Medium,
    DifficultyBand::Hard,
];

pub fn group_by_difficulty(
    items: &[ReviewableItem],
) -> HashMap<DifficultyBand, Vec<&ReviewableItem>> {
    items
        .iter()
        .map(|item| (DifficultyBand::of(item.difficulty), item))
        .into_group_map()
}

/// Picks up to `limit` items spread across the difficulty bands instead of
/// clustering in whichever band happens to dominate the pool. Each band gets
/// an equal share; leftover capacity is backfilled round-robin from bands
/// that still have items.
pub fn balance_by_difficulty(items: &[ReviewableItem], limit: usize) -> Vec<&ReviewableItem> {
    if limit == 0 || items.is_empty() {
        return Vec::new();
    }
    let mut groups = group_by_difficulty(items);
    let per_band = limit / BAND_ORDER.len();
    let mut picked = Vec::with_capacity(limit.min(items.len()));
    for band in BAND_ORDER {
        if let Some(bucket) = groups.get_mut(&band) {
            let take = per_band.min(bucket.len());
            picked.extend(bucket.drain(..take));
        }
    }
    while picked.len() < limit {
        let mut progressed = false;
        for band in BAND_ORDER {
            if picked.len() >= limit {
                break;
            }
            if let Some(item) = groups.get_mut(&band).and_then(|bucket| {
                if bucket.is_empty() {
                    None
                } else {
                    Some(bucket.remove(0))
                }
            }) {
                picked.push(item);
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestHelper;

    fn item(id: &str, difficulty: f32) -> ReviewableItem {
        let mut item = ReviewableItem::new(id, ContentKind::Sentence { token_count: 5 });
        item.difficulty = difficulty;
        item
    }

    #[test]
    fn complex_kanji_scores_harder_than_kana() {
        let factors = DifficultyFactors::default();
        let kana = ReviewableItem::new(
            "a",
            ContentKind::Kana {
                script: KanaScript::Hiragana,
            },
        );
        let kanji = ReviewableItem::new("b", ContentKind::Kanji { strokes: 18, grade: 6 });
        let easy = initial_difficulty(&kana, &factors);
        let hard = initial_difficulty(&kanji, &factors);
        assert!(hard > easy);
        assert!((DIFFICULTY_MIN..=DIFFICULTY_MAX).contains(&easy));
        assert!((DIFFICULTY_MIN..=DIFFICULTY_MAX).contains(&hard));
    }

    #[test]
    fn rare_vocabulary_scores_harder_than_common() {
        let factors = DifficultyFactors::default();
        let common = ReviewableItem::new(
            "a",
            ContentKind::Vocabulary {
                word_length: 4,
                frequency_rank: Some(100),
            },
        );
        let rare = ReviewableItem::new(
            "b",
            ContentKind::Vocabulary {
                word_length: 4,
                frequency_rank: Some(9_000),
            },
        );
        assert!(initial_difficulty(&rare, &factors) > initial_difficulty(&common, &factors));
    }

    #[test]
    fn failures_push_harder_fast_streak_pushes_easier() {
        let failures = vec![ReviewInput::incorrect(4000); 3];
        assert!(adjust_difficulty(0.5, &failures) > 0.5);

        let streak = vec![ReviewInput::correct(1000); 4];
        assert!(adjust_difficulty(0.5, &streak) < 0.5);
    }

    #[test]
    fn adjustment_step_is_bounded() {
        let failures = vec![ReviewInput::incorrect(12_000); 20];
        [adjust_difficulty(0.5, &failures)].assert_approx_eq([0.6]);
        let streak = vec![ReviewInput::correct(500); 20];
        [adjust_difficulty(0.5, &streak)].assert_approx_eq([0.4]);
        // already at the bound, stays in range
        [adjust_difficulty(1.0, &failures)].assert_approx_eq([1.0]);
    }

    #[test]
    fn empty_history_is_a_no_op() {
        [adjust_difficulty(0.42, &[])].assert_approx_eq([0.42]);
    }

    #[test]
    fn grouping_covers_all_bands() {
        let items = vec![item("e", 0.1), item("m", 0.5), item("h", 0.9)];
        let groups = group_by_difficulty(&items);
        assert_eq!(groups[&DifficultyBand::Easy].len(), 1);
        assert_eq!(groups[&DifficultyBand::Medium].len(), 1);
        assert_eq!(groups[&DifficultyBand::Hard].len(), 1);
    }

    #[test]
    fn balanced_selection_spreads_across_bands() {
        let mut items = Vec::new();
        for i in 0..10 {
            items.push(item(&format!("e{i}"), 0.1));
            items.push(item(&format!("m{i}"), 0.5));
            items.push(item(&format!("h{i}"), 0.9));
        }
        let picked = balance_by_difficulty(&items, 9);
        assert_eq!(picked.len(), 9);
        let picked_owned = picked.into_iter().cloned().collect::<Vec<_>>();
        let groups = group_by_difficulty(&picked_owned);
        assert_eq!(groups[&DifficultyBand::Easy].len(), 3);
        assert_eq!(groups[&DifficultyBand::Medium].len(), 3);
        assert_eq!(groups[&DifficultyBand::Hard].len(), 3);
    }

    #[test]
    fn backfill_when_a_band_runs_dry() {
        let items = vec![item("e1", 0.1), item("e2", 0.2), item("m1", 0.5)];
        let picked = balance_by_difficulty(&items, 3);
        assert_eq!(picked.len(), 3);
        let picked = balance_by_difficulty(&items, 10);
        assert_eq!(picked.len(), 3);
        assert!(balance_by_difficulty(&items, 0).is_empty());
    }
}
