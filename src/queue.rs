//! Session queue construction.
//!
//! Active items are filtered, scored, truncated to the session limit and
//! then "smart-shuffled": the queue is partitioned into priority bands that
//! are shuffled independently and interleaved with weighted draws, so two
//! sessions over the same pool differ in order without ever burying the
//! urgent items. Pass a seed to make the whole thing reproducible.

use std::cmp::Reverse;
use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::debug;
use priority_queue::PriorityQueue;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::item::{ContentTag, ItemStatus, PinnedItem, Priority, ReviewableItem, SrsRecord};

const BASE_PRIORITY: f32 = 100.0;
/// Overdue bonus saturates at one day past due.
const OVERDUE_CAP_MINUTES: i64 = 1440;
const OVERDUE_MAX_BONUS: f32 = 100.0;
const HIGH_PRIORITY_BONUS: f32 = 50.0;
const NORMAL_PRIORITY_BONUS: f32 = 25.0;
const LOW_PRIORITY_BONUS: f32 = 0.0;
const NEW_ITEM_BONUS: f32 = 30.0;
const LEARNING_ITEM_BONUS: f32 = 40.0;
const LOW_SUCCESS_MAX_BONUS: f32 = 50.0;
const LOW_SUCCESS_MIN_REVIEWS: u32 = 3;
const RECENCY_WINDOW_MINUTES: i64 = 60;
const RECENCY_MAX_PENALTY: f32 = 50.0;

const HIGH_BAND_MIN: f32 = 150.0;
const MEDIUM_BAND_MIN: f32 = 50.0;
const HIGH_BAND_WEIGHT: f64 = 0.6;
const MEDIUM_BAND_WEIGHT: f64 = 0.75;

#[derive(Debug, Clone, PartialEq)]
pub struct QueueOptions {
    pub limit: usize,
    /// Content-kind allowlist; `None` admits everything.
    pub kinds: Option<Vec<ContentTag>>,
    pub include_new: bool,
    pub include_due: bool,
    pub include_learning: bool,
    /// Fixed seed for reproducible shuffles.
    pub seed: Option<u64>,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            kinds: None,
            include_new: true,
            include_due: true,
            include_learning: true,
            seed: None,
        }
    }
}

/// Transient per-session entry; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub item: ReviewableItem,
    pub record: SrsRecord,
    pub queue_priority: f32,
    /// Minutes until due; negative when overdue.
    pub due_in_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub total_items: usize,
    pub due_now: usize,
    pub due_today: usize,
    pub new_items: usize,
    pub learning_items: usize,
    pub overdue_items: usize,
    /// Minutes until the soonest upcoming (not yet due) review.
    pub next_review_in_minutes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionQueue {
    pub items: Vec<QueueItem>,
    pub stats: QueueStats,
}

/// Computed urgency of one item at `now`. Always non-negative.
pub fn queue_priority(pinned: &PinnedItem, now: DateTime<Utc>) -> f32 {
    let record = &pinned.record;
    let mut priority = BASE_PRIORITY;

    let overdue = record.overdue_minutes(now).clamp(0, OVERDUE_CAP_MINUTES);
    priority += overdue as f32 / OVERDUE_CAP_MINUTES as f32 * OVERDUE_MAX_BONUS;

    priority += match pinned.priority {
        Priority::High => HIGH_PRIORITY_BONUS,
        Priority::Normal => NORMAL_PRIORITY_BONUS,
        Priority::Low => LOW_PRIORITY_BONUS,
    };

    match record.status {
        ItemStatus::New => priority += NEW_ITEM_BONUS,
        ItemStatus::Learning => priority += LEARNING_ITEM_BONUS,
        _ => {}
    }

    if record.review_count >= LOW_SUCCESS_MIN_REVIEWS {
        priority += LOW_SUCCESS_MAX_BONUS * (1.0 - record.accuracy());
    }

    if let Some(last) = record.last_reviewed_at {
        let since = (now - last).num_minutes();
        if (0..RECENCY_WINDOW_MINUTES).contains(&since) {
            priority -=
                RECENCY_MAX_PENALTY * (1.0 - since as f32 / RECENCY_WINDOW_MINUTES as f32);
        }
    }

    priority.max(0.0)
}

fn is_candidate(pinned: &PinnedItem, options: &QueueOptions, now: DateTime<Utc>) -> bool {
    if !pinned.is_active {
        return false;
    }
    if let Some(kinds) = &options.kinds {
        if !kinds.contains(&pinned.item.kind.tag()) {
            return false;
        }
    }
    match pinned.record.status {
        ItemStatus::New => options.include_new,
        ItemStatus::Learning => options.include_learning,
        ItemStatus::Review | ItemStatus::Mastered => {
            options.include_due && pinned.record.is_due(now)
        }
    }
}

fn due_in_minutes(record: &SrsRecord, now: DateTime<Utc>) -> i64 {
    record
        .next_review_at
        .map(|due| (due - now).num_minutes())
        .unwrap_or(0)
}

fn compute_stats(candidates: &[&PinnedItem], now: DateTime<Utc>) -> QueueStats {
    let today = now.date_naive();
    let mut stats = QueueStats {
        total_items: candidates.len(),
        ..Default::default()
    };
    for pinned in candidates {
        let record = &pinned.record;
        if record.is_due(now) {
            stats.due_now += 1;
        }
        match record.next_review_at {
            Some(due) if due.date_naive() <= today => stats.due_today += 1,
            _ => {}
        }
        match record.status {
            ItemStatus::New => stats.new_items += 1,
            ItemStatus::Learning => stats.learning_items += 1,
            _ => {}
        }
        if record.overdue_minutes(now) > OVERDUE_CAP_MINUTES {
            stats.overdue_items += 1;
        }
    }
    stats.next_review_in_minutes = candidates
        .iter()
        .filter_map(|p| p.record.next_review_at)
        .filter(|due| *due > now)
        .map(|due| (due - now).num_minutes())
        .min();
    stats
}

/// Builds a prioritized, shuffled session queue from the active pool.
pub fn generate_queue(
    pinned: &[PinnedItem],
    options: &QueueOptions,
    now: DateTime<Utc>,
) -> SessionQueue {
    let candidates = pinned
        .iter()
        .filter(|p| is_candidate(p, options, now))
        .collect_vec();
    let stats = compute_stats(&candidates, now);

    let mut heap = PriorityQueue::new();
    let mut priorities = vec![0.0f32; candidates.len()];
    for (index, candidate) in candidates.iter().enumerate() {
        let priority = queue_priority(candidate, now);
        priorities[index] = priority;
        // integer priority with the index as a deterministic tie-breaker
        heap.push(index, ((priority * 1000.0) as i64, Reverse(index)));
    }

    let mut selected = Vec::with_capacity(options.limit.min(candidates.len()));
    while selected.len() < options.limit {
        let Some((index, _)) = heap.pop() else {
            break;
        };
        let candidate = candidates[index];
        selected.push(QueueItem {
            item: candidate.item.clone(),
            record: candidate.record.clone(),
            queue_priority: priorities[index],
            due_in_minutes: due_in_minutes(&candidate.record, now),
        });
    }
    debug!(
        "queue: {} candidates, {} selected",
        candidates.len(),
        selected.len()
    );

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    SessionQueue {
        items: smart_shuffle(selected, &mut rng),
        stats,
    }
}

/// Shuffles each priority band independently, then interleaves the bands
/// with weighted draws (60% high, then 75% of the remainder medium) so the
/// order varies without defeating priority.
fn smart_shuffle(items: Vec<QueueItem>, rng: &mut StdRng) -> Vec<QueueItem> {
    let total = items.len();
    let mut high = Vec::new();
    let mut medium = Vec::new();
    let mut low = Vec::new();
    for item in items {
        if item.queue_priority >= HIGH_BAND_MIN {
            high.push(item);
        } else if item.queue_priority >= MEDIUM_BAND_MIN {
            medium.push(item);
        } else {
            low.push(item);
        }
    }
    high.shuffle(rng);
    medium.shuffle(rng);
    low.shuffle(rng);

    let mut high = VecDeque::from(high);
    let mut medium = VecDeque::from(medium);
    let mut low = VecDeque::from(low);
    let mut ordered = Vec::with_capacity(total);
    while ordered.len() < total {
        if !high.is_empty()
            && ((medium.is_empty() && low.is_empty()) || rng.random_bool(HIGH_BAND_WEIGHT))
        {
            ordered.push(high.pop_front().unwrap());
        } else if !medium.is_empty() && (low.is_empty() || rng.random_bool(MEDIUM_BAND_WEIGHT)) {
            ordered.push(medium.pop_front().unwrap());
        } else if let Some(item) = low.pop_front() {
            ordered.push(item);
        }
    }
    ordered
}

/// Caps how many new items a session may expose given how many the learner
/// has already seen today. Due and learning items pass through untouched.
pub fn apply_daily_limits(
    items: Vec<QueueItem>,
    new_seen_today: usize,
    max_new_per_day: usize,
) -> Vec<QueueItem> {
    let mut allowance = max_new_per_day.saturating_sub(new_seen_today);
    items
        .into_iter()
        .filter(|item| {
            if item.record.status == ItemStatus::New {
                if allowance == 0 {
                    return false;
                }
                allowance -= 1;
            }
            true
        })
        .collect()
}

/// Round-robin interleave across content kinds, preserving each kind's
/// internal order. Deterministic.
pub fn shuffle_for_variety(items: Vec<QueueItem>) -> Vec<QueueItem> {
    let total = items.len();
    let mut groups: Vec<(ContentTag, VecDeque<QueueItem>)> = Vec::new();
    for item in items {
        let tag = item.item.kind.tag();
        match groups.iter_mut().find(|(t, _)| *t == tag) {
            Some((_, bucket)) => bucket.push_back(item),
            None => groups.push((tag, VecDeque::from([item]))),
        }
    }
    let mut ordered = Vec::with_capacity(total);
    while ordered.len() < total {
        for (_, bucket) in &mut groups {
            if let Some(item) = bucket.pop_front() {
                ordered.push(item);
            }
        }
    }
    ordered
}
