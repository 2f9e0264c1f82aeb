//! Four-state transition policy around the algorithm, plus the collection
//! services a host needs to drive a review screen: per-state counts, due
//! lists and a day-by-day forecast.
//!
//! State changes are announced through a typed listener registry owned by
//! the manager instance, so side effects stay out of the transition logic.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::algorithm::{SrsConfig, next_record};
use crate::item::{ItemStatus, PinnedItem, ReviewInput, SrsRecord};

/// Items due longer than this count as overdue.
const OVERDUE_GRACE_MINUTES: i64 = 1440;

/// Callback invoked as `(item_id, old_status, new_status)` after a review
/// changes an item's state.
#[derive(Clone)]
pub struct StateChangeFn(pub Arc<dyn Fn(&str, ItemStatus, ItemStatus) + Send + Sync>);

impl std::fmt::Debug for StateChangeFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Wrap(<function>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total: usize,
    pub new: usize,
    pub learning: usize,
    pub review: usize,
    pub mastered: usize,
    pub due: usize,
    pub overdue: usize,
}

pub struct StateManager {
    config: SrsConfig,
    listeners: Vec<(u64, StateChangeFn)>,
    next_handle: u64,
}

impl StateManager {
    pub fn new(config: SrsConfig) -> Self {
        Self {
            config,
            listeners: Vec::new(),
            next_handle: 0,
        }
    }

    pub fn config(&self) -> &SrsConfig {
        &self.config
    }

    /// Registers a state-change listener. Listeners fire in registration
    /// order; the returned handle removes exactly this registration.
    pub fn on_state_change(&mut self, listener: StateChangeFn) -> ListenerHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.listeners.push((handle, listener));
        ListenerHandle(handle)
    }

    pub fn remove_listener(&mut self, handle: ListenerHandle) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != handle.0);
        self.listeners.len() != before
    }

    /// Runs the algorithm and notifies listeners when the status changed.
    pub fn apply_review(
        &self,
        item_id: &str,
        prior: Option<&SrsRecord>,
        input: &ReviewInput,
        now: DateTime<Utc>,
    ) -> SrsRecord {
        let old_status = prior.map_or(ItemStatus::New, |r| r.status);
        let updated = next_record(prior, input, &self.config, now);
        if updated.status != old_status {
            debug!("{item_id}: {old_status} -> {}", updated.status);
            for (_, listener) in &self.listeners {
                (listener.0)(item_id, old_status, updated.status);
            }
        }
        updated
    }

    pub fn should_graduate(&self, record: &SrsRecord, input: &ReviewInput) -> bool {
        self.config.auto_graduate
            && record.status == ItemStatus::Learning
            && input.correct
            && record.repetitions + 1 >= self.config.graduation_threshold
    }

    pub fn should_promote_to_mastered(&self, record: &SrsRecord) -> bool {
        self.config.auto_master
            && record.status == ItemStatus::Review
            && record.interval >= self.config.mastery_interval
            && record.accuracy() >= self.config.mastery_accuracy
    }

    pub fn should_demote_to_learning(&self, record: &SrsRecord, input: &ReviewInput) -> bool {
        !input.correct
            && matches!(record.status, ItemStatus::Learning | ItemStatus::Review)
    }

    pub fn should_demote_from_mastered(&self, record: &SrsRecord, input: &ReviewInput) -> bool {
        record.status == ItemStatus::Mastered
            && !input.correct
            && record.lapses_while_mastered + 1 >= self.config.demotion_threshold
    }

    /// Persistently failing despite many reviews.
    pub fn is_leech(&self, record: &SrsRecord) -> bool {
        record.review_count >= self.config.leech_threshold
            && record.accuracy() < self.config.leech_accuracy
    }

    pub fn collection_stats(&self, pinned: &[PinnedItem], now: DateTime<Utc>) -> CollectionStats {
        let mut stats = CollectionStats::default();
        for item in pinned.iter().filter(|p| p.is_active) {
            stats.total += 1;
            match item.record.status {
                ItemStatus::New => stats.new += 1,
                ItemStatus::Learning => stats.learning += 1,
                ItemStatus::Review => stats.review += 1,
                ItemStatus::Mastered => stats.mastered += 1,
            }
            if item.record.is_due(now) {
                stats.due += 1;
                if item.record.overdue_minutes(now) > OVERDUE_GRACE_MINUTES {
                    stats.overdue += 1;
                }
            }
        }
        stats
    }

    /// Active items due at `now`. Read-only: calling it repeatedly on an
    /// unmodified collection returns the same items.
    pub fn due_items<'a>(
        &self,
        pinned: &'a [PinnedItem],
        now: DateTime<Utc>,
        include_overdue: bool,
    ) -> Vec<&'a PinnedItem> {
        pinned
            .iter()
            .filter(|p| p.is_active && p.record.is_due(now))
            .filter(|p| include_overdue || p.record.overdue_minutes(now) <= OVERDUE_GRACE_MINUTES)
            .collect()
    }

    /// Due-count per calendar day over the next `days` days. Items already
    /// overdue are bucketed into today.
    pub fn forecast(
        &self,
        pinned: &[PinnedItem],
        now: DateTime<Utc>,
        days: u32,
    ) -> BTreeMap<NaiveDate, usize> {
        let today = now.date_naive();
        let Some(horizon) = today.checked_add_days(Days::new(days as u64)) else {
            return BTreeMap::new();
        };
        let mut buckets = BTreeMap::new();
        for item in pinned.iter().filter(|p| p.is_active) {
            let Some(due) = item.record.next_review_at else {
                continue;
            };
            let date = due.date_naive().max(today);
            if date < horizon {
                *buckets.entry(date).or_insert(0) += 1;
            }
        }
        buckets
    }
}
