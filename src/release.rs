//! Calendar-aware gradual release of a pinned backlog.
//!
//! A backlog is split into day-sized batches, each assigned the next
//! calendar date that satisfies the weekday constraints. The resulting plan
//! is ephemeral: it is recomputed wholesale whenever the backlog is
//! rescheduled or optimized. Everything here is deterministic.

use chrono::{Datelike, NaiveDate, Weekday};
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::item::PinnedItem;

/// Upper bound on the forward scan for an allowed date, so a degenerate
/// weekday allowlist cannot loop forever.
const MAX_DATE_SCAN: usize = 400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseOptions {
    /// Items released per calendar day. Zero yields an empty plan.
    pub daily_limit: usize,
    pub start_date: NaiveDate,
    /// Explicit weekday allowlist; takes precedence over `skip_weekends`.
    pub release_days: Option<Vec<Weekday>>,
    pub skip_weekends: bool,
    /// Spread the remainder across all batches instead of leaving one
    /// undersized tail batch.
    pub distribute_evenly: bool,
}

impl ReleaseOptions {
    pub fn new(daily_limit: usize, start_date: NaiveDate) -> Self {
        Self {
            daily_limit,
            start_date,
            release_days: None,
            skip_weekends: false,
            distribute_evenly: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseEntry {
    pub item_id: String,
    pub release_date: NaiveDate,
    /// 1-based batch number.
    pub batch: u32,
    pub released: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReleaseSummary {
    pub total_items: usize,
    pub batches: usize,
    pub items_per_batch: Vec<usize>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReleasePlan {
    options: ReleaseOptions,
    entries: Vec<ReleaseEntry>,
}

fn allowed(date: NaiveDate, options: &ReleaseOptions) -> bool {
    match &options.release_days {
        Some(days) if !days.is_empty() => days.contains(&date.weekday()),
        _ => !options.skip_weekends || !matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
    }
}

/// Linear forward scan to the first allowed date at or after `from`.
fn next_allowed(from: NaiveDate, options: &ReleaseOptions) -> NaiveDate {
    let mut date = from;
    for _ in 0..MAX_DATE_SCAN {
        if allowed(date, options) {
            return date;
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => return date,
        }
    }
    date
}

fn batch_sizes(total: usize, options: &ReleaseOptions) -> Vec<usize> {
    if total == 0 || options.daily_limit == 0 {
        return Vec::new();
    }
    let batches = total.div_ceil(options.daily_limit);
    if options.distribute_evenly {
        let base = total / batches;
        let extra = total % batches;
        (0..batches).map(|i| base + usize::from(i < extra)).collect()
    } else {
        let mut sizes = vec![options.daily_limit; batches];
        let tail = total - options.daily_limit * (batches - 1);
        sizes[batches - 1] = tail;
        sizes
    }
}

fn build_entries(
    ids: &[String],
    options: &ReleaseOptions,
    start: NaiveDate,
    first_batch: u32,
) -> Vec<ReleaseEntry> {
    let sizes = batch_sizes(ids.len(), options);
    let mut entries = Vec::with_capacity(ids.len());
    let mut date = next_allowed(start, options);
    let mut ids = ids.iter();
    for (index, size) in sizes.iter().enumerate() {
        for id in ids.by_ref().take(*size) {
            entries.push(ReleaseEntry {
                item_id: id.clone(),
                release_date: date,
                batch: first_batch + index as u32,
                released: false,
            });
        }
        let next = date.succ_opt().unwrap_or(date);
        date = next_allowed(next, options);
    }
    entries
}

/// Splits an ordered backlog into calendar-dated release batches.
pub fn plan_gradual_release(items: &[PinnedItem], options: &ReleaseOptions) -> ReleasePlan {
    let ids = items.iter().map(|p| p.item.id.clone()).collect_vec();
    let entries = build_entries(&ids, options, options.start_date, 1);
    debug!(
        "planned release of {} items in {} batches",
        ids.len(),
        entries.last().map_or(0, |e| e.batch)
    );
    ReleasePlan {
        options: options.clone(),
        entries,
    }
}

impl ReleasePlan {
    pub fn entries(&self) -> &[ReleaseEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unreleased entries scheduled on or before `date`.
    pub fn due_by(&self, date: NaiveDate) -> Vec<&ReleaseEntry> {
        self.entries
            .iter()
            .filter(|e| !e.released && e.release_date <= date)
            .collect()
    }

    pub fn due_today(&self, today: NaiveDate) -> Vec<&ReleaseEntry> {
        self.due_by(today)
    }

    pub fn mark_released(&mut self, item_id: &str) -> bool {
        match self.entries.iter_mut().find(|e| e.item_id == item_id) {
            Some(entry) if !entry.released => {
                entry.released = true;
                true
            }
            _ => false,
        }
    }

    fn next_batch_number(&self) -> u32 {
        self.entries
            .iter()
            .filter(|e| e.released)
            .map(|e| e.batch)
            .max()
            .map_or(1, |b| b + 1)
    }

    /// Recomputes dates for the unreleased remainder from `new_start`,
    /// keeping released entries untouched.
    pub fn reschedule(&mut self, new_start: NaiveDate) {
        let pending = self
            .entries
            .iter()
            .filter(|e| !e.released)
            .map(|e| e.item_id.clone())
            .collect_vec();
        let rebuilt = build_entries(&pending, &self.options, new_start, self.next_batch_number());
        self.entries.retain(|e| e.released);
        self.entries.extend(rebuilt);
    }

    /// Re-sorts and re-batches pending entries from `today` forward, closing
    /// the gaps left by out-of-order releases.
    pub fn optimize(&mut self, today: NaiveDate) {
        let pending = self
            .entries
            .iter()
            .filter(|e| !e.released)
            .sorted_by_key(|e| e.release_date)
            .map(|e| e.item_id.clone())
            .collect_vec();
        let rebuilt = build_entries(&pending, &self.options, today, self.next_batch_number());
        self.entries.retain(|e| e.released);
        self.entries.extend(rebuilt);
    }

    pub fn summary(&self) -> ReleaseSummary {
        let items_per_batch = self
            .entries
            .iter()
            .counts_by(|e| e.batch)
            .into_iter()
            .sorted()
            .map(|(_, count)| count)
            .collect_vec();
        ReleaseSummary {
            total_items: self.entries.len(),
            batches: items_per_batch.len(),
            items_per_batch,
            first_date: self.entries.iter().map(|e| e.release_date).min(),
            last_date: self.entries.iter().map(|e| e.release_date).max(),
        }
    }
}
