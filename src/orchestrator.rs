//! Per-review integration pipeline.
//!
//! `process_review` runs the state update, adjusts difficulty once enough
//! history exists, computes progress deltas and then fans out to external
//! hooks. The state mutation is committed before any hook runs; a failing
//! hook (or a failing save) is logged and never undoes a finished review.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use log::warn;
use rayon::prelude::*;

use crate::algorithm::SrsConfig;
use crate::difficulty::adjust_difficulty;
use crate::error::Result;
use crate::item::{ItemStatus, ReviewInput, ReviewableItem, SrsRecord};
use crate::state::StateManager;
use crate::store::{Clock, RecordStore, SystemClock};

const STREAK_MILESTONES: [u32; 3] = [7, 30, 100];
const REVIEW_MILESTONES: [u32; 3] = [10, 50, 100];
/// Reviews required before difficulty starts adapting.
const DIFFICULTY_ADJUST_MIN_REVIEWS: u32 = 3;
/// Inputs remembered per (user, item) for difficulty adjustment.
const HISTORY_KEEP: usize = 5;

/// Custom progress function over the fresh record.
#[derive(Clone)]
pub struct ProgressFn(pub Arc<dyn Fn(&SrsRecord, &SrsConfig) -> f32 + Send + Sync>);

impl PartialEq for ProgressFn {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl std::fmt::Debug for ProgressFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Wrap(<function>)")
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ProgressStrategy {
    /// By state alone: new 0, learning 1/3, review 2/3, mastered 1.
    Linear,
    /// 40% state + 30% normalized interval + 20% accuracy + 10% streak.
    #[default]
    Weighted,
    Custom(ProgressFn),
}

fn state_progress(status: ItemStatus) -> f32 {
    match status {
        ItemStatus::New => 0.0,
        ItemStatus::Learning => 1.0 / 3.0,
        ItemStatus::Review => 2.0 / 3.0,
        ItemStatus::Mastered => 1.0,
    }
}

impl ProgressStrategy {
    pub fn evaluate(&self, record: &SrsRecord, config: &SrsConfig) -> f32 {
        match self {
            Self::Linear => state_progress(record.status),
            Self::Weighted => {
                let interval = (record.interval / config.mastery_interval).clamp(0.0, 1.0);
                let accuracy = if record.review_count == 0 {
                    0.0
                } else {
                    record.accuracy()
                };
                let streak = (record.streak as f32 / 10.0).min(1.0);
                0.4 * state_progress(record.status)
                    + 0.3 * interval
                    + 0.2 * accuracy
                    + 0.1 * streak
            }
            Self::Custom(f) => (f.0)(record, config).clamp(0.0, 1.0),
        }
    }
}

/// Everything a side-effect hook gets to see.
#[derive(Debug)]
pub struct HookContext<'a> {
    pub user_id: &'a str,
    pub item: &'a ReviewableItem,
    pub old_progress: f32,
    pub new_progress: f32,
    pub record: &'a SrsRecord,
}

/// External side effect run after a review commits: progress sync,
/// achievement persistence, UI refresh, offline write-back. Failures are
/// isolated per hook.
#[derive(Clone)]
pub struct ReviewHook(pub Arc<dyn Fn(&HookContext) -> Result<()> + Send + Sync>);

impl std::fmt::Debug for ReviewHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Wrap(<function>)")
    }
}

#[derive(Clone)]
pub struct AchievementFn(pub Arc<dyn Fn(&str, &AchievementEvent) + Send + Sync>);

impl std::fmt::Debug for AchievementFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Wrap(<function>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementEvent {
    StreakMilestone(u32),
    ReviewMilestone(u32),
    /// Reached mastered without a single lapse on the record.
    FlawlessMastery,
}

/// Threshold crossings between the prior and the fresh record.
pub fn achievements_for(old: Option<&SrsRecord>, new: &SrsRecord) -> Vec<AchievementEvent> {
    let old_streak = old.map_or(0, |r| r.streak);
    let old_reviews = old.map_or(0, |r| r.review_count);
    let old_status = old.map_or(ItemStatus::New, |r| r.status);

    let mut events = Vec::new();
    for milestone in STREAK_MILESTONES {
        if old_streak < milestone && new.streak >= milestone {
            events.push(AchievementEvent::StreakMilestone(milestone));
        }
    }
    for milestone in REVIEW_MILESTONES {
        if old_reviews < milestone && new.review_count >= milestone {
            events.push(AchievementEvent::ReviewMilestone(milestone));
        }
    }
    if new.status == ItemStatus::Mastered && old_status != ItemStatus::Mastered && new.lapses == 0
    {
        events.push(AchievementEvent::FlawlessMastery);
    }
    events
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub record: SrsRecord,
    pub old_status: ItemStatus,
    pub new_status: ItemStatus,
    pub old_progress: f32,
    pub new_progress: f32,
    /// Updated item difficulty, present once enough history accumulated.
    pub adjusted_difficulty: Option<f32>,
    pub achievements: Vec<AchievementEvent>,
}

pub struct Orchestrator {
    state: StateManager,
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    strategy: ProgressStrategy,
    hooks: Vec<(u64, ReviewHook)>,
    achievement_listeners: Vec<(u64, AchievementFn)>,
    next_handle: u64,
    recent_inputs: Mutex<HashMap<String, VecDeque<ReviewInput>>>,
}

impl Orchestrator {
    pub fn new(config: SrsConfig, store: Arc<dyn RecordStore>) -> Self {
        Self {
            state: StateManager::new(config),
            store,
            clock: Arc::new(SystemClock),
            strategy: ProgressStrategy::default(),
            hooks: Vec::new(),
            achievement_listeners: Vec::new(),
            next_handle: 0,
            recent_inputs: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_strategy(mut self, strategy: ProgressStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state
    }

    pub fn state_manager_mut(&mut self) -> &mut StateManager {
        &mut self.state
    }

    pub fn add_hook(&mut self, hook: ReviewHook) -> HookHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.hooks.push((handle, hook));
        HookHandle(handle)
    }

    pub fn remove_hook(&mut self, handle: HookHandle) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|(id, _)| *id != handle.0);
        self.hooks.len() != before
    }

    pub fn on_achievement(&mut self, listener: AchievementFn) -> HookHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.achievement_listeners.push((handle, listener));
        HookHandle(handle)
    }

    pub fn remove_achievement_listener(&mut self, handle: HookHandle) -> bool {
        let before = self.achievement_listeners.len();
        self.achievement_listeners.retain(|(id, _)| *id != handle.0);
        self.achievement_listeners.len() != before
    }

    /// Applies one review end to end. Infallible by design: a load failure
    /// degrades to a missing record, and save/hook failures are logged
    /// without discarding the already-computed update.
    pub fn process_review(
        &self,
        user_id: &str,
        item: &ReviewableItem,
        input: &ReviewInput,
    ) -> ReviewOutcome {
        let now = self.clock.now();
        let prior = match self.store.record(user_id, &item.id) {
            Ok(prior) => prior,
            Err(err) => {
                warn!("record load failed for {}: {err}; treating as new", item.id);
                None
            }
        };
        let old_status = prior.as_ref().map_or(ItemStatus::New, |r| r.status);
        let updated = self.state.apply_review(&item.id, prior.as_ref(), input, now);

        let config = self.state.config();
        let old_progress = prior
            .as_ref()
            .map_or(0.0, |r| self.strategy.evaluate(r, config));
        let new_progress = self.strategy.evaluate(&updated, config);

        let adjusted_difficulty = self.track_history(user_id, item, input, &updated);

        let achievements = achievements_for(prior.as_ref(), &updated);
        for event in &achievements {
            for (_, listener) in &self.achievement_listeners {
                (listener.0)(user_id, event);
            }
        }

        // The review is committed from here on; nothing below may undo it.
        if let Err(err) = self.store.save_record(user_id, &item.id, &updated) {
            warn!("record save failed for {}: {err}", item.id);
        }
        let context = HookContext {
            user_id,
            item,
            old_progress,
            new_progress,
            record: &updated,
        };
        for (_, hook) in &self.hooks {
            if let Err(err) = (hook.0)(&context) {
                warn!("review hook failed for {}: {err}", item.id);
            }
        }

        ReviewOutcome {
            new_status: updated.status,
            record: updated,
            old_status,
            old_progress,
            new_progress,
            adjusted_difficulty,
            achievements,
        }
    }

    /// Distinct items update independently; records are keyed per
    /// (user, item), so no cross-item locking is needed.
    pub fn process_batch(
        &self,
        user_id: &str,
        reviews: &[(ReviewableItem, ReviewInput)],
    ) -> Vec<ReviewOutcome> {
        reviews
            .par_iter()
            .map(|(item, input)| self.process_review(user_id, item, input))
            .collect()
    }

    fn track_history(
        &self,
        user_id: &str,
        item: &ReviewableItem,
        input: &ReviewInput,
        updated: &SrsRecord,
    ) -> Option<f32> {
        let mut map = self.recent_inputs.lock().ok()?;
        let window = map.entry(format!("{user_id}:{}", item.id)).or_default();
        window.push_back(input.clone());
        if window.len() > HISTORY_KEEP {
            window.pop_front();
        }
        if updated.review_count >= DIFFICULTY_ADJUST_MIN_REVIEWS {
            let history: Vec<ReviewInput> = window.iter().cloned().collect();
            Some(adjust_difficulty(item.difficulty, &history))
        } else {
            None
        }
    }
}
