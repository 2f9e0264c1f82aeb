mod algorithm;
mod difficulty;
mod error;
mod item;
mod orchestrator;
mod queue;
mod release;
mod state;
mod store;
#[cfg(test)]
mod test_helpers;

pub use algorithm::{
    FIRST_LEARNING_STEP, SECOND_LEARNING_STEP, SrsConfig, next_ease_factor, next_record,
    quality_score,
};
pub use difficulty::{
    DifficultyBand, DifficultyFactors, adjust_difficulty, balance_by_difficulty,
    group_by_difficulty, initial_difficulty,
};
pub use error::{Result, SrsError};
pub use item::{
    ContentKind, ContentTag, ItemStatus, KanaScript, PinnedItem, Priority, ReviewInput,
    ReviewableItem, SrsRecord, StudyMode,
};
pub use orchestrator::{
    AchievementEvent, AchievementFn, HookContext, HookHandle, Orchestrator, ProgressFn,
    ProgressStrategy, ReviewHook, ReviewOutcome, achievements_for,
};
pub use queue::{
    QueueItem, QueueOptions, QueueStats, SessionQueue, apply_daily_limits, generate_queue,
    queue_priority, shuffle_for_variety,
};
pub use release::{ReleaseEntry, ReleaseOptions, ReleasePlan, ReleaseSummary, plan_gradual_release};
pub use state::{CollectionStats, ListenerHandle, StateChangeFn, StateManager};
pub use store::{Clock, FixedClock, MemoryStore, RecordStore, SystemClock};
