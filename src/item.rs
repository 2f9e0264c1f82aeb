use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumDiscriminants, EnumIter};

/// Structural description of a piece of learnable content. Each variant
/// carries the closed set of fields the difficulty model reads; anything
/// adapter-specific goes into [`ReviewableItem::extra`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumDiscriminants)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum_discriminants(name(ContentTag))]
#[strum_discriminants(derive(Hash, Display, EnumIter))]
pub enum ContentKind {
    Kana {
        script: KanaScript,
    },
    Kanji {
        strokes: u32,
        grade: u8,
    },
    Vocabulary {
        word_length: u32,
        frequency_rank: Option<u32>,
    },
    Sentence {
        token_count: u32,
    },
}

impl ContentKind {
    pub fn tag(&self) -> ContentTag {
        ContentTag::from(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KanaScript {
    Hiragana,
    Katakana,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StudyMode {
    Recognition,
    Recall,
    Listening,
    Typing,
}

/// Content-layer item. Identity is immutable; `difficulty` is the only
/// field this core adjusts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewableItem {
    pub id: String,
    pub kind: ContentKind,
    pub difficulty: f32,
    pub tags: Vec<String>,
    pub supported_modes: Vec<StudyMode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ReviewableItem {
    pub fn new(id: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            id: id.into(),
            kind,
            difficulty: 0.5,
            tags: Vec::new(),
            supported_modes: vec![StudyMode::Recognition, StudyMode::Recall],
            extra: BTreeMap::new(),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    New,
    Learning,
    Review,
    Mastered,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// One graded answer, as reported by the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewInput {
    pub correct: bool,
    pub response_time_ms: u32,
    /// Learner-reported confidence, 1-5. Preferred over timing when present.
    pub confidence: Option<u8>,
    pub hints_used: u32,
    pub attempt_count: u32,
}

impl ReviewInput {
    pub fn correct(response_time_ms: u32) -> Self {
        Self {
            correct: true,
            response_time_ms,
            confidence: None,
            hints_used: 0,
            attempt_count: 1,
        }
    }

    pub fn incorrect(response_time_ms: u32) -> Self {
        Self {
            correct: false,
            ..Self::correct(response_time_ms)
        }
    }

    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Per-(learner, item) scheduling state. Created on first review, mutated
/// only by the algorithm, reset to `New` only by explicit learner action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SrsRecord {
    /// Days until the next review; fractional during intraday learning steps.
    pub interval: f32,
    pub ease_factor: f32,
    /// Consecutive correct answers since the last lapse.
    pub repetitions: u32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub next_review_at: Option<DateTime<Utc>>,
    pub status: ItemStatus,
    pub review_count: u32,
    pub correct_count: u32,
    pub streak: u32,
    pub best_streak: u32,
    /// Total lapses over the record's lifetime.
    pub lapses: u32,
    /// Lapses since the item was last promoted to mastered; reset on demotion.
    pub lapses_while_mastered: u32,
}

impl Default for SrsRecord {
    fn default() -> Self {
        Self {
            interval: 0.0,
            ease_factor: 2.5,
            repetitions: 0,
            last_reviewed_at: None,
            next_review_at: None,
            status: ItemStatus::New,
            review_count: 0,
            correct_count: 0,
            streak: 0,
            best_streak: 0,
            lapses: 0,
            lapses_while_mastered: 0,
        }
    }
}

impl SrsRecord {
    /// Lifetime fraction of correct answers; 1.0 before any review.
    pub fn accuracy(&self) -> f32 {
        if self.review_count == 0 {
            1.0
        } else {
            self.correct_count as f32 / self.review_count as f32
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.next_review_at {
            Some(due) => due <= now,
            None => self.status == ItemStatus::New,
        }
    }

    /// Minutes past due; zero or negative when not yet due.
    pub fn overdue_minutes(&self, now: DateTime<Utc>) -> i64 {
        self.next_review_at
            .map(|due| (now - due).num_minutes())
            .unwrap_or(0)
    }

    /// Learner-initiated restart. Scheduling state goes back to `New`;
    /// lifetime counters (reviews, lapses, best streak) survive.
    pub fn reset(&mut self) {
        self.interval = 0.0;
        self.ease_factor = 2.5;
        self.repetitions = 0;
        self.streak = 0;
        self.status = ItemStatus::New;
        self.next_review_at = None;
        self.lapses_while_mastered = 0;
    }
}

/// A learner's active-pool wrapper around a [`ReviewableItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinnedItem {
    pub item: ReviewableItem,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub pinned_at: DateTime<Utc>,
    pub is_active: bool,
    pub scheduled_release: Option<NaiveDate>,
    /// Optimistic concurrency token, bumped by every mutation.
    pub version: u32,
    pub record: SrsRecord,
}

impl PinnedItem {
    pub fn new(item: ReviewableItem, priority: Priority, pinned_at: DateTime<Utc>) -> Self {
        Self {
            item,
            priority,
            tags: Vec::new(),
            pinned_at,
            is_active: true,
            scheduled_release: None,
            version: 0,
            record: SrsRecord::default(),
        }
    }

    /// Unpinning deactivates rather than deletes, preserving history.
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.version += 1;
    }

    pub fn set_record(&mut self, record: SrsRecord) {
        self.record = record;
        self.version += 1;
    }
}
