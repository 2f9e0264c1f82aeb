//! End-to-end walk-through: pin a small pool, drip-feed it onto the
//! calendar, build a session queue and run a few reviews through the
//! orchestrator. Run with `cargo run --example session`.

use std::sync::Arc;

use chrono::Utc;
use kioku::{
    ContentKind, DifficultyFactors, KanaScript, MemoryStore, Orchestrator, PinnedItem, Priority,
    QueueOptions, RecordStore, ReleaseOptions, ReviewHook, ReviewInput, ReviewableItem, SrsConfig,
    generate_queue, initial_difficulty, plan_gradual_release,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {message}", record.level()))
        })
        .level(log::LevelFilter::Debug)
        .chain(std::io::stdout())
        .apply()?;

    let now = Utc::now();
    let store = Arc::new(MemoryStore::new());
    let mut orchestrator = Orchestrator::new(SrsConfig::default(), store.clone());
    orchestrator.add_hook(ReviewHook(Arc::new(|ctx| {
        println!(
            "  hook: sync {} for {} ({:.2} -> {:.2})",
            ctx.item.id, ctx.user_id, ctx.old_progress, ctx.new_progress
        );
        Ok(())
    })));

    let factors = DifficultyFactors::default();
    let kinds = [
        (
            "kana-ka",
            ContentKind::Kana {
                script: KanaScript::Katakana,
            },
        ),
        ("kanji-mizu", ContentKind::Kanji { strokes: 4, grade: 1 }),
        ("kanji-kokoro", ContentKind::Kanji { strokes: 4, grade: 2 }),
        (
            "word-taberu",
            ContentKind::Vocabulary {
                word_length: 3,
                frequency_rank: Some(120),
            },
        ),
        (
            "word-sekai",
            ContentKind::Vocabulary {
                word_length: 3,
                frequency_rank: Some(480),
            },
        ),
        ("sentence-1", ContentKind::Sentence { token_count: 6 }),
    ];
    for (id, kind) in kinds {
        let mut item = ReviewableItem::new(id, kind);
        item.difficulty = initial_difficulty(&item, &factors);
        store.save_pinned("demo", &PinnedItem::new(item, Priority::Normal, now))?;
    }

    let pool = store.pinned_items("demo")?;
    let options = ReleaseOptions {
        skip_weekends: true,
        ..ReleaseOptions::new(2, now.date_naive())
    };
    let plan = plan_gradual_release(&pool, &options);
    let summary = plan.summary();
    println!(
        "release plan: {} items over {} batches, {:?} through {:?}",
        summary.total_items, summary.batches, summary.first_date, summary.last_date
    );

    let queue = generate_queue(&pool, &QueueOptions::default(), now);
    println!(
        "session queue: {} of {} items ({} new)",
        queue.items.len(),
        queue.stats.total_items,
        queue.stats.new_items
    );

    for queued in queue.items.iter().take(3) {
        let outcome =
            orchestrator.process_review("demo", &queued.item, &ReviewInput::correct(1800));
        println!(
            "reviewed {}: {} -> {}, next in {:.1} minutes",
            queued.item.id,
            outcome.old_status,
            outcome.new_status,
            outcome.record.interval * 1440.0
        );
    }

    Ok(())
}
