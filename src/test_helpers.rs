use chrono::{DateTime, TimeZone, Utc};

use crate::item::{ContentKind, PinnedItem, Priority, ReviewableItem};

pub(crate) trait TestHelper {
    fn assert_approx_eq<const N: usize>(&self, expected: [f32; N]);
}

impl TestHelper for [f32] {
    fn assert_approx_eq<const N: usize>(&self, expected: [f32; N]) {
        assert_eq!(self.len(), N, "length mismatch");
        for (index, (actual, expected)) in self.iter().zip(expected).enumerate() {
            assert!(
                (actual - expected).abs() < 1e-4,
                "[{index}]: {actual} != {expected}"
            );
        }
    }
}

pub(crate) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

pub(crate) fn sample_pinned(id: &str) -> PinnedItem {
    let item = ReviewableItem::new(
        id,
        ContentKind::Vocabulary {
            word_length: 4,
            frequency_rank: Some(500),
        },
    );
    PinnedItem::new(item, Priority::Normal, fixed_now())
}
