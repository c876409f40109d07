//! The review ladder. Each successful review moves a word one rung up; a
//! correct answer on the last rung masters it.

/// Days until the next review, indexed by `ProgressEntry::current_interval_index`.
pub const INTERVAL_DAYS: [i64; 5] = [1, 3, 7, 16, 35];

pub fn interval_days(index: usize) -> i64 {
    INTERVAL_DAYS[index.min(last_index())]
}

pub const fn len() -> usize {
    INTERVAL_DAYS.len()
}

pub const fn last_index() -> usize {
    INTERVAL_DAYS.len() - 1
}

pub fn is_valid_index(index: usize) -> bool {
    index < len()
}
