use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::intervals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WordStatus {
    #[default]
    New,
    Learning,
    Reviewing,
    Mastered,
}

impl WordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Reviewing => "reviewing",
            Self::Mastered => "mastered",
        }
    }

    /// Statuses that take part in scheduled review.
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Learning | Self::Reviewing)
    }
}

/// Learning state of a single word. A word without an entry is NEW.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    pub word_id: String,
    pub status: WordStatus,
    pub last_reviewed_date: Option<DateTime<Utc>>,
    pub next_review_date: Option<DateTime<Utc>>,
    pub current_interval_index: usize,
    pub times_correct_straight: u32,
    pub total_times_reviewed: u32,
}

impl ProgressEntry {
    /// A freshly learned word, first due one rung from now.
    pub fn create(word_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            word_id: word_id.into(),
            status: WordStatus::Learning,
            last_reviewed_date: None,
            next_review_date: Some(schedule_from(now, 0)),
            current_interval_index: 0,
            times_correct_straight: 0,
            total_times_reviewed: 0,
        }
    }

    /// Scheduled review outcome.
    pub fn advance(&self, was_correct: bool, now: DateTime<Utc>) -> Self {
        if !was_correct {
            return self.penalize(now);
        }

        let mut next = self.clone();
        next.times_correct_straight = self.times_correct_straight.saturating_add(1);
        next.total_times_reviewed = self.total_times_reviewed.saturating_add(1);
        next.last_reviewed_date = Some(now);

        if self.current_interval_index + 1 >= intervals::len() {
            next.status = WordStatus::Mastered;
            next.current_interval_index = intervals::last_index();
            next.next_review_date = None;
        } else {
            next.current_interval_index = self.current_interval_index + 1;
            next.status = WordStatus::Reviewing;
            next.next_review_date = Some(schedule_from(now, next.current_interval_index));
        }
        next
    }

    /// Ad-hoc practice outside the schedule. A miss costs the same as a
    /// scheduled miss; a hit only counts as a review and leaves the schedule
    /// (and the correct streak) untouched.
    pub fn record_practice_outcome(&self, was_correct: bool, now: DateTime<Utc>) -> Self {
        if !was_correct {
            return self.penalize(now);
        }

        Self {
            last_reviewed_date: Some(now),
            total_times_reviewed: self.total_times_reviewed.saturating_add(1),
            ..self.clone()
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_scheduled() && self.next_review_date.is_some_and(|next| next <= now)
    }

    /// Pulls a restored entry back inside the invariants: index on the ladder,
    /// no schedule for NEW/MASTERED, next review not before the last one.
    /// A scheduled entry that lost its review date is rescheduled from its
    /// last review, or returned to NEW when it was never reviewed.
    pub fn normalized(mut self) -> Self {
        if !intervals::is_valid_index(self.current_interval_index) {
            self.current_interval_index = intervals::last_index();
        }
        match self.status {
            WordStatus::New | WordStatus::Mastered => self.next_review_date = None,
            WordStatus::Learning | WordStatus::Reviewing => {
                match (self.last_reviewed_date, self.next_review_date) {
                    (Some(last), Some(next)) if next < last => {
                        self.next_review_date = Some(last);
                    }
                    (Some(last), None) => {
                        self.next_review_date =
                            Some(schedule_from(last, self.current_interval_index));
                    }
                    (None, None) => {
                        self.status = WordStatus::New;
                        self.current_interval_index = 0;
                    }
                    _ => {}
                }
            }
        }
        self
    }

    fn penalize(&self, now: DateTime<Utc>) -> Self {
        Self {
            word_id: self.word_id.clone(),
            status: WordStatus::Reviewing,
            last_reviewed_date: Some(now),
            next_review_date: Some(schedule_from(now, 0)),
            current_interval_index: 0,
            times_correct_straight: 0,
            total_times_reviewed: self.total_times_reviewed.saturating_add(1),
        }
    }
}

fn schedule_from(now: DateTime<Utc>, index: usize) -> DateTime<Utc> {
    now + Duration::days(intervals::interval_days(index))
}
