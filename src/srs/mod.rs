pub mod intervals;
pub mod progress;
pub mod scheduler;

pub use progress::{ProgressEntry, WordStatus};
pub use scheduler::{Dashboard, ProgressStats, SortOrder, WordOverview};
