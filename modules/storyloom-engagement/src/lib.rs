mod cas;

pub mod counters;
pub mod moderation;
pub mod reading;
pub mod scoring;

pub use counters::{
    EngagementCounterService, LikeTarget, LikeToggle, RatingSummary, ReadingListToggle,
};
pub use moderation::{
    CascadeOutcome, CommentListing, CommentModerationEngine, CommentThread, ReportOutcome,
};
pub use reading::{PageContent, ReadingSessionTracker, READING_WORDS_PER_MINUTE};
pub use scoring::engagement_score;
