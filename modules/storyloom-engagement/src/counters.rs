//! Like, reading-list and rating toggles.
//!
//! Every count here mirrors a backing set or map on the aggregate and is
//! re-derived from that collection inside the same read-modify-write step
//! that mutates it. Nothing in this module increments a counter directly,
//! so concurrent togglers cannot drift a count away from its set.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use storyloom_common::{Config, EngagementError};
use storyloom_store::ContentStore;

use crate::{cas, scoring};

/// Target of a like toggle. Stories and comments both carry a `liked_by` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget {
    Story(Uuid),
    Comment(Uuid),
}

/// The caller's membership after the toggle, plus the derived count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeToggle {
    pub liked: bool,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingListToggle {
    pub in_list: bool,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub rating_count: u32,
    pub average_rating: f64,
}

pub struct EngagementCounterService {
    store: Arc<dyn ContentStore>,
    config: Config,
}

impl EngagementCounterService {
    pub fn new(store: Arc<dyn ContentStore>, config: Config) -> Self {
        Self { store, config }
    }

    /// Idempotent membership toggle on the target's `liked_by` set.
    /// Story likes feed the engagement score; comment likes do not.
    pub async fn toggle_like(
        &self,
        target: LikeTarget,
        user_id: Uuid,
    ) -> Result<LikeToggle, EngagementError> {
        match target {
            LikeTarget::Story(story_id) => self.toggle_story_like(story_id, user_id).await,
            LikeTarget::Comment(comment_id) => self.toggle_comment_like(comment_id, user_id).await,
        }
    }

    async fn toggle_story_like(
        &self,
        story_id: Uuid,
        user_id: Uuid,
    ) -> Result<LikeToggle, EngagementError> {
        let weights = self.config.score_weights;
        let result = cas::update_story(
            self.store.as_ref(),
            &self.config,
            story_id,
            "toggle_like",
            |story| {
                let liked = if story.liked_by.remove(&user_id) {
                    false
                } else {
                    story.liked_by.insert(user_id);
                    true
                };
                story.stats.likes_count = story.liked_by.len() as u32;
                scoring::refresh(story, &weights);
                Ok(LikeToggle {
                    liked,
                    count: story.stats.likes_count,
                })
            },
        )
        .await?;
        info!(%story_id, %user_id, liked = result.liked, count = result.count, "Story like toggled");
        Ok(result)
    }

    async fn toggle_comment_like(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
    ) -> Result<LikeToggle, EngagementError> {
        let result = cas::update_comment(
            self.store.as_ref(),
            &self.config,
            comment_id,
            "toggle_like",
            |comment| {
                if comment.is_deleted() {
                    return Err(EngagementError::NotFound(format!("comment {comment_id}")));
                }
                let liked = if comment.engagement.liked_by.remove(&user_id) {
                    false
                } else {
                    comment.engagement.liked_by.insert(user_id);
                    true
                };
                comment.engagement.likes_count = comment.engagement.liked_by.len() as u32;
                Ok(LikeToggle {
                    liked,
                    count: comment.engagement.likes_count,
                })
            },
        )
        .await?;
        info!(%comment_id, %user_id, liked = result.liked, count = result.count, "Comment like toggled");
        Ok(result)
    }

    /// Idempotent membership toggle on `in_reading_lists`.
    pub async fn toggle_reading_list(
        &self,
        story_id: Uuid,
        user_id: Uuid,
    ) -> Result<ReadingListToggle, EngagementError> {
        let result = cas::update_story(
            self.store.as_ref(),
            &self.config,
            story_id,
            "toggle_reading_list",
            |story| {
                let in_list = if story.in_reading_lists.remove(&user_id) {
                    false
                } else {
                    story.in_reading_lists.insert(user_id);
                    true
                };
                story.stats.reading_list_count = story.in_reading_lists.len() as u32;
                Ok(ReadingListToggle {
                    in_list,
                    count: story.stats.reading_list_count,
                })
            },
        )
        .await?;
        info!(%story_id, %user_id, in_list = result.in_list, count = result.count, "Reading list toggled");
        Ok(result)
    }

    /// Upsert the user's rating, replacing any prior value, then re-derive
    /// `rating_count` and `average_rating` from the full map.
    pub async fn submit_rating(
        &self,
        story_id: Uuid,
        user_id: Uuid,
        rating: u8,
    ) -> Result<RatingSummary, EngagementError> {
        if !(1..=5).contains(&rating) {
            return Err(EngagementError::Validation(format!(
                "rating must be within 1..=5, got {rating}"
            )));
        }
        let weights = self.config.score_weights;
        let result = cas::update_story(
            self.store.as_ref(),
            &self.config,
            story_id,
            "submit_rating",
            |story| {
                story.ratings.insert(user_id, rating);
                story.recompute_rating_stats();
                scoring::refresh(story, &weights);
                Ok(RatingSummary {
                    rating_count: story.stats.rating_count,
                    average_rating: story.stats.average_rating,
                })
            },
        )
        .await?;
        info!(
            %story_id, %user_id, rating,
            count = result.rating_count,
            average = result.average_rating,
            "Rating submitted"
        );
        Ok(result)
    }
}
