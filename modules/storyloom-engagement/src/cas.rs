//! Bounded optimistic-retry discipline for aggregate mutations.
//!
//! Every mutation re-reads the aggregate, applies a synchronous closure to
//! the record, and issues a conditional write with the version from that
//! read. A version conflict means a concurrent writer won the race: back off
//! briefly and start over from a fresh read. Attempts are bounded;
//! exhaustion surfaces as `Conflict` and the caller may retry the whole
//! operation.
//!
//! The closure may run once per attempt, so it must not carry side effects
//! outside the record it is handed.

use std::time::Duration;

use tracing::warn;
use uuid::Uuid;

use storyloom_common::{CommentEntity, Config, EngagementError, StoryAggregate};
use storyloom_store::{ContentStore, StoreError};

pub(crate) fn store_error(e: StoreError) -> EngagementError {
    match e {
        StoreError::VersionConflict { .. } => EngagementError::Conflict { attempts: 1 },
        StoreError::NotFound(id) => EngagementError::NotFound(format!("record {id}")),
        StoreError::AlreadyExists(id) => {
            EngagementError::Internal(anyhow::anyhow!("duplicate record {id}"))
        }
        StoreError::Backend(e) => EngagementError::Internal(e),
    }
}

pub(crate) async fn update_story<T>(
    store: &dyn ContentStore,
    config: &Config,
    story_id: Uuid,
    op: &'static str,
    mut mutate: impl FnMut(&mut StoryAggregate) -> Result<T, EngagementError>,
) -> Result<T, EngagementError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let versioned = store
            .story(story_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| EngagementError::NotFound(format!("story {story_id}")))?;
        let mut story = versioned.record;
        let out = mutate(&mut story)?;
        match store.update_story(story, versioned.version).await {
            Ok(_) => return Ok(out),
            Err(StoreError::VersionConflict { .. }) if attempt < config.max_cas_attempts => {
                backoff(config.cas_backoff_ms, attempt).await;
            }
            Err(StoreError::VersionConflict { .. }) => {
                warn!(op, %story_id, attempts = attempt, "Story update exhausted optimistic retries");
                return Err(EngagementError::Conflict { attempts: attempt });
            }
            Err(e) => return Err(store_error(e)),
        }
    }
}

pub(crate) async fn update_comment<T>(
    store: &dyn ContentStore,
    config: &Config,
    comment_id: Uuid,
    op: &'static str,
    mut mutate: impl FnMut(&mut CommentEntity) -> Result<T, EngagementError>,
) -> Result<T, EngagementError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let versioned = store
            .comment(comment_id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| EngagementError::NotFound(format!("comment {comment_id}")))?;
        let mut comment = versioned.record;
        let out = mutate(&mut comment)?;
        match store.update_comment(comment, versioned.version).await {
            Ok(_) => return Ok(out),
            Err(StoreError::VersionConflict { .. }) if attempt < config.max_cas_attempts => {
                backoff(config.cas_backoff_ms, attempt).await;
            }
            Err(StoreError::VersionConflict { .. }) => {
                warn!(op, %comment_id, attempts = attempt, "Comment update exhausted optimistic retries");
                return Err(EngagementError::Conflict { attempts: attempt });
            }
            Err(e) => return Err(store_error(e)),
        }
    }
}

async fn backoff(base_ms: u64, attempt: u32) {
    tokio::time::sleep(Duration::from_millis(base_ms * attempt as u64)).await;
}
