//! Comment lifecycle: creation, reporting with auto-flag, the moderation
//! state machine, pinning, edits, cascading deletion, and the public
//! listing.
//!
//! Status edges (deleted is terminal, no reverse edge):
//!   active  → flagged            report threshold reached
//!   active  → hidden | deleted   moderator
//!   flagged → active             moderator approve, clears reports
//!   flagged → hidden | deleted   moderator
//!   hidden  → active | deleted   moderator
//!
//! Cascading deletion walks the parent→children index iteratively and
//! corrects the story's comment count once per removed live comment.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use storyloom_common::{
    Actor, CommentEntity, CommentReport, CommentRevision, CommentSortKey, CommentStatus, Config,
    EngagementError, ModerationAction,
};
use storyloom_store::ContentStore;

use crate::{cas, scoring};

/// Upper bound on listing page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A top-level comment with its direct, active replies in chronological
/// order.
#[derive(Debug, Clone)]
pub struct CommentThread {
    pub comment: CommentEntity,
    pub replies: Vec<CommentEntity>,
}

/// One page of the public comment listing.
#[derive(Debug, Clone)]
pub struct CommentListing {
    pub threads: Vec<CommentThread>,
    pub page: u32,
    pub page_size: u32,
    /// Top-level active comments across all pages.
    pub total: u32,
}

/// Outcome of a report call.
#[derive(Debug, Clone, Copy)]
pub struct ReportOutcome {
    pub report_count: u32,
    pub status: CommentStatus,
    /// False when this reporter had already reported the comment.
    pub newly_reported: bool,
}

/// Outcome of a cascade delete: comments transitioned to deleted, root
/// included.
#[derive(Debug, Clone, Copy)]
pub struct CascadeOutcome {
    pub removed: u32,
}

pub struct CommentModerationEngine {
    store: Arc<dyn ContentStore>,
    config: Config,
}

impl CommentModerationEngine {
    pub fn new(store: Arc<dyn ContentStore>, config: Config) -> Self {
        Self { store, config }
    }

    /// Create a comment, or a reply to a top-level comment. Replies nest at
    /// most one level deep.
    pub async fn create_comment(
        &self,
        story_id: Uuid,
        author_id: Uuid,
        content: &str,
        parent_id: Option<Uuid>,
    ) -> Result<CommentEntity, EngagementError> {
        self.validate_comment_content(content)?;

        self.store
            .story(story_id)
            .await
            .map_err(cas::store_error)?
            .ok_or_else(|| EngagementError::NotFound(format!("story {story_id}")))?;

        if let Some(parent_id) = parent_id {
            let parent = self
                .store
                .comment(parent_id)
                .await
                .map_err(cas::store_error)?
                .ok_or_else(|| EngagementError::NotFound(format!("comment {parent_id}")))?
                .record;
            if parent.story_id != story_id {
                return Err(EngagementError::Validation(
                    "parent comment belongs to a different story".to_string(),
                ));
            }
            if parent.is_deleted() {
                return Err(EngagementError::Validation(
                    "cannot reply to a deleted comment".to_string(),
                ));
            }
            if !parent.is_top_level() {
                return Err(EngagementError::Validation(
                    "replies cannot nest more than one level deep".to_string(),
                ));
            }
        }

        let comment = CommentEntity::new(story_id, author_id, content.to_string(), parent_id);
        self.store
            .insert_comment(comment.clone())
            .await
            .map_err(cas::store_error)?;

        if let Some(parent_id) = parent_id {
            cas::update_comment(
                self.store.as_ref(),
                &self.config,
                parent_id,
                "reply_created",
                |parent| {
                    parent.engagement.replies_count += 1;
                    Ok(())
                },
            )
            .await?;
        }

        let weights = self.config.score_weights;
        cas::update_story(
            self.store.as_ref(),
            &self.config,
            story_id,
            "comment_created",
            |story| {
                story.stats.comment_count += 1;
                scoring::refresh(story, &weights);
                Ok(())
            },
        )
        .await?;

        info!(
            comment_id = %comment.id, %story_id, %author_id,
            reply = parent_id.is_some(),
            "Comment created"
        );
        Ok(comment)
    }

    /// Record a report. A repeat report from the same user is a no-op, not
    /// an error. Reaching the configured threshold flags an active comment.
    pub async fn report_comment(
        &self,
        comment_id: Uuid,
        reporter_id: Uuid,
        reason: &str,
    ) -> Result<ReportOutcome, EngagementError> {
        let current = self
            .store
            .comment(comment_id)
            .await
            .map_err(cas::store_error)?
            .ok_or_else(|| EngagementError::NotFound(format!("comment {comment_id}")))?
            .record;
        if current.is_deleted() {
            return Err(EngagementError::NotFound(format!("comment {comment_id}")));
        }
        if current
            .engagement
            .reported_by
            .iter()
            .any(|r| r.reporter_id == reporter_id)
        {
            debug!(%comment_id, %reporter_id, "Duplicate report ignored");
            return Ok(ReportOutcome {
                report_count: current.engagement.report_count,
                status: current.status,
                newly_reported: false,
            });
        }

        let threshold = self.config.report_flag_threshold;
        let outcome = cas::update_comment(
            self.store.as_ref(),
            &self.config,
            comment_id,
            "report_comment",
            |comment| {
                if comment.is_deleted() {
                    return Err(EngagementError::NotFound(format!("comment {comment_id}")));
                }
                if !comment
                    .engagement
                    .reported_by
                    .iter()
                    .any(|r| r.reporter_id == reporter_id)
                {
                    comment.engagement.reported_by.push(CommentReport {
                        reporter_id,
                        reason: reason.to_string(),
                        reported_at: Utc::now(),
                    });
                }
                comment.engagement.report_count = comment.engagement.reported_by.len() as u32;
                if comment.engagement.report_count >= threshold
                    && comment.status == CommentStatus::Active
                {
                    comment.status = CommentStatus::Flagged;
                    comment.auto_flagged = true;
                }
                comment.updated_at = Utc::now();
                Ok(ReportOutcome {
                    report_count: comment.engagement.report_count,
                    status: comment.status,
                    newly_reported: true,
                })
            },
        )
        .await?;

        info!(
            %comment_id, %reporter_id,
            count = outcome.report_count,
            status = %outcome.status,
            "Comment reported"
        );
        Ok(outcome)
    }

    /// Execute a moderation action. Admin-only; acting on a deleted comment
    /// answers NotFound, an illegal edge answers InvalidState.
    pub async fn moderate_comment(
        &self,
        comment_id: Uuid,
        moderator: Actor,
        action: ModerationAction,
        reason: Option<&str>,
    ) -> Result<CommentStatus, EngagementError> {
        if !moderator.is_admin() {
            return Err(EngagementError::Forbidden(
                "moderation requires the admin role".to_string(),
            ));
        }

        if action == ModerationAction::Delete {
            let outcome = self.delete_cascade(comment_id).await?;
            info!(
                %comment_id, moderator = %moderator.id,
                removed = outcome.removed,
                reason = reason.unwrap_or(""),
                "Comment deleted by moderator"
            );
            return Ok(CommentStatus::Deleted);
        }

        let new_status = cas::update_comment(
            self.store.as_ref(),
            &self.config,
            comment_id,
            "moderate_comment",
            |comment| {
                if comment.is_deleted() {
                    return Err(EngagementError::NotFound(format!("comment {comment_id}")));
                }
                let next = fsm_edge(comment.status, action)?;
                if action == ModerationAction::Approve {
                    comment.engagement.reported_by.clear();
                    comment.engagement.report_count = 0;
                    comment.auto_flagged = false;
                }
                comment.status = next;
                comment.updated_at = Utc::now();
                Ok(next)
            },
        )
        .await?;

        info!(
            %comment_id, moderator = %moderator.id,
            action = %action, status = %new_status,
            reason = reason.unwrap_or(""),
            "Comment moderated"
        );
        Ok(new_status)
    }

    /// Pin a comment. Story author or admin only.
    pub async fn pin_comment(
        &self,
        comment_id: Uuid,
        requester: Actor,
    ) -> Result<(), EngagementError> {
        self.set_pinned(comment_id, requester, true).await
    }

    /// Unpin a comment. Same authorization as pinning.
    pub async fn unpin_comment(
        &self,
        comment_id: Uuid,
        requester: Actor,
    ) -> Result<(), EngagementError> {
        self.set_pinned(comment_id, requester, false).await
    }

    async fn set_pinned(
        &self,
        comment_id: Uuid,
        requester: Actor,
        pinned: bool,
    ) -> Result<(), EngagementError> {
        let current = self
            .store
            .comment(comment_id)
            .await
            .map_err(cas::store_error)?
            .ok_or_else(|| EngagementError::NotFound(format!("comment {comment_id}")))?
            .record;
        if current.is_deleted() {
            return Err(EngagementError::InvalidState(
                "cannot pin or unpin a deleted comment".to_string(),
            ));
        }
        self.authorize_pin(&current, requester).await?;

        cas::update_comment(
            self.store.as_ref(),
            &self.config,
            comment_id,
            "set_pinned",
            |comment| {
                if comment.is_deleted() {
                    return Err(EngagementError::InvalidState(
                        "cannot pin or unpin a deleted comment".to_string(),
                    ));
                }
                comment.is_pinned = pinned;
                comment.pinned_by = pinned.then_some(requester.id);
                comment.updated_at = Utc::now();
                Ok(())
            },
        )
        .await?;

        info!(%comment_id, requester = %requester.id, pinned, "Comment pin toggled");
        Ok(())
    }

    async fn authorize_pin(
        &self,
        comment: &CommentEntity,
        requester: Actor,
    ) -> Result<(), EngagementError> {
        if requester.is_admin() {
            return Ok(());
        }
        let story = self
            .store
            .story(comment.story_id)
            .await
            .map_err(cas::store_error)?
            .ok_or_else(|| EngagementError::NotFound(format!("story {}", comment.story_id)))?;
        if story.record.author_id == requester.id {
            Ok(())
        } else {
            Err(EngagementError::Forbidden(
                "only the story author or an admin can pin comments".to_string(),
            ))
        }
    }

    /// Edit a comment's content. Author-only; history is append-only.
    pub async fn edit_comment(
        &self,
        comment_id: Uuid,
        author_id: Uuid,
        new_content: &str,
    ) -> Result<CommentEntity, EngagementError> {
        self.validate_comment_content(new_content)?;
        let updated = cas::update_comment(
            self.store.as_ref(),
            &self.config,
            comment_id,
            "edit_comment",
            |comment| {
                if comment.is_deleted() {
                    return Err(EngagementError::NotFound(format!("comment {comment_id}")));
                }
                if comment.author_id != author_id {
                    return Err(EngagementError::Forbidden(
                        "only the comment author can edit it".to_string(),
                    ));
                }
                let now = Utc::now();
                comment.edit_history.push(CommentRevision {
                    content: std::mem::take(&mut comment.content),
                    edited_at: now,
                });
                comment.content = new_content.to_string();
                comment.updated_at = now;
                Ok(comment.clone())
            },
        )
        .await?;

        info!(%comment_id, %author_id, revisions = updated.edit_history.len(), "Comment edited");
        Ok(updated)
    }

    /// Delete a comment and its descendants. Author or admin.
    pub async fn delete_comment(
        &self,
        comment_id: Uuid,
        requester: Actor,
    ) -> Result<CascadeOutcome, EngagementError> {
        let root = self
            .store
            .comment(comment_id)
            .await
            .map_err(cas::store_error)?
            .ok_or_else(|| EngagementError::NotFound(format!("comment {comment_id}")))?
            .record;
        if root.is_deleted() {
            return Err(EngagementError::NotFound(format!("comment {comment_id}")));
        }
        if requester.id != root.author_id && !requester.is_admin() {
            return Err(EngagementError::Forbidden(
                "only the comment author or an admin can delete a comment".to_string(),
            ));
        }
        self.cascade_from(root).await
    }

    async fn delete_cascade(&self, comment_id: Uuid) -> Result<CascadeOutcome, EngagementError> {
        let root = self
            .store
            .comment(comment_id)
            .await
            .map_err(cas::store_error)?
            .ok_or_else(|| EngagementError::NotFound(format!("comment {comment_id}")))?
            .record;
        if root.is_deleted() {
            return Err(EngagementError::NotFound(format!("comment {comment_id}")));
        }
        self.cascade_from(root).await
    }

    /// Breadth-first walk over the parent→children index. The depth rule
    /// bounds real trees at one reply level; the walk handles any shape
    /// without recursion.
    async fn cascade_from(&self, root: CommentEntity) -> Result<CascadeOutcome, EngagementError> {
        let story_id = root.story_id;
        let root_id = root.id;
        let parent_id = root.parent_id;

        let mut queue = VecDeque::from([root_id]);
        let mut removed = 0u32;
        while let Some(id) = queue.pop_front() {
            for child in self
                .store
                .children_of(id)
                .await
                .map_err(cas::store_error)?
            {
                queue.push_back(child);
            }
            let was_live = cas::update_comment(
                self.store.as_ref(),
                &self.config,
                id,
                "cascade_delete",
                |comment| {
                    if comment.is_deleted() {
                        return Ok(false);
                    }
                    comment.status = CommentStatus::Deleted;
                    if comment.is_pinned {
                        comment.is_pinned = false;
                        comment.pinned_by = None;
                    }
                    comment.updated_at = Utc::now();
                    Ok(true)
                },
            )
            .await?;
            if was_live {
                removed += 1;
            }
        }

        // The root's parent survives the cascade; its replies_count tracks
        // live children only.
        if let Some(parent_id) = parent_id {
            cas::update_comment(
                self.store.as_ref(),
                &self.config,
                parent_id,
                "reply_removed",
                |parent| {
                    if !parent.is_deleted() {
                        parent.engagement.replies_count =
                            parent.engagement.replies_count.saturating_sub(1);
                    }
                    Ok(())
                },
            )
            .await?;
        }

        // One decrement per removed live comment keeps comment_count equal
        // to the number of live comments, whatever the tree looked like.
        if removed > 0 {
            let weights = self.config.score_weights;
            match cas::update_story(
                self.store.as_ref(),
                &self.config,
                story_id,
                "comments_removed",
                |story| {
                    story.stats.comment_count = story.stats.comment_count.saturating_sub(removed);
                    scoring::refresh(story, &weights);
                    Ok(())
                },
            )
            .await
            {
                Ok(()) => {}
                Err(EngagementError::NotFound(_)) => {
                    warn!(%story_id, "Story missing during comment cascade; count correction skipped");
                }
                Err(e) => return Err(e),
            }
        }

        info!(comment_id = %root_id, %story_id, removed, "Comment cascade deleted");
        Ok(CascadeOutcome { removed })
    }

    /// Public listing: top-level active comments, pinned first, then by the
    /// sort key; each with its direct active replies oldest-first.
    pub async fn list_comments(
        &self,
        story_id: Uuid,
        page: u32,
        page_size: u32,
        sort: CommentSortKey,
    ) -> Result<CommentListing, EngagementError> {
        if page == 0 {
            return Err(EngagementError::Validation(
                "page numbers start at 1".to_string(),
            ));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(EngagementError::Validation(format!(
                "page size must be within 1..={MAX_PAGE_SIZE}"
            )));
        }
        self.store
            .story(story_id)
            .await
            .map_err(cas::store_error)?
            .ok_or_else(|| EngagementError::NotFound(format!("story {story_id}")))?;

        let all = self
            .store
            .comments_for_story(story_id)
            .await
            .map_err(cas::store_error)?;

        let mut top: Vec<CommentEntity> = Vec::new();
        let mut replies_by_parent: HashMap<Uuid, Vec<CommentEntity>> = HashMap::new();
        for comment in all {
            if comment.status != CommentStatus::Active {
                continue;
            }
            match comment.parent_id {
                None => top.push(comment),
                Some(parent_id) => replies_by_parent
                    .entry(parent_id)
                    .or_default()
                    .push(comment),
            }
        }

        top.sort_by(|a, b| {
            b.is_pinned.cmp(&a.is_pinned).then_with(|| match sort {
                CommentSortKey::Newest => b.created_at.cmp(&a.created_at),
                CommentSortKey::Oldest => a.created_at.cmp(&b.created_at),
                CommentSortKey::MostLiked => b
                    .engagement
                    .likes_count
                    .cmp(&a.engagement.likes_count)
                    .then_with(|| b.created_at.cmp(&a.created_at)),
            })
        });

        let total = top.len() as u32;
        let start = (page as usize - 1) * page_size as usize;
        let threads = top
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .map(|comment| {
                let mut replies = replies_by_parent.remove(&comment.id).unwrap_or_default();
                replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                CommentThread { comment, replies }
            })
            .collect();

        Ok(CommentListing {
            threads,
            page,
            page_size,
            total,
        })
    }

    /// Remove a story and every comment referencing it. Author or admin.
    pub async fn delete_story(
        &self,
        story_id: Uuid,
        requester: Actor,
    ) -> Result<u64, EngagementError> {
        let story = self
            .store
            .story(story_id)
            .await
            .map_err(cas::store_error)?
            .ok_or_else(|| EngagementError::NotFound(format!("story {story_id}")))?;
        if requester.id != story.record.author_id && !requester.is_admin() {
            return Err(EngagementError::Forbidden(
                "only the story author or an admin can delete a story".to_string(),
            ));
        }

        self.store
            .remove_story(story_id)
            .await
            .map_err(cas::store_error)?;
        let removed = self
            .store
            .remove_comments_for_story(story_id)
            .await
            .map_err(cas::store_error)?;

        info!(%story_id, requester = %requester.id, comments_removed = removed, "Story deleted");
        Ok(removed)
    }

    fn validate_comment_content(&self, content: &str) -> Result<(), EngagementError> {
        let len = content.chars().count();
        if len < self.config.min_comment_len || len > self.config.max_comment_len {
            return Err(EngagementError::Validation(format!(
                "comment length {len} outside allowed range {}..={}",
                self.config.min_comment_len, self.config.max_comment_len
            )));
        }
        Ok(())
    }
}

/// Legal moderation edges for approve and hide. Delete is legal from any
/// non-deleted status and is handled by the cascade path; deleted comments
/// never reach this table.
fn fsm_edge(
    current: CommentStatus,
    action: ModerationAction,
) -> Result<CommentStatus, EngagementError> {
    match (current, action) {
        (CommentStatus::Flagged, ModerationAction::Approve)
        | (CommentStatus::Hidden, ModerationAction::Approve) => Ok(CommentStatus::Active),
        (CommentStatus::Active, ModerationAction::Hide)
        | (CommentStatus::Flagged, ModerationAction::Hide) => Ok(CommentStatus::Hidden),
        (_, ModerationAction::Delete) => Ok(CommentStatus::Deleted),
        (current, action) => Err(EngagementError::InvalidState(format!(
            "cannot {action} a {current} comment"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approve_reinstates_flagged_and_hidden() {
        assert!(matches!(
            fsm_edge(CommentStatus::Flagged, ModerationAction::Approve),
            Ok(CommentStatus::Active)
        ));
        assert!(matches!(
            fsm_edge(CommentStatus::Hidden, ModerationAction::Approve),
            Ok(CommentStatus::Active)
        ));
    }

    #[test]
    fn approve_of_active_is_illegal() {
        assert!(matches!(
            fsm_edge(CommentStatus::Active, ModerationAction::Approve),
            Err(EngagementError::InvalidState(_))
        ));
    }

    #[test]
    fn hide_of_hidden_is_illegal() {
        assert!(matches!(
            fsm_edge(CommentStatus::Hidden, ModerationAction::Hide),
            Err(EngagementError::InvalidState(_))
        ));
    }

    #[test]
    fn delete_is_legal_from_every_live_status() {
        for status in [
            CommentStatus::Active,
            CommentStatus::Flagged,
            CommentStatus::Hidden,
        ] {
            assert!(matches!(
                fsm_edge(status, ModerationAction::Delete),
                Ok(CommentStatus::Deleted)
            ));
        }
    }
}
