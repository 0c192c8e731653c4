//! In-memory ContentStore implementation for testing and development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use storyloom_common::{CommentEntity, StoryAggregate};

use crate::store::{ContentStore, StoreError, Versioned};

#[derive(Default)]
struct Inner {
    stories: HashMap<Uuid, Versioned<StoryAggregate>>,
    comments: HashMap<Uuid, Versioned<CommentEntity>>,
    /// story id → comment ids, creation order.
    story_comments: HashMap<Uuid, Vec<Uuid>>,
    /// parent comment id → direct child ids, creation order.
    children: HashMap<Uuid, Vec<Uuid>>,
}

/// In-memory store with per-record versions. Not suitable for production:
/// data is lost on restart and the whole store sits behind one lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored stories.
    pub fn story_count(&self) -> usize {
        self.inner.read().unwrap().stories.len()
    }

    /// Number of stored comment records, tombstones included.
    pub fn comment_count(&self) -> usize {
        self.inner.read().unwrap().comments.len()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn insert_story(&self, story: StoryAggregate) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if inner.stories.contains_key(&story.id) {
            return Err(StoreError::AlreadyExists(story.id));
        }
        let id = story.id;
        inner.stories.insert(
            id,
            Versioned {
                record: story,
                version: 1,
            },
        );
        Ok(())
    }

    async fn story(&self, id: Uuid) -> Result<Option<Versioned<StoryAggregate>>, StoreError> {
        Ok(self.inner.read().unwrap().stories.get(&id).cloned())
    }

    async fn update_story(
        &self,
        story: StoryAggregate,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let slot = inner
            .stories
            .get_mut(&story.id)
            .ok_or(StoreError::NotFound(story.id))?;
        if slot.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                found: slot.version,
            });
        }
        slot.record = story;
        slot.version += 1;
        Ok(slot.version)
    }

    async fn remove_story(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner
            .stories
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn insert_comment(&self, comment: CommentEntity) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if inner.comments.contains_key(&comment.id) {
            return Err(StoreError::AlreadyExists(comment.id));
        }
        let id = comment.id;
        inner
            .story_comments
            .entry(comment.story_id)
            .or_default()
            .push(id);
        if let Some(parent_id) = comment.parent_id {
            inner.children.entry(parent_id).or_default().push(id);
        }
        inner.comments.insert(
            id,
            Versioned {
                record: comment,
                version: 1,
            },
        );
        Ok(())
    }

    async fn comment(&self, id: Uuid) -> Result<Option<Versioned<CommentEntity>>, StoreError> {
        Ok(self.inner.read().unwrap().comments.get(&id).cloned())
    }

    async fn update_comment(
        &self,
        comment: CommentEntity,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let slot = inner
            .comments
            .get_mut(&comment.id)
            .ok_or(StoreError::NotFound(comment.id))?;
        if slot.version != expected_version {
            return Err(StoreError::VersionConflict {
                expected: expected_version,
                found: slot.version,
            });
        }
        slot.record = comment;
        slot.version += 1;
        Ok(slot.version)
    }

    async fn comments_for_story(&self, story_id: Uuid) -> Result<Vec<CommentEntity>, StoreError> {
        let inner = self.inner.read().unwrap();
        let ids = inner.story_comments.get(&story_id);
        Ok(ids
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.comments.get(id).map(|v| v.record.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .children
            .get(&parent_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_comments_for_story(&self, story_id: Uuid) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().unwrap();
        let ids = inner.story_comments.remove(&story_id).unwrap_or_default();
        let mut removed = 0;
        for id in &ids {
            if inner.comments.remove(id).is_some() {
                removed += 1;
            }
            inner.children.remove(id);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyloom_common::Page;

    fn story_with_one_page() -> StoryAggregate {
        StoryAggregate::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![Page {
                page_number: 1,
                content: "Once upon a time.".to_string(),
                word_count: 4,
                reading_time_minutes: 1,
            }],
        )
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = MemoryStore::new();
        let story = story_with_one_page();
        let id = story.id;
        store.insert_story(story).await.unwrap();

        let first = store.story(id).await.unwrap().unwrap();
        let second = store.story(id).await.unwrap().unwrap();

        store
            .update_story(first.record.clone(), first.version)
            .await
            .unwrap();
        let err = store
            .update_story(second.record, second.version)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn child_index_follows_insertion_order() {
        let store = MemoryStore::new();
        let story = story_with_one_page();
        let story_id = story.id;
        store.insert_story(story).await.unwrap();

        let parent = CommentEntity::new(story_id, Uuid::new_v4(), "top".into(), None);
        let parent_id = parent.id;
        store.insert_comment(parent).await.unwrap();

        let mut reply_ids = Vec::new();
        for text in ["first", "second"] {
            let reply =
                CommentEntity::new(story_id, Uuid::new_v4(), text.to_string(), Some(parent_id));
            reply_ids.push(reply.id);
            store.insert_comment(reply).await.unwrap();
        }

        assert_eq!(store.children_of(parent_id).await.unwrap(), reply_ids);
        assert_eq!(store.comments_for_story(story_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn story_comment_teardown_removes_records() {
        let store = MemoryStore::new();
        let story = story_with_one_page();
        let story_id = story.id;
        store.insert_story(story).await.unwrap();

        for _ in 0..3 {
            store
                .insert_comment(CommentEntity::new(
                    story_id,
                    Uuid::new_v4(),
                    "hello".into(),
                    None,
                ))
                .await
                .unwrap();
        }

        assert_eq!(
            store.remove_comments_for_story(story_id).await.unwrap(),
            3
        );
        assert_eq!(store.comment_count(), 0);
    }
}
