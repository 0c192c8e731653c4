//! ContentStore — the storage boundary for story and comment aggregates.
//!
//! One guarantee matters here: conditional writes. Reads return the record
//! with a version; writes take the version from the matching read and fail
//! with `VersionConflict` when a concurrent writer got there first. The
//! services re-read and retry, bounded. Counters are therefore only ever
//! derived inside one read-modify-write step, never incremented blind.
//!
//! This trait enables deterministic testing with `MemoryStore`: no network,
//! no database, no Docker. `cargo test` in seconds.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use storyloom_common::{CommentEntity, StoryAggregate};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    #[error("record already exists: {0}")]
    AlreadyExists(Uuid),

    #[error("record not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// A record paired with the version its read observed.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub record: T,
    pub version: u64,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    // --- Stories ---

    /// Insert a new story. Fails `AlreadyExists` on id collision.
    async fn insert_story(&self, story: StoryAggregate) -> Result<(), StoreError>;

    /// Read a story with its current version.
    async fn story(&self, id: Uuid) -> Result<Option<Versioned<StoryAggregate>>, StoreError>;

    /// Conditionally replace a story. Returns the new version on success,
    /// `VersionConflict` when `expected_version` is stale.
    async fn update_story(
        &self,
        story: StoryAggregate,
        expected_version: u64,
    ) -> Result<u64, StoreError>;

    /// Remove a story record. Fails `NotFound` when absent.
    async fn remove_story(&self, id: Uuid) -> Result<(), StoreError>;

    // --- Comments ---

    /// Insert a new comment and index it under its story and parent.
    async fn insert_comment(&self, comment: CommentEntity) -> Result<(), StoreError>;

    /// Read a comment with its current version. Tombstoned (deleted)
    /// comments are still returned; callers filter by status.
    async fn comment(&self, id: Uuid) -> Result<Option<Versioned<CommentEntity>>, StoreError>;

    /// Conditionally replace a comment. Same contract as `update_story`.
    async fn update_comment(
        &self,
        comment: CommentEntity,
        expected_version: u64,
    ) -> Result<u64, StoreError>;

    // --- Indexes ---

    /// All comments referencing a story, in creation order. Includes
    /// tombstones.
    async fn comments_for_story(&self, story_id: Uuid) -> Result<Vec<CommentEntity>, StoreError>;

    /// Direct child ids of a comment, in creation order. The cascade walks
    /// this index iteratively instead of chasing pointers.
    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<Uuid>, StoreError>;

    /// Hard-remove every comment record referencing a story. Used by story
    /// deletion. Returns the number of records removed.
    async fn remove_comments_for_story(&self, story_id: Uuid) -> Result<u64, StoreError>;
}
