//! Shared fixtures for the engagement integration tests.
//!
//! Everything runs against the in-memory store: no network, no database,
//! no Docker. `cargo test` in seconds.

#![allow(dead_code)]

use std::sync::Arc;

use uuid::Uuid;

use storyloom_common::{CommentEntity, Config, Page, StoryAggregate, StoryStatus};
use storyloom_engagement::{
    CommentModerationEngine, EngagementCounterService, ReadingSessionTracker,
};
use storyloom_store::{ContentStore, MemoryStore};

/// Owns the store and the three services for the lifetime of a test.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub counters: EngagementCounterService,
    pub moderation: CommentModerationEngine,
    pub reading: ReadingSessionTracker,
    pub config: Config,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::new());
        let shared: Arc<dyn ContentStore> = store.clone();
        Self {
            counters: EngagementCounterService::new(shared.clone(), config.clone()),
            moderation: CommentModerationEngine::new(shared.clone(), config.clone()),
            reading: ReadingSessionTracker::new(shared, config.clone()),
            store,
            config,
        }
    }

    /// Seed a published story with one page per content slice.
    pub async fn seed_story(&self, author_id: Uuid, pages: &[&str]) -> Uuid {
        self.seed_story_with_status(author_id, pages, StoryStatus::Published)
            .await
    }

    /// Seed a draft story.
    pub async fn seed_draft(&self, author_id: Uuid, pages: &[&str]) -> Uuid {
        self.seed_story_with_status(author_id, pages, StoryStatus::Draft)
            .await
    }

    async fn seed_story_with_status(
        &self,
        author_id: Uuid,
        pages: &[&str],
        status: StoryStatus,
    ) -> Uuid {
        let pages = pages
            .iter()
            .enumerate()
            .map(|(idx, content)| page(idx as u32 + 1, content))
            .collect();
        let mut story = StoryAggregate::new(Uuid::new_v4(), author_id, pages);
        story.status = status;
        let id = story.id;
        self.store.insert_story(story).await.unwrap();
        id
    }

    /// Grant a collaborator page-edit rights on a seeded story.
    pub async fn add_collaborator(&self, story_id: Uuid, user_id: Uuid) {
        let versioned = self.store.story(story_id).await.unwrap().unwrap();
        let mut story = versioned.record;
        story.collaborators.insert(user_id);
        self.store
            .update_story(story, versioned.version)
            .await
            .unwrap();
    }

    /// Current story state, for assertions.
    pub async fn story(&self, id: Uuid) -> StoryAggregate {
        self.store.story(id).await.unwrap().unwrap().record
    }

    /// Current comment state, tombstones included.
    pub async fn comment(&self, id: Uuid) -> CommentEntity {
        self.store.comment(id).await.unwrap().unwrap().record
    }
}

/// A page with derived word count and reading time, bypassing the service
/// bounds checks so fixtures can control the exact shape.
pub fn page(page_number: u32, content: &str) -> Page {
    let words = content.split_whitespace().count() as u32;
    Page {
        page_number,
        content: content.to_string(),
        word_count: words,
        reading_time_minutes: words.div_ceil(200),
    }
}

/// `words` repeated filler words, comfortably above the page minimum for
/// word counts of twenty or more.
pub fn filler(words: usize) -> String {
    vec!["lorem"; words].join(" ")
}

/// Honor RUST_LOG in test runs; repeated calls are a no-op.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
