use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Actor Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Reader,
    Admin,
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorRole::Reader => write!(f, "reader"),
            ActorRole::Admin => write!(f, "admin"),
        }
    }
}

/// The acting identity supplied by the authorization provider.
/// The core checks roles and authorship facts; it never computes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn reader(id: Uuid) -> Self {
        Self {
            id,
            role: ActorRole::Reader,
        }
    }

    pub fn admin(id: Uuid) -> Self {
        Self {
            id,
            role: ActorRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}

// --- Story Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    Draft,
    Published,
}

impl std::fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoryStatus::Draft => write!(f, "draft"),
            StoryStatus::Published => write!(f, "published"),
        }
    }
}

/// One page of a multi-page story. Page numbers are contiguous from 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub page_number: u32,
    pub content: String,
    pub word_count: u32,
    pub reading_time_minutes: u32,
}

/// Denormalized story counters. Every count mirrors a backing set or map on
/// the aggregate and is re-derived inside the same atomic update that
/// mutates the set — never incremented on its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryStats {
    /// Whole-story views, bumped once per full-story fetch.
    pub views: u64,
    pub likes_count: u32,
    pub rating_count: u32,
    /// Mean of all submitted ratings; 0.0 while no ratings exist.
    pub average_rating: f64,
    /// Live (non-deleted) comments referencing this story.
    pub comment_count: u32,
    pub reading_list_count: u32,
    /// Ranking signal read by the discovery component. Persisted, never
    /// computed on the read path.
    pub engagement_score: f64,
    /// Per-page view counters, independent of whole-story `views`.
    pub page_views: BTreeMap<u32, u64>,
}

/// Per-reader position in a story.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub current_page: u32,
    pub completed: bool,
    pub last_read_at: Option<DateTime<Utc>>,
    pub time_spent_seconds: u64,
}

impl Default for ReadingProgress {
    fn default() -> Self {
        Self {
            current_page: 1,
            completed: false,
            last_read_at: None,
            time_spent_seconds: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryAggregate {
    pub id: Uuid,
    pub author_id: Uuid,
    /// Users with page-edit rights besides the author.
    pub collaborators: HashSet<Uuid>,
    pub status: StoryStatus,
    /// Set by editorial tooling, read by discovery. Never written here.
    pub is_featured: bool,
    pub pages: Vec<Page>,
    pub page_count: u32,
    pub total_word_count: u32,
    /// Sum of per-page reading times, in minutes.
    pub total_reading_time: u32,
    pub stats: StoryStats,
    pub liked_by: HashSet<Uuid>,
    pub in_reading_lists: HashSet<Uuid>,
    /// One rating per user, each in 1..=5.
    pub ratings: HashMap<Uuid, u8>,
    pub reading_progress: HashMap<Uuid, ReadingProgress>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoryAggregate {
    /// A fresh draft with its initial pages. Callers are expected to have
    /// validated page content bounds; totals are derived here.
    pub fn new(id: Uuid, author_id: Uuid, pages: Vec<Page>) -> Self {
        let now = Utc::now();
        let mut story = Self {
            id,
            author_id,
            collaborators: HashSet::new(),
            status: StoryStatus::Draft,
            is_featured: false,
            pages,
            page_count: 0,
            total_word_count: 0,
            total_reading_time: 0,
            stats: StoryStats::default(),
            liked_by: HashSet::new(),
            in_reading_lists: HashSet::new(),
            ratings: HashMap::new(),
            reading_progress: HashMap::new(),
            created_at: now,
            updated_at: now,
        };
        story.recompute_page_totals();
        story
    }

    /// Author or collaborator. Page mutations are gated on this.
    pub fn can_edit_pages(&self, user_id: Uuid) -> bool {
        self.author_id == user_id || self.collaborators.contains(&user_id)
    }

    /// Re-derive `page_count`, `total_word_count` and `total_reading_time`
    /// from the page sequence.
    pub fn recompute_page_totals(&mut self) {
        self.page_count = self.pages.len() as u32;
        self.total_word_count = self.pages.iter().map(|p| p.word_count).sum();
        self.total_reading_time = self.pages.iter().map(|p| p.reading_time_minutes).sum();
    }

    /// Re-derive `rating_count` and `average_rating` from the ratings map.
    pub fn recompute_rating_stats(&mut self) {
        self.stats.rating_count = self.ratings.len() as u32;
        self.stats.average_rating = if self.ratings.is_empty() {
            0.0
        } else {
            let total: u32 = self.ratings.values().map(|r| *r as u32).sum();
            total as f64 / self.ratings.len() as f64
        };
    }
}

// --- Comment Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    Active,
    Flagged,
    Hidden,
    Deleted,
}

impl std::fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommentStatus::Active => write!(f, "active"),
            CommentStatus::Flagged => write!(f, "flagged"),
            CommentStatus::Hidden => write!(f, "hidden"),
            CommentStatus::Deleted => write!(f, "deleted"),
        }
    }
}

/// Closed set of moderation verbs. Each arm carries its own FSM edges and
/// is dispatched by exhaustive match, not string comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Approve,
    Hide,
    Delete,
}

impl std::fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModerationAction::Approve => write!(f, "approve"),
            ModerationAction::Hide => write!(f, "hide"),
            ModerationAction::Delete => write!(f, "delete"),
        }
    }
}

/// A single user's report against a comment. At most one per reporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentReport {
    pub reporter_id: Uuid,
    pub reason: String,
    pub reported_at: DateTime<Utc>,
}

/// Pre-edit content snapshot. Edit history is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRevision {
    pub content: String,
    pub edited_at: DateTime<Utc>,
}

/// Denormalized comment counters, derived from their backing collections in
/// the same atomic step that mutates them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentEngagement {
    pub liked_by: HashSet<Uuid>,
    pub likes_count: u32,
    pub reported_by: Vec<CommentReport>,
    pub report_count: u32,
    /// Direct, non-deleted children.
    pub replies_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentEntity {
    pub id: Uuid,
    pub story_id: Uuid,
    pub author_id: Uuid,
    /// Present on replies. Replies nest at most one level deep.
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub status: CommentStatus,
    pub engagement: CommentEngagement,
    pub is_pinned: bool,
    pub pinned_by: Option<Uuid>,
    /// True when the report threshold flagged this comment, as opposed to
    /// an explicit moderator action.
    pub auto_flagged: bool,
    pub edit_history: Vec<CommentRevision>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommentEntity {
    pub fn new(story_id: Uuid, author_id: Uuid, content: String, parent_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            story_id,
            author_id,
            parent_id,
            content,
            status: CommentStatus::Active,
            engagement: CommentEngagement::default(),
            is_pinned: false,
            pinned_by: None,
            auto_flagged: false,
            edit_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Deleted is terminal. Tombstones stay in the store so repeat
    /// deletions and moderation of gone comments can answer NotFound.
    pub fn is_deleted(&self) -> bool {
        self.status == CommentStatus::Deleted
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

// --- Listing Types ---

/// Sort order for top-level comments. Pinned comments always sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommentSortKey {
    #[default]
    Newest,
    Oldest,
    MostLiked,
}

impl std::fmt::Display for CommentSortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommentSortKey::Newest => write!(f, "newest"),
            CommentSortKey::Oldest => write!(f, "oldest"),
            CommentSortKey::MostLiked => write!(f, "most_liked"),
        }
    }
}
