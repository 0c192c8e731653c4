//! Reading sessions: page CRUD with contiguous numbering, per-page view
//! counters, and per-reader progress records.
//!
//! Page numbers stay contiguous from 1 through every insert and delete;
//! per-page view counters and reader positions are shifted alongside so
//! they keep pointing at the same content.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use storyloom_common::{Actor, Config, EngagementError, Page, ReadingProgress, StoryStatus};
use storyloom_store::ContentStore;

use crate::{cas, scoring};

/// Words per minute assumed for reading-time estimates.
pub const READING_WORDS_PER_MINUTE: u32 = 200;

/// Whitespace-token word count.
fn word_count(content: &str) -> u32 {
    content.split_whitespace().count() as u32
}

/// Estimated minutes to read `words`, rounded up.
fn reading_time_minutes(words: u32) -> u32 {
    words.div_ceil(READING_WORDS_PER_MINUTE)
}

fn build_page(page_number: u32, content: &str) -> Page {
    let words = word_count(content);
    Page {
        page_number,
        content: content.to_string(),
        word_count: words,
        reading_time_minutes: reading_time_minutes(words),
    }
}

fn renumber(pages: &mut [Page]) {
    for (idx, page) in pages.iter_mut().enumerate() {
        page.page_number = idx as u32 + 1;
    }
}

/// Shift per-page view counters at and above `from` up one slot.
fn shift_page_views_up(views: &mut BTreeMap<u32, u64>, from: u32) {
    let shifted: Vec<(u32, u64)> = views
        .split_off(&from)
        .into_iter()
        .map(|(n, c)| (n + 1, c))
        .collect();
    views.extend(shifted);
}

/// Drop the removed page's counter and close the gap above it.
fn shift_page_views_down(views: &mut BTreeMap<u32, u64>, removed: u32) {
    views.remove(&removed);
    let shifted: Vec<(u32, u64)> = views
        .split_off(&removed)
        .into_iter()
        .map(|(n, c)| (n - 1, c))
        .collect();
    views.extend(shifted);
}

/// A page plus its navigation flags.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub page_number: u32,
    pub content: String,
    pub word_count: u32,
    pub reading_time_minutes: u32,
    pub has_previous: bool,
    pub has_next: bool,
}

pub struct ReadingSessionTracker {
    store: Arc<dyn ContentStore>,
    config: Config,
}

impl ReadingSessionTracker {
    pub fn new(store: Arc<dyn ContentStore>, config: Config) -> Self {
        Self { store, config }
    }

    /// Append a page, or insert at `position` shifting later pages up.
    pub async fn add_page(
        &self,
        story_id: Uuid,
        actor_id: Uuid,
        content: &str,
        position: Option<u32>,
    ) -> Result<Page, EngagementError> {
        self.validate_page_content(content)?;
        let page = cas::update_story(
            self.store.as_ref(),
            &self.config,
            story_id,
            "add_page",
            |story| {
                if !story.can_edit_pages(actor_id) {
                    return Err(EngagementError::Forbidden(
                        "page edits require story authorship or collaborator rights".to_string(),
                    ));
                }
                let next = story.pages.len() as u32 + 1;
                let number = position.unwrap_or(next);
                if number == 0 || number > next {
                    return Err(EngagementError::Validation(format!(
                        "page position {number} outside 1..={next}"
                    )));
                }
                let page = build_page(number, content);
                story.pages.insert((number - 1) as usize, page.clone());
                renumber(&mut story.pages);
                if number < next {
                    shift_page_views_up(&mut story.stats.page_views, number);
                }
                story.recompute_page_totals();
                story.updated_at = Utc::now();
                Ok(page)
            },
        )
        .await?;

        info!(
            %story_id, %actor_id,
            page = page.page_number,
            words = page.word_count,
            "Page added"
        );
        Ok(page)
    }

    /// Replace a page's content and re-derive its word count and reading
    /// time, plus the story totals.
    pub async fn update_page(
        &self,
        story_id: Uuid,
        actor_id: Uuid,
        page_number: u32,
        new_content: &str,
    ) -> Result<Page, EngagementError> {
        self.validate_page_content(new_content)?;
        let page = cas::update_story(
            self.store.as_ref(),
            &self.config,
            story_id,
            "update_page",
            |story| {
                if !story.can_edit_pages(actor_id) {
                    return Err(EngagementError::Forbidden(
                        "page edits require story authorship or collaborator rights".to_string(),
                    ));
                }
                let Some(idx) = story
                    .pages
                    .iter()
                    .position(|p| p.page_number == page_number)
                else {
                    return Err(EngagementError::NotFound(format!(
                        "page {page_number} of story {story_id}"
                    )));
                };
                let page = build_page(page_number, new_content);
                story.pages[idx] = page.clone();
                story.recompute_page_totals();
                story.updated_at = Utc::now();
                Ok(page)
            },
        )
        .await?;

        info!(%story_id, %actor_id, page = page_number, words = page.word_count, "Page updated");
        Ok(page)
    }

    /// Remove a page and renumber the rest contiguous from 1. A story keeps
    /// at least one page.
    pub async fn delete_page(
        &self,
        story_id: Uuid,
        actor_id: Uuid,
        page_number: u32,
    ) -> Result<(), EngagementError> {
        cas::update_story(
            self.store.as_ref(),
            &self.config,
            story_id,
            "delete_page",
            |story| {
                if !story.can_edit_pages(actor_id) {
                    return Err(EngagementError::Forbidden(
                        "page edits require story authorship or collaborator rights".to_string(),
                    ));
                }
                let Some(idx) = story
                    .pages
                    .iter()
                    .position(|p| p.page_number == page_number)
                else {
                    return Err(EngagementError::NotFound(format!(
                        "page {page_number} of story {story_id}"
                    )));
                };
                if story.pages.len() == 1 {
                    return Err(EngagementError::Validation(
                        "a story must keep at least one page".to_string(),
                    ));
                }
                story.pages.remove(idx);
                renumber(&mut story.pages);
                shift_page_views_down(&mut story.stats.page_views, page_number);
                story.recompute_page_totals();
                let count = story.page_count;
                for progress in story.reading_progress.values_mut() {
                    if progress.current_page > count {
                        progress.current_page = count;
                    }
                }
                story.updated_at = Utc::now();
                Ok(())
            },
        )
        .await?;

        info!(%story_id, %actor_id, page = page_number, "Page deleted");
        Ok(())
    }

    /// Fetch a page with navigation flags and record the page view.
    /// Unpublished stories are visible to their author and collaborators
    /// only.
    pub async fn get_page(
        &self,
        story_id: Uuid,
        page_number: u32,
        actor: Option<Actor>,
    ) -> Result<PageContent, EngagementError> {
        let story = self
            .store
            .story(story_id)
            .await
            .map_err(cas::store_error)?
            .ok_or_else(|| EngagementError::NotFound(format!("story {story_id}")))?
            .record;

        if story.status != StoryStatus::Published {
            let allowed = actor.map(|a| story.can_edit_pages(a.id)).unwrap_or(false);
            if !allowed {
                return Err(EngagementError::Forbidden(
                    "unpublished stories are only visible to their authors and collaborators"
                        .to_string(),
                ));
            }
        }

        let page = story
            .pages
            .iter()
            .find(|p| p.page_number == page_number)
            .ok_or_else(|| {
                EngagementError::NotFound(format!("page {page_number} of story {story_id}"))
            })?;

        let content = PageContent {
            page_number: page.page_number,
            content: page.content.clone(),
            word_count: page.word_count,
            reading_time_minutes: page.reading_time_minutes,
            has_previous: page_number > 1,
            has_next: page_number < story.page_count,
        };

        self.track_page_view(story_id, page_number).await?;
        Ok(content)
    }

    /// Bump the per-page view counter. Independent of whole-story views.
    pub async fn track_page_view(
        &self,
        story_id: Uuid,
        page_number: u32,
    ) -> Result<u64, EngagementError> {
        let views = cas::update_story(
            self.store.as_ref(),
            &self.config,
            story_id,
            "track_page_view",
            |story| {
                if !story.pages.iter().any(|p| p.page_number == page_number) {
                    return Err(EngagementError::NotFound(format!(
                        "page {page_number} of story {story_id}"
                    )));
                }
                let entry = story.stats.page_views.entry(page_number).or_insert(0);
                *entry += 1;
                Ok(*entry)
            },
        )
        .await?;

        debug!(%story_id, page = page_number, views, "Page view recorded");
        Ok(views)
    }

    /// Bump the whole-story view counter, invoked once per full-story
    /// fetch, and refresh the engagement score.
    pub async fn record_story_view(&self, story_id: Uuid) -> Result<u64, EngagementError> {
        let weights = self.config.score_weights;
        let views = cas::update_story(
            self.store.as_ref(),
            &self.config,
            story_id,
            "record_story_view",
            |story| {
                story.stats.views += 1;
                scoring::refresh(story, &weights);
                Ok(story.stats.views)
            },
        )
        .await?;

        debug!(%story_id, views, "Story view recorded");
        Ok(views)
    }

    /// Upsert the reader's progress record. Time spent accumulates and
    /// never decreases; reaching the last page marks the story completed.
    pub async fn update_reading_progress(
        &self,
        story_id: Uuid,
        user_id: Uuid,
        current_page: u32,
        time_spent_delta_seconds: u64,
    ) -> Result<ReadingProgress, EngagementError> {
        let progress = cas::update_story(
            self.store.as_ref(),
            &self.config,
            story_id,
            "update_reading_progress",
            |story| {
                let count = story.page_count;
                if current_page == 0 || current_page > count {
                    return Err(EngagementError::Validation(format!(
                        "current page {current_page} outside 1..={count}"
                    )));
                }
                let entry = story.reading_progress.entry(user_id).or_default();
                entry.current_page = current_page;
                entry.time_spent_seconds += time_spent_delta_seconds;
                entry.last_read_at = Some(Utc::now());
                if current_page == count {
                    entry.completed = true;
                }
                Ok(*entry)
            },
        )
        .await?;

        debug!(
            %story_id, %user_id,
            page = progress.current_page,
            completed = progress.completed,
            seconds = progress.time_spent_seconds,
            "Reading progress updated"
        );
        Ok(progress)
    }

    /// The reader's stored progress, or the page-one default.
    pub async fn get_reading_progress(
        &self,
        story_id: Uuid,
        user_id: Uuid,
    ) -> Result<ReadingProgress, EngagementError> {
        let story = self
            .store
            .story(story_id)
            .await
            .map_err(cas::store_error)?
            .ok_or_else(|| EngagementError::NotFound(format!("story {story_id}")))?;
        Ok(story
            .record
            .reading_progress
            .get(&user_id)
            .copied()
            .unwrap_or_default())
    }

    fn validate_page_content(&self, content: &str) -> Result<(), EngagementError> {
        let len = content.chars().count();
        if len < self.config.min_page_content_len || len > self.config.max_page_content_len {
            return Err(EngagementError::Validation(format!(
                "page content length {len} outside allowed range {}..={}",
                self.config.min_page_content_len, self.config.max_page_content_len
            )));
        }
        Ok(())
    }
}
