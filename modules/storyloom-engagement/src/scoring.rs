//! Engagement scoring: a pure function from story counters to the single
//! ranking signal read by the discovery surface.
//!
//! The score is recomputed synchronously after any mutation to views,
//! likes, comment count, or the rating set, and persisted in
//! `stats.engagement_score`. The read path never computes it.

use storyloom_common::{ScoreWeights, StoryAggregate, StoryStats};

/// Weighted sum of the story's counters.
pub fn engagement_score(stats: &StoryStats, weights: &ScoreWeights) -> f64 {
    stats.views as f64 * weights.views
        + stats.likes_count as f64 * weights.likes
        + stats.comment_count as f64 * weights.comments
        + stats.rating_count as f64 * weights.ratings
        + stats.average_rating * weights.average_rating
}

/// Recompute and persist the score on the aggregate being mutated.
pub(crate) fn refresh(story: &mut StoryAggregate, weights: &ScoreWeights) {
    story.stats.engagement_score = engagement_score(&story.stats, weights);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_match_documented_formula() {
        let stats = StoryStats {
            views: 2,
            likes_count: 3,
            comment_count: 4,
            rating_count: 2,
            average_rating: 4.0,
            ..StoryStats::default()
        };
        // 2*1 + 3*5 + 4*3 + 2*2 + 4.0*10
        let score = engagement_score(&stats, &ScoreWeights::default());
        assert!((score - 73.0).abs() < 1e-10);
    }

    #[test]
    fn empty_story_scores_zero() {
        let score = engagement_score(&StoryStats::default(), &ScoreWeights::default());
        assert!((score - 0.0).abs() < 1e-10);
    }

    #[test]
    fn weights_are_pluggable() {
        let stats = StoryStats {
            views: 10,
            likes_count: 7,
            ..StoryStats::default()
        };
        let views_only = ScoreWeights {
            views: 1.0,
            likes: 0.0,
            comments: 0.0,
            ratings: 0.0,
            average_rating: 0.0,
        };
        assert!((engagement_score(&stats, &views_only) - 10.0).abs() < 1e-10);
    }

    #[test]
    fn refresh_persists_into_stats() {
        let mut story = StoryAggregate::new(uuid::Uuid::new_v4(), uuid::Uuid::new_v4(), vec![]);
        story.stats.views = 5;
        refresh(&mut story, &ScoreWeights::default());
        assert!((story.stats.engagement_score - 5.0).abs() < 1e-10);
    }
}
