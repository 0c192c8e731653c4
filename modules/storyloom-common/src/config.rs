use std::env;

use serde::{Deserialize, Serialize};

/// Weights for the engagement score. The formula is configuration so ranking
/// can be tuned without touching the services that trigger a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub views: f64,
    pub likes: f64,
    pub comments: f64,
    pub ratings: f64,
    pub average_rating: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            views: 1.0,
            likes: 5.0,
            comments: 3.0,
            ratings: 2.0,
            average_rating: 10.0,
        }
    }
}

/// Reports from distinct users before an active comment auto-flags.
pub const DEFAULT_REPORT_FLAG_THRESHOLD: u32 = 3;

/// Bound on optimistic read-modify-write attempts per operation.
pub const DEFAULT_MAX_CAS_ATTEMPTS: u32 = 3;

/// Engagement core configuration. Content bounds, the auto-flag threshold
/// and the optimistic-retry policy.
#[derive(Debug, Clone)]
pub struct Config {
    pub min_page_content_len: usize,
    pub max_page_content_len: usize,
    pub min_comment_len: usize,
    pub max_comment_len: usize,
    pub report_flag_threshold: u32,
    pub max_cas_attempts: u32,
    /// Base backoff between retry attempts, scaled linearly per attempt.
    pub cas_backoff_ms: u64,
    pub score_weights: ScoreWeights,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_page_content_len: 100,
            max_page_content_len: 50_000,
            min_comment_len: 1,
            max_comment_len: 5_000,
            report_flag_threshold: DEFAULT_REPORT_FLAG_THRESHOLD,
            max_cas_attempts: DEFAULT_MAX_CAS_ATTEMPTS,
            cas_backoff_ms: 10,
            score_weights: ScoreWeights::default(),
        }
    }
}

impl Config {
    /// Load configuration from `STORYLOOM_*` environment variables, falling
    /// back to defaults. Panics with a clear message on unparseable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_page_content_len: numeric_env(
                "STORYLOOM_MIN_PAGE_CONTENT_LEN",
                defaults.min_page_content_len,
            ),
            max_page_content_len: numeric_env(
                "STORYLOOM_MAX_PAGE_CONTENT_LEN",
                defaults.max_page_content_len,
            ),
            min_comment_len: numeric_env("STORYLOOM_MIN_COMMENT_LEN", defaults.min_comment_len),
            max_comment_len: numeric_env("STORYLOOM_MAX_COMMENT_LEN", defaults.max_comment_len),
            report_flag_threshold: numeric_env(
                "STORYLOOM_REPORT_FLAG_THRESHOLD",
                defaults.report_flag_threshold,
            ),
            max_cas_attempts: numeric_env("STORYLOOM_MAX_CAS_ATTEMPTS", defaults.max_cas_attempts),
            cas_backoff_ms: numeric_env("STORYLOOM_CAS_BACKOFF_MS", defaults.cas_backoff_ms),
            score_weights: ScoreWeights {
                views: numeric_env("STORYLOOM_SCORE_W_VIEWS", defaults.score_weights.views),
                likes: numeric_env("STORYLOOM_SCORE_W_LIKES", defaults.score_weights.likes),
                comments: numeric_env(
                    "STORYLOOM_SCORE_W_COMMENTS",
                    defaults.score_weights.comments,
                ),
                ratings: numeric_env("STORYLOOM_SCORE_W_RATINGS", defaults.score_weights.ratings),
                average_rating: numeric_env(
                    "STORYLOOM_SCORE_W_AVG_RATING",
                    defaults.score_weights.average_rating,
                ),
            },
        }
    }
}

fn numeric_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number")),
        Err(_) => default,
    }
}
