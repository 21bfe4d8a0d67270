pub mod home_timeline;
pub mod oauth;

use async_trait::async_trait;

use crate::error::Result;
use crate::post::Post;

pub use home_timeline::HomeTimelineFetcher;

/// Page size requested when nothing is known yet.
pub const INITIAL_COUNT: u32 = 200;

/// Which slice of the home timeline to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchCursor {
    SinceId(i64),
    Latest { count: u32 },
}

impl FetchCursor {
    /// `since_id` when an id is known, otherwise the initial page.
    pub fn from_most_recent(most_recent_id: i64) -> Self {
        if most_recent_id > 0 {
            FetchCursor::SinceId(most_recent_id)
        } else {
            FetchCursor::Latest {
                count: INITIAL_COUNT,
            }
        }
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        match self {
            FetchCursor::SinceId(id) => vec![("since_id".to_string(), id.to_string())],
            FetchCursor::Latest { count } => vec![("count".to_string(), count.to_string())],
        }
    }
}

#[async_trait]
pub trait TimelineFetcher: Send + Sync {
    /// Whether an access token is available.
    fn is_linked(&self) -> bool;

    async fn fetch(&self, cursor: FetchCursor) -> Result<Vec<Post>>;
}
