use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use super::oauth::{Nonce, Signer};
use super::{FetchCursor, TimelineFetcher};
use crate::error::{ApiError, Error, Result};
use crate::post::Post;

const HOME_TIMELINE_PATH: &str = "/1.1/statuses/home_timeline.json";

pub struct HomeTimelineFetcher {
    base_url: String,
    signer: Signer,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ApiError>,
}

/// `https://<host>` for a bare host, the value itself when it already has a
/// scheme.
pub fn base_url(api_host: &str) -> String {
    let host = api_host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

pub fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(20))
        .user_agent(concat!("swipetui/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

impl HomeTimelineFetcher {
    pub fn new(client: reqwest::Client, api_host: &str, signer: Signer) -> Self {
        Self {
            base_url: base_url(api_host),
            signer,
            client,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, HOME_TIMELINE_PATH)
    }
}

/// Turns a response into posts or the matching error kind.
pub fn decode_timeline(status: StatusCode, body: &str) -> Result<Vec<Post>> {
    if !status.is_success() {
        let errors = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.errors)
            .unwrap_or_default();
        if errors.is_empty() {
            return Err(Error::ApiRejected(vec![ApiError {
                message: status.to_string(),
                code: i64::from(status.as_u16()),
            }]));
        }
        return Err(Error::ApiRejected(errors));
    }

    // Some error payloads arrive with a 200.
    if let Ok(ErrorBody { errors }) = serde_json::from_str::<ErrorBody>(body) {
        if !errors.is_empty() {
            return Err(Error::ApiRejected(errors));
        }
    }

    serde_json::from_str::<Vec<Post>>(body).map_err(|e| Error::decode("home timeline", e))
}

#[async_trait]
impl TimelineFetcher for HomeTimelineFetcher {
    fn is_linked(&self) -> bool {
        self.signer.has_token()
    }

    async fn fetch(&self, cursor: FetchCursor) -> Result<Vec<Post>> {
        if !self.is_linked() {
            return Err(Error::AuthMissing);
        }

        let url = self.endpoint();
        let query = cursor.query_pairs();
        let auth = self
            .signer
            .authorization("GET", &url, &query, &[], &Nonce::fresh());

        debug!(?cursor, "requesting home timeline");
        let response = self
            .client
            .get(&url)
            .query(&query)
            .header("Authorization", auth)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let posts = decode_timeline(status, &body)?;
        info!(count = posts.len(), ?cursor, "fetched home timeline");
        Ok(posts)
    }
}
