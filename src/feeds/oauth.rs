//! OAuth 1.0a request signing (HMAC-SHA1) and the PIN-based linking flow.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha1::Sha1;
use tracing::{debug, info};

use crate::error::{ApiError, Error, Result};
use crate::settings::Credentials;

type HmacSha1 = Hmac<Sha1>;

#[derive(Clone)]
pub struct Consumer {
    pub key: String,
    pub secret: String,
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer").field("key", &self.key).finish()
    }
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Per-request values that vary between calls.
#[derive(Debug, Clone)]
pub struct Nonce {
    pub nonce: String,
    pub timestamp: u64,
}

impl Nonce {
    pub fn fresh() -> Self {
        let nonce = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        Self { nonce, timestamp }
    }
}

#[derive(Debug, Clone)]
pub struct Signer {
    consumer: Consumer,
    token: Option<Credentials>,
}

impl Signer {
    pub fn new(consumer: Consumer, token: Option<Credentials>) -> Self {
        Self { consumer, token }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn oauth_params(&self, nonce: &Nonce, extra: &[(String, String)]) -> Vec<(String, String)> {
        let mut params = vec![
            ("oauth_consumer_key".to_string(), self.consumer.key.clone()),
            ("oauth_nonce".to_string(), nonce.nonce.clone()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), nonce.timestamp.to_string()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];
        if let Some(token) = &self.token {
            params.push(("oauth_token".to_string(), token.token.clone()));
        }
        params.extend(extra.iter().cloned());
        params
    }

    /// `METHOD&url&params` with every parameter percent-encoded and sorted.
    pub fn base_string(
        method: &str,
        url: &str,
        params: &[(String, String)],
    ) -> String {
        let mut encoded: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (encode(k), encode(v)))
            .collect();
        encoded.sort();
        let joined = encoded
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        format!(
            "{}&{}&{}",
            method.to_ascii_uppercase(),
            encode(url),
            encode(&joined)
        )
    }

    fn sign(&self, base: &str) -> String {
        let token_secret = self.token.as_ref().map(|t| t.secret.as_str()).unwrap_or("");
        let key = format!("{}&{}", encode(&self.consumer.secret), encode(token_secret));
        let mut mac = match HmacSha1::new_from_slice(key.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC accepts keys of any length"),
        };
        mac.update(base.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    /// Value for the `Authorization` header.
    ///
    /// `query` holds the request's query or form parameters; `oauth_extra`
    /// holds additional `oauth_*` protocol parameters such as
    /// `oauth_callback` or `oauth_verifier`.
    pub fn authorization(
        &self,
        method: &str,
        url: &str,
        query: &[(String, String)],
        oauth_extra: &[(String, String)],
        nonce: &Nonce,
    ) -> String {
        let oauth = self.oauth_params(nonce, oauth_extra);
        let mut all = oauth.clone();
        all.extend(query.iter().cloned());
        let signature = self.sign(&Self::base_string(method, url, &all));

        let mut header: Vec<String> = oauth
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect();
        header.push(format!("oauth_signature=\"{}\"", encode(&signature)));
        format!("OAuth {}", header.join(", "))
    }
}

/// Result of a successful link.
#[derive(Debug, Clone)]
pub struct LinkedAccount {
    pub credentials: Credentials,
    pub user_id: String,
    pub screen_name: String,
}

#[derive(Debug, Clone)]
pub struct RequestToken {
    pub token: String,
    pub secret: String,
}

fn parse_form(body: &str) -> Vec<(String, String)> {
    body.trim()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| {
            let value = urlencoding::decode(v)
                .map(|c| c.into_owned())
                .unwrap_or_else(|_| v.to_string());
            (k.to_string(), value)
        })
        .collect()
}

fn form_value(pairs: &[(String, String)], key: &str) -> Option<String> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
}

/// Drives the out-of-band (PIN) authorization against `https://<host>/oauth/*`.
pub struct Linker {
    client: reqwest::Client,
    base_url: String,
    consumer: Consumer,
}

impl Linker {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, consumer: Consumer) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            consumer,
        }
    }

    async fn post_signed(
        &self,
        path: &str,
        signer: &Signer,
        oauth_extra: &[(String, String)],
    ) -> Result<Vec<(String, String)>> {
        let url = format!("{}{}", self.base_url, path);
        let auth = signer.authorization("POST", &url, &[], oauth_extra, &Nonce::fresh());
        let response = self
            .client
            .post(&url)
            .header("Authorization", auth)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::ApiRejected(vec![ApiError {
                message: format!("{} {}", status, body.trim()),
                code: i64::from(status.as_u16()),
            }]));
        }
        Ok(parse_form(&body))
    }

    pub async fn request_token(&self) -> Result<RequestToken> {
        let signer = Signer::new(self.consumer.clone(), None);
        let extra = [("oauth_callback".to_string(), "oob".to_string())];
        let pairs = self.post_signed("/oauth/request_token", &signer, &extra).await?;
        let token = form_value(&pairs, "oauth_token");
        let secret = form_value(&pairs, "oauth_token_secret");
        match (token, secret) {
            (Some(token), Some(secret)) => {
                debug!("received request token");
                Ok(RequestToken { token, secret })
            }
            _ => Err(Error::AuthMissing),
        }
    }

    pub fn authorize_url(&self, request: &RequestToken) -> String {
        format!(
            "{}/oauth/authorize?oauth_token={}",
            self.base_url,
            encode(&request.token)
        )
    }

    pub async fn access_token(&self, request: &RequestToken, pin: &str) -> Result<LinkedAccount> {
        let signer = Signer::new(
            self.consumer.clone(),
            Some(Credentials {
                token: request.token.clone(),
                secret: request.secret.clone(),
            }),
        );
        let extra = [("oauth_verifier".to_string(), pin.trim().to_string())];
        let pairs = self.post_signed("/oauth/access_token", &signer, &extra).await?;

        let token = form_value(&pairs, "oauth_token").ok_or(Error::AuthMissing)?;
        let secret = form_value(&pairs, "oauth_token_secret").ok_or(Error::AuthMissing)?;
        let account = LinkedAccount {
            credentials: Credentials { token, secret },
            user_id: form_value(&pairs, "user_id").unwrap_or_default(),
            screen_name: form_value(&pairs, "screen_name").unwrap_or_default(),
        };
        info!(user_id = %account.user_id, screen_name = %account.screen_name, "linked account");
        Ok(account)
    }
}
