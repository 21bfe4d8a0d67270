//! Window state and linked-account settings, persisted as TOML.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::store::atomic_write;

const SETTINGS_FILE: &str = "settings.toml";
const NONCE_LEN: usize = 8;

/// Key for token obfuscation, fixed at build time.
const TOKEN_KEY: &str = match option_env!("SWIPETUI_TOKEN_KEY") {
    Some(key) => key,
    None => "swipetui-default-token-key",
};

pub const COLUMN_COUNT: usize = 4;
const DEFAULT_COLUMN_WIDTHS: [u16; COLUMN_COUNT] = [6, 60, 17, 20];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowState {
    /// Share of the screen height given to the card pane, in percent.
    pub card_percent: u16,
}

impl Default for WindowState {
    fn default() -> Self {
        Self { card_percent: 55 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableState {
    pub column_widths: Vec<u16>,
}

impl Default for TableState {
    fn default() -> Self {
        Self {
            column_widths: DEFAULT_COLUMN_WIDTHS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountState {
    pub user_id: String,
    pub screen_name: String,
    /// Encrypted, see [`seal`].
    pub oauth_token: String,
    /// Encrypted, see [`seal`].
    pub oauth_token_secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub window: WindowState,
    pub table: TableState,
    pub twitter: AccountState,
}

/// Access token pair in clear text.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Loads `settings.toml` from `dir`, or defaults when it does not exist.
    pub fn open(dir: &Path) -> Result<Self> {
        let path = dir.join(SETTINGS_FILE);
        let settings = match fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == ErrorKind::NotFound => Settings::default(),
            Err(e) => return Err(Error::io(path, e)),
        };
        Ok(Self { path, settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn window(&self) -> &WindowState {
        &self.settings.window
    }

    pub fn set_card_percent(&mut self, percent: u16) {
        self.settings.window.card_percent = percent.clamp(20, 80);
    }

    /// Column widths, padded with defaults when the file has fewer entries.
    pub fn column_widths(&self) -> [u16; COLUMN_COUNT] {
        let mut widths = DEFAULT_COLUMN_WIDTHS;
        for (slot, &w) in widths.iter_mut().zip(&self.settings.table.column_widths) {
            if w > 0 {
                *slot = w;
            }
        }
        widths
    }

    pub fn set_column_widths(&mut self, widths: [u16; COLUMN_COUNT]) {
        self.settings.table.column_widths = widths.to_vec();
    }

    pub fn user_id(&self) -> &str {
        &self.settings.twitter.user_id
    }

    pub fn screen_name(&self) -> &str {
        &self.settings.twitter.screen_name
    }

    pub fn credentials(&self) -> Option<Credentials> {
        let account = &self.settings.twitter;
        let token = unseal(&account.oauth_token)?;
        let secret = unseal(&account.oauth_token_secret)?;
        (!token.is_empty() && !secret.is_empty()).then_some(Credentials { token, secret })
    }

    pub fn set_account(
        &mut self,
        user_id: impl Into<String>,
        screen_name: impl Into<String>,
        credentials: &Credentials,
    ) {
        self.settings.twitter = AccountState {
            user_id: user_id.into(),
            screen_name: screen_name.into(),
            oauth_token: seal(&credentials.token),
            oauth_token_secret: seal(&credentials.secret),
        };
    }

    /// Forgets the tokens but keeps the user id so the same files are used
    /// after linking again.
    pub fn clear_credentials(&mut self) {
        self.settings.twitter.oauth_token.clear();
        self.settings.twitter.oauth_token_secret.clear();
    }

    pub fn save(&self) -> Result<()> {
        let text = toml::to_string_pretty(&self.settings)
            .map_err(|e| Error::Config(format!("cannot serialize settings: {}", e)))?;
        atomic_write(&self.path, text.as_bytes())
    }
}

fn keystream(nonce: &[u8], len: usize) -> Vec<u8> {
    let mut stream = Vec::with_capacity(len + 20);
    let mut counter: u32 = 0;
    while stream.len() < len {
        let mut hasher = Sha1::new();
        hasher.update(TOKEN_KEY.as_bytes());
        hasher.update(nonce);
        hasher.update(counter.to_be_bytes());
        stream.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    stream.truncate(len);
    stream
}

/// Obfuscates `plain` as `base64(nonce || plain ^ keystream)`.
pub fn seal(plain: &str) -> String {
    if plain.is_empty() {
        return String::new();
    }
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let stream = keystream(&nonce, plain.len());
    let mut out = nonce.to_vec();
    out.extend(plain.bytes().zip(stream).map(|(b, k)| b ^ k));
    STANDARD.encode(out)
}

/// Reverses [`seal`]. Empty input is an empty secret; garbage is `None`.
pub fn unseal(sealed: &str) -> Option<String> {
    if sealed.is_empty() {
        return Some(String::new());
    }
    let raw = STANDARD.decode(sealed).ok()?;
    if raw.len() < NONCE_LEN {
        return None;
    }
    let (nonce, body) = raw.split_at(NONCE_LEN);
    let stream = keystream(nonce, body.len());
    let plain: Vec<u8> = body.iter().zip(stream).map(|(b, k)| b ^ k).collect();
    String::from_utf8(plain).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_seal_hides_and_restores() {
        let sealed = seal("123-abcdef");
        assert!(!sealed.contains("abcdef"));
        assert_eq!(unseal(&sealed), Some("123-abcdef".to_string()));
        assert_ne!(seal("123-abcdef"), sealed, "nonce should vary");
    }

    #[test]
    fn test_unseal_rejects_garbage() {
        assert_eq!(unseal("!!not base64!!"), None);
        assert_eq!(unseal("AAE="), None);
        assert_eq!(unseal(""), Some(String::new()));
    }

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::open(dir.path()).unwrap();
        assert_eq!(store.window().card_percent, 55);
        assert_eq!(store.column_widths(), DEFAULT_COLUMN_WIDTHS);
        assert!(store.credentials().is_none());
        assert_eq!(store.user_id(), "");
    }

    #[test]
    fn test_account_survives_save() {
        let dir = tempdir().unwrap();
        let mut store = SettingsStore::open(dir.path()).unwrap();
        let creds = Credentials {
            token: "tok".to_string(),
            secret: "sec".to_string(),
        };
        store.set_account("42", "ada", &creds);
        store.set_card_percent(95);
        store.set_column_widths([8, 50, 20, 22]);
        store.save().unwrap();

        let raw = fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap();
        assert!(!raw.contains("\"tok\""));

        let reopened = SettingsStore::open(dir.path()).unwrap();
        assert_eq!(reopened.user_id(), "42");
        assert_eq!(reopened.screen_name(), "ada");
        assert_eq!(reopened.credentials(), Some(creds));
        assert_eq!(reopened.window().card_percent, 80);
        assert_eq!(reopened.column_widths(), [8, 50, 20, 22]);
    }

    #[test]
    fn test_clear_credentials_keeps_user_id() {
        let dir = tempdir().unwrap();
        let mut store = SettingsStore::open(dir.path()).unwrap();
        store.set_account(
            "42",
            "ada",
            &Credentials {
                token: "t".to_string(),
                secret: "s".to_string(),
            },
        );
        store.clear_credentials();
        assert!(store.credentials().is_none());
        assert_eq!(store.user_id(), "42");
    }

    #[test]
    fn test_malformed_file_is_a_config_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), "window = 3 = 4").unwrap();
        assert!(matches!(
            SettingsStore::open(dir.path()),
            Err(Error::Config(_))
        ));
    }
}
