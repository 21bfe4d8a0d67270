//! On-disk post piles and the relevant-word list.
//!
//! Files live in the data directory and are keyed by the signed-in user id:
//!
//! ```text
//! all_tweets_of_<uid>.json       incoming, pretty-printed JSON array
//! good_tweets_of_<uid>.json      liked
//! bad_tweets_of_<uid>.json       disliked
//! relevant_words_of_<uid>.txt    one word per line
//! ```

use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::post::{Post, PostSet};
use crate::words::RelevantWords;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pile {
    Incoming,
    Liked,
    Disliked,
}

impl Pile {
    fn file_prefix(self) -> &'static str {
        match self {
            Pile::Incoming => "all_tweets_of_",
            Pile::Liked => "good_tweets_of_",
            Pile::Disliked => "bad_tweets_of_",
        }
    }
}

/// Everything read back at startup.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub incoming: PostSet,
    pub liked: PostSet,
    pub disliked: PostSet,
    pub words: RelevantWords,
}

#[derive(Debug)]
pub struct PostStore {
    dir: PathBuf,
    user_id: String,
    /// Piles whose file failed to decode. They are not overwritten until
    /// the in-memory pile has content again.
    unreadable: HashSet<Pile>,
}

impl PostStore {
    pub fn new(dir: impl Into<PathBuf>, user_id: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            user_id: user_id.into(),
            unreadable: HashSet::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn pile_path(&self, pile: Pile) -> PathBuf {
        self.dir
            .join(format!("{}{}.json", pile.file_prefix(), self.user_id))
    }

    pub fn words_path(&self) -> PathBuf {
        self.dir
            .join(format!("relevant_words_of_{}.txt", self.user_id))
    }

    /// Reads all four files. Missing files are empty; a file that does not
    /// decode is logged, treated as empty and protected from overwrite.
    pub fn load(&mut self) -> Result<Snapshot> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;

        let incoming = PostSet::from_posts(self.load_pile(Pile::Incoming)?);
        let liked = PostSet::from_ordered(self.load_pile(Pile::Liked)?);
        let disliked = PostSet::from_ordered(self.load_pile(Pile::Disliked)?);

        let words_path = self.words_path();
        let words = match fs::read_to_string(&words_path) {
            Ok(text) => RelevantWords::from_lines(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => RelevantWords::new(),
            Err(e) => return Err(Error::io(words_path, e)),
        };

        debug!(
            incoming = incoming.len(),
            liked = liked.len(),
            disliked = disliked.len(),
            words = words.len(),
            "loaded stored state"
        );

        Ok(Snapshot {
            incoming,
            liked,
            disliked,
            words,
        })
    }

    fn load_pile(&mut self, pile: Pile) -> Result<Vec<Post>> {
        let path = self.pile_path(pile);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(path, e)),
        };
        match serde_json::from_str::<Vec<Post>>(&data) {
            Ok(posts) => Ok(posts),
            Err(source) => {
                let err = Error::decode(path.display().to_string(), source);
                warn!("{}; starting with an empty list", err);
                self.unreadable.insert(pile);
                Ok(Vec::new())
            }
        }
    }

    pub fn save_pile(&mut self, pile: Pile, posts: &PostSet) -> Result<()> {
        if self.unreadable.contains(&pile) {
            if posts.is_empty() {
                debug!(?pile, "not overwriting unreadable file with an empty list");
                return Ok(());
            }
            self.unreadable.remove(&pile);
        }
        let json = serde_json::to_string_pretty(posts)
            .map_err(|e| Error::decode(format!("{:?} pile", pile), e))?;
        atomic_write(&self.pile_path(pile), json.as_bytes())
    }

    pub fn save_words(&self, words: &RelevantWords) -> Result<()> {
        atomic_write(&self.words_path(), words.to_lines().as_bytes())
    }
}

/// Writes to a temp file in the target directory and renames it over the
/// target, so readers never see a half-written file.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(path, e))?;
    temp.write_all(data).map_err(|e| Error::io(path, e))?;
    temp.flush().map_err(|e| Error::io(path, e))?;
    temp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}
