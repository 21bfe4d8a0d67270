use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Upstream timestamp layout, e.g. `Wed Aug 27 13:08:45 +0000 2008`.
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile_image_url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single timeline entry. Fields the triage flow does not read are kept
/// in `extra` so the persisted JSON stays a faithful copy of the upstream
/// object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: String,
    pub user: Author,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Post {
    pub fn new(id: i64, text: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            created_at: String::new(),
            user: Author {
                name: author.into(),
                profile_image_url: String::new(),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    pub fn author_name(&self) -> &str {
        &self.user.name
    }

    pub fn profile_image_url(&self) -> Option<&str> {
        let url = self.user.profile_image_url.as_str();
        (!url.is_empty()).then_some(url)
    }

    /// `created_at` reformatted for the table, or the raw value when it
    /// does not parse.
    pub fn created_at_display(&self) -> String {
        chrono::DateTime::parse_from_str(&self.created_at, CREATED_AT_FORMAT)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| self.created_at.clone())
    }
}

impl PartialEq for Post {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Post {}

impl PartialOrd for Post {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Newest first: a larger id sorts before a smaller one.
impl Ord for Post {
    fn cmp(&self, other: &Self) -> Ordering {
        other.id.cmp(&self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Liked,
    Disliked,
}

impl Verdict {
    pub fn label(self) -> &'static str {
        match self {
            Verdict::Liked => "liked",
            Verdict::Disliked => "disliked",
        }
    }
}

/// Ordered sequence of posts with set semantics by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostSet {
    posts: Vec<Post>,
}

impl PostSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from arbitrary input: duplicate ids are dropped (first
    /// occurrence wins) and the result is sorted newest first.
    pub fn from_posts(posts: Vec<Post>) -> Self {
        let mut seen = HashSet::new();
        let mut posts: Vec<Post> = posts.into_iter().filter(|p| seen.insert(p.id)).collect();
        posts.sort();
        Self { posts }
    }

    /// Wraps already-ordered posts without re-sorting. Used for the liked
    /// and disliked piles, whose order is classification order.
    pub fn from_ordered(posts: Vec<Post>) -> Self {
        let mut seen = HashSet::new();
        let posts = posts.into_iter().filter(|p| seen.insert(p.id)).collect();
        Self { posts }
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Post> {
        self.posts.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Post> {
        self.posts.get(index)
    }

    pub fn front(&self) -> Option<&Post> {
        self.posts.first()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.posts.iter().any(|p| p.id == id)
    }

    pub fn ids(&self) -> Vec<i64> {
        self.posts.iter().map(|p| p.id).collect()
    }

    pub fn max_id(&self) -> Option<i64> {
        self.posts.iter().map(|p| p.id).max()
    }

    pub fn push_front(&mut self, post: Post) {
        self.posts.insert(0, post);
    }

    pub fn pop_front(&mut self) -> Option<Post> {
        if self.posts.is_empty() {
            None
        } else {
            Some(self.posts.remove(0))
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<Post> {
        (index < self.posts.len()).then(|| self.posts.remove(index))
    }

    pub(crate) fn extend(&mut self, posts: impl IntoIterator<Item = Post>) {
        self.posts.extend(posts);
    }

    pub(crate) fn sort(&mut self) {
        self.posts.sort();
    }

    pub fn as_slice(&self) -> &[Post] {
        &self.posts
    }
}

impl<'a> IntoIterator for &'a PostSet {
    type Item = &'a Post;
    type IntoIter = std::slice::Iter<'a, Post>;

    fn into_iter(self) -> Self::IntoIter {
        self.posts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_deserializes_and_keeps_unknown_fields() {
        let json = r#"{
            "id": 42,
            "id_str": "42",
            "text": "hello there",
            "created_at": "Wed Aug 27 13:08:45 +0000 2008",
            "retweet_count": 3,
            "user": {"name": "Ada", "profile_image_url": "http://img/a.png", "screen_name": "ada"}
        }"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.id, 42);
        assert_eq!(post.author_name(), "Ada");
        assert_eq!(post.profile_image_url(), Some("http://img/a.png"));
        assert_eq!(post.extra.get("retweet_count"), Some(&Value::from(3)));
        assert_eq!(post.user.extra.get("screen_name"), Some(&Value::from("ada")));

        let back = serde_json::to_value(&post).unwrap();
        assert_eq!(back["id_str"], "42");
        assert_eq!(back["user"]["screen_name"], "ada");
    }

    #[test]
    fn test_created_at_display() {
        let mut post = Post::new(1, "x", "a");
        post.created_at = "Wed Aug 27 13:08:45 +0000 2008".to_string();
        assert_eq!(post.created_at_display(), "2008-08-27 13:08");

        post.created_at = "yesterday".to_string();
        assert_eq!(post.created_at_display(), "yesterday");
    }

    #[test]
    fn test_ordering_is_newest_first() {
        let mut posts = vec![Post::new(10, "", ""), Post::new(30, "", ""), Post::new(20, "", "")];
        posts.sort();
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![30, 20, 10]);
    }

    #[test]
    fn test_from_posts_drops_duplicates() {
        let set = PostSet::from_posts(vec![
            Post::new(10, "first", ""),
            Post::new(20, "", ""),
            Post::new(10, "second", ""),
        ]);
        assert_eq!(set.ids(), vec![20, 10]);
        assert_eq!(set.get(1).unwrap().text, "first");
    }

    #[test]
    fn test_from_ordered_keeps_order() {
        let set = PostSet::from_ordered(vec![Post::new(10, "", ""), Post::new(20, "", "")]);
        assert_eq!(set.ids(), vec![10, 20]);
        assert_eq!(set.max_id(), Some(20));
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut set = PostSet::from_posts(vec![Post::new(1, "", "")]);
        assert!(set.remove(3).is_none());
        assert_eq!(set.remove(0).map(|p| p.id), Some(1));
        assert!(set.is_empty());
    }
}
