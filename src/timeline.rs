use std::collections::HashSet;

use tracing::{debug, warn};

use crate::post::{Post, PostSet, Verdict};

/// The four post sets of a session plus the most recent id seen.
///
/// A post id lives in at most one of `incoming`, `liked`, `disliked` and
/// `current` at any time.
#[derive(Debug, Clone, Default)]
pub struct TimelineModel {
    incoming: PostSet,
    liked: PostSet,
    disliked: PostSet,
    current: Option<Post>,
    most_recent_id: i64,
}

impl TimelineModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a model from persisted sets. Ids that show up in more than
    /// one file are kept in the classified pile only.
    pub fn restore(incoming: PostSet, liked: PostSet, disliked: PostSet) -> Self {
        let liked_ids: HashSet<i64> = liked.iter().map(|p| p.id).collect();
        let disliked = PostSet::from_ordered(
            disliked
                .iter()
                .filter(|p| !liked_ids.contains(&p.id))
                .cloned()
                .collect(),
        );
        let classified: HashSet<i64> = liked
            .iter()
            .chain(disliked.iter())
            .map(|p| p.id)
            .collect();
        let incoming = PostSet::from_posts(
            incoming
                .iter()
                .filter(|p| !classified.contains(&p.id))
                .cloned()
                .collect(),
        );

        let mut model = Self {
            incoming,
            liked,
            disliked,
            current: None,
            most_recent_id: 0,
        };
        model.recalculate_most_recent_id();
        model
    }

    pub fn incoming(&self) -> &PostSet {
        &self.incoming
    }

    pub fn liked(&self) -> &PostSet {
        &self.liked
    }

    pub fn disliked(&self) -> &PostSet {
        &self.disliked
    }

    pub fn current(&self) -> Option<&Post> {
        self.current.as_ref()
    }

    pub fn most_recent_id(&self) -> i64 {
        self.most_recent_id
    }

    fn knows(&self, id: i64) -> bool {
        self.current.as_ref().is_some_and(|p| p.id == id)
            || self.incoming.contains(id)
            || self.liked.contains(id)
            || self.disliked.contains(id)
    }

    /// Adds the posts of `batch` that are not known yet and re-sorts
    /// `incoming`. Returns how many posts were new.
    pub fn merge_incoming(&mut self, batch: Vec<Post>) -> usize {
        let mut seen = HashSet::new();
        let novel: Vec<Post> = batch
            .into_iter()
            .filter(|p| !self.knows(p.id) && seen.insert(p.id))
            .collect();
        let count = novel.len();
        self.incoming.extend(novel);
        self.incoming.sort();
        self.recalculate_most_recent_id();
        debug!(new = count, incoming = self.incoming.len(), "merged batch");
        count
    }

    /// Promotes the newest incoming post to `current`.
    ///
    /// If a post is already current it goes back to the front of `incoming`
    /// first so nothing is lost.
    pub fn pop_next_incoming(&mut self) -> Option<&Post> {
        if let Some(previous) = self.current.take() {
            self.incoming.push_front(previous);
            self.incoming.sort();
        }
        self.current = self.incoming.pop_front();
        self.recalculate_most_recent_id();
        self.current.as_ref()
    }

    /// Moves the current post to the front of the liked or disliked pile.
    /// Returns the classified post, or `None` when nothing was current.
    pub fn classify(&mut self, verdict: Verdict) -> Option<Post> {
        let post = self.current.take()?;
        match verdict {
            Verdict::Liked => self.liked.push_front(post.clone()),
            Verdict::Disliked => self.disliked.push_front(post.clone()),
        }
        self.recalculate_most_recent_id();
        Some(post)
    }

    /// Drops the incoming post at `index`. The current post is never part of
    /// `incoming`, so it cannot be removed this way.
    pub fn remove_incoming(&mut self, index: usize) -> Option<Post> {
        let removed = self.incoming.remove(index);
        if let Some(post) = &removed {
            debug!(id = post.id, index, "removed incoming post");
        }
        removed
    }

    fn recalculate_most_recent_id(&mut self) {
        let candidate = [
            self.current.as_ref().map(|p| p.id),
            self.incoming.max_id(),
            self.liked.max_id(),
            self.disliked.max_id(),
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(0);

        if candidate < self.most_recent_id {
            warn!(
                kept = self.most_recent_id,
                computed = candidate,
                "most recent id would decrease, keeping previous value"
            );
            return;
        }
        self.most_recent_id = candidate;
    }

    /// Every id across the four sets, for invariant checks.
    pub fn all_ids(&self) -> Vec<i64> {
        self.current
            .iter()
            .chain(self.incoming.iter())
            .chain(self.liked.iter())
            .chain(self.disliked.iter())
            .map(|p| p.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posts(ids: &[i64]) -> Vec<Post> {
        ids.iter().map(|&id| Post::new(id, format!("post {}", id), "someone")).collect()
    }

    fn assert_unique(model: &TimelineModel) {
        let ids = model.all_ids();
        let unique: HashSet<i64> = ids.iter().copied().collect();
        assert_eq!(ids.len(), unique.len(), "duplicate id in {:?}", ids);
    }

    #[test]
    fn test_merge_sorts_newest_first() {
        let mut model = TimelineModel::new();
        assert_eq!(model.merge_incoming(posts(&[10, 30, 20])), 3);
        assert_eq!(model.incoming().ids(), vec![30, 20, 10]);
        assert_eq!(model.most_recent_id(), 30);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut model = TimelineModel::new();
        model.merge_incoming(posts(&[5, 7]));
        model.merge_incoming(posts(&[9, 7, 3]));
        let once = model.incoming().ids();
        assert_eq!(model.merge_incoming(posts(&[9, 7, 3])), 0);
        assert_eq!(model.incoming().ids(), once);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let mut a = TimelineModel::new();
        a.merge_incoming(posts(&[1, 2]));
        a.merge_incoming(posts(&[3, 4]));

        let mut b = TimelineModel::new();
        b.merge_incoming(posts(&[4, 3]));
        b.merge_incoming(posts(&[2, 1]));

        assert_eq!(a.incoming().ids(), b.incoming().ids());
    }

    #[test]
    fn test_merge_drops_duplicates_within_batch() {
        let mut model = TimelineModel::new();
        assert_eq!(model.merge_incoming(posts(&[8, 8, 8])), 1);
        assert_eq!(model.incoming().ids(), vec![8]);
    }

    #[test]
    fn test_merge_skips_current_and_classified() {
        let mut model = TimelineModel::new();
        model.merge_incoming(posts(&[30, 20, 10]));
        model.pop_next_incoming();
        model.classify(Verdict::Disliked);
        model.pop_next_incoming();

        let added = model.merge_incoming(posts(&[40, 30, 20, 10]));
        assert_eq!(added, 1);
        assert_eq!(model.incoming().ids(), vec![40, 10]);
        assert_eq!(model.current().map(|p| p.id), Some(20));
        assert_unique(&model);
    }

    #[test]
    fn test_classify_prepends() {
        let mut model = TimelineModel::new();
        model.merge_incoming(posts(&[3, 2, 1]));
        for _ in 0..3 {
            model.pop_next_incoming();
            model.classify(Verdict::Liked);
        }
        assert_eq!(model.liked().ids(), vec![1, 2, 3]);
        assert!(model.current().is_none());
        assert!(model.classify(Verdict::Liked).is_none());
        assert_eq!(model.most_recent_id(), 3);
    }

    #[test]
    fn test_pop_next_on_empty() {
        let mut model = TimelineModel::new();
        assert!(model.pop_next_incoming().is_none());
        assert_eq!(model.most_recent_id(), 0);
    }

    #[test]
    fn test_most_recent_id_never_decreases() {
        let mut model = TimelineModel::new();
        model.merge_incoming(posts(&[50, 40]));
        assert_eq!(model.most_recent_id(), 50);
        model.remove_incoming(0);
        model.remove_incoming(0);
        assert!(model.incoming().is_empty());
        model.merge_incoming(posts(&[10]));
        assert_eq!(model.most_recent_id(), 50);
    }

    #[test]
    fn test_restore_resolves_overlaps() {
        let model = TimelineModel::restore(
            PostSet::from_posts(posts(&[5, 4, 3])),
            PostSet::from_ordered(posts(&[4])),
            PostSet::from_ordered(posts(&[3, 4])),
        );
        assert_eq!(model.incoming().ids(), vec![5]);
        assert_eq!(model.liked().ids(), vec![4]);
        assert_eq!(model.disliked().ids(), vec![3]);
        assert_eq!(model.most_recent_id(), 5);
        assert_unique(&model);
    }

    #[test]
    fn test_sets_stay_disjoint_through_a_session() {
        let mut model = TimelineModel::new();
        model.merge_incoming(posts(&[6, 5, 4, 3, 2, 1]));
        let verdicts = [Verdict::Liked, Verdict::Disliked, Verdict::Liked];
        for verdict in verdicts {
            model.pop_next_incoming();
            assert_unique(&model);
            model.classify(verdict);
            assert_unique(&model);
            model.merge_incoming(posts(&[7, 6, 5]));
            assert_unique(&model);
        }
        model.remove_incoming(1);
        assert_unique(&model);
        assert_eq!(model.all_ids().len(), 6);
    }
}
