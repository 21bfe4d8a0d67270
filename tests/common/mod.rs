#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use swipetui::feeds::{FetchCursor, TimelineFetcher};
use swipetui::post::Post;
use swipetui::store::PostStore;
use swipetui::triage::{TriageController, TriageEvent};
use swipetui::Result;

/// Replays canned responses and records the cursors it was asked for.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<Vec<Post>>>>,
    cursors: Mutex<Vec<FetchCursor>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: Result<Vec<Post>>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn push_ids(&self, ids: &[i64]) {
        self.push(Ok(posts(ids)));
    }

    pub fn cursors(&self) -> Vec<FetchCursor> {
        self.cursors.lock().unwrap().clone()
    }
}

#[async_trait]
impl TimelineFetcher for ScriptedFetcher {
    fn is_linked(&self) -> bool {
        true
    }

    async fn fetch(&self, cursor: FetchCursor) -> Result<Vec<Post>> {
        self.cursors.lock().unwrap().push(cursor);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn posts(ids: &[i64]) -> Vec<Post> {
    ids.iter()
        .map(|&id| Post::new(id, format!("tweet number {}", id), "Ada"))
        .collect()
}

pub const CARD_WIDTH: u16 = 300;

pub fn controller(dir: &Path, fetcher: Arc<ScriptedFetcher>) -> TriageController {
    let mut controller = TriageController::load(PostStore::new(dir, "42"), fetcher).unwrap();
    controller.card_mut().resize(CARD_WIDTH, 20);
    controller
}

pub fn record(controller: &mut TriageController) -> Rc<RefCell<Vec<TriageEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    controller.subscribe(move |e| sink.borrow_mut().push(e.clone()));
    events
}

/// Refreshes and handles the result at `now_ms`.
pub async fn fetch(controller: &mut TriageController, now_ms: u64) {
    controller.refresh();
    assert!(controller.wait_for_fetch(now_ms).await, "no fetch was started");
}

/// Presses at x = 0 and drags through `samples` (ms after `start`, x).
pub fn gesture(controller: &mut TriageController, start: u64, samples: &[(u64, i32)]) {
    controller.press(0, 5, start);
    for &(t, x) in samples {
        controller.drag(x, 5, start + t);
    }
}

pub fn assert_disjoint(controller: &TriageController) {
    let mut ids = controller.model().all_ids();
    let total = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), total, "an id appears in more than one set");
}
