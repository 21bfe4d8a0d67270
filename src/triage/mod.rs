//! Card state machine: fetch completion, gestures, classification and the
//! timers that drive coasting and dismissal.
//!
//! Everything runs on the UI thread. Time is passed in explicitly as
//! milliseconds on a monotonic clock so the machine can be driven from the
//! event loop and from tests alike.

pub mod animation;
pub mod kinetic;

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::feeds::{FetchCursor, TimelineFetcher};
use crate::post::{Post, PostSet, Verdict};
use crate::store::{Pile, PostStore};
use crate::timeline::TimelineModel;
use crate::ui::card::{CardAnimation, CardView};
use crate::words::RelevantWords;
use kinetic::{
    KineticSample, KineticTracker, ReleaseDecision, FRICTION, MIN_SPEED, TIME_INTERVAL_MS,
};

/// Length of every card animation and of the dismissal delay.
pub const ANIMATION_DURATION_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardState {
    Empty,
    AtRest,
    Dragging,
    Coasting,
    Dismissing(Verdict),
    Returning,
}

impl CardState {
    /// Whether the card takes pointer and button input.
    pub fn accepts_input(self) -> bool {
        !matches!(self, CardState::Empty | CardState::Dismissing(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriageEvent {
    StatusMessage(String),
    Warning { title: String, body: String },
    CardShown(i64),
    Classified { id: i64, verdict: Verdict },
    WordAdded(String),
    IncomingChanged,
    FetchStarted,
    StateChanged(CardState),
}

type Observer = Box<dyn FnMut(&TriageEvent)>;

#[derive(Debug, Clone, Copy)]
struct Gesture {
    press_x: i32,
    base_offset: i32,
    start_ms: u64,
}

/// Card opacity for a horizontal offset `x` on a card `width` wide.
///
/// Folded around zero so both directions fade the same way, then shifted
/// down so a card being handled is visibly lighter than one at rest.
pub fn opacity_for_offset(x: i32, width: u16) -> f64 {
    let w = f64::from(width.max(1));
    // (w - x) / w folded at 1 is 1 - |x| / w on both sides.
    (1.0 - f64::from(x.unsigned_abs()) / w - 0.25).clamp(0.0, 1.0)
}

pub struct TriageController {
    model: TimelineModel,
    words: RelevantWords,
    store: PostStore,
    card: CardView,
    fetcher: Arc<dyn TimelineFetcher>,
    state: CardState,
    kinetic: KineticTracker,
    gesture: Option<Gesture>,
    velocity: f64,
    next_tick_ms: Option<u64>,
    dismiss_at_ms: Option<u64>,
    fetch_in_flight: bool,
    fetch_tx: UnboundedSender<Result<Vec<Post>>>,
    fetch_rx: UnboundedReceiver<Result<Vec<Post>>>,
    observers: Vec<Observer>,
    torn_down: bool,
}

impl TriageController {
    /// Restores the stored piles and word list.
    pub fn load(mut store: PostStore, fetcher: Arc<dyn TimelineFetcher>) -> Result<Self> {
        let snapshot = store.load()?;
        let model = TimelineModel::restore(snapshot.incoming, snapshot.liked, snapshot.disliked);
        info!(
            incoming = model.incoming().len(),
            liked = model.liked().len(),
            disliked = model.disliked().len(),
            most_recent_id = model.most_recent_id(),
            "restored timeline"
        );
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        Ok(Self {
            model,
            words: snapshot.words,
            store,
            card: CardView::default(),
            fetcher,
            state: CardState::Empty,
            kinetic: KineticTracker::new(),
            gesture: None,
            velocity: 0.0,
            next_tick_ms: None,
            dismiss_at_ms: None,
            fetch_in_flight: false,
            fetch_tx,
            fetch_rx,
            observers: Vec::new(),
            torn_down: false,
        })
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&TriageEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn emit(&mut self, event: TriageEvent) {
        for observer in &mut self.observers {
            observer(&event);
        }
    }

    fn set_state(&mut self, state: CardState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "card state");
            self.state = state;
            self.emit(TriageEvent::StateChanged(state));
        }
    }

    fn status(&mut self, message: impl Into<String>) {
        self.emit(TriageEvent::StatusMessage(message.into()));
    }

    pub fn state(&self) -> CardState {
        self.state
    }

    pub fn model(&self) -> &TimelineModel {
        &self.model
    }

    pub fn words(&self) -> &RelevantWords {
        &self.words
    }

    pub fn card(&self) -> &CardView {
        &self.card
    }

    pub fn card_mut(&mut self) -> &mut CardView {
        &mut self.card
    }

    pub fn is_fetching(&self) -> bool {
        self.fetch_in_flight
    }

    pub fn is_linked(&self) -> bool {
        self.fetcher.is_linked()
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Shows a stored post if there is one, then optionally fetches.
    pub fn start(&mut self, now_ms: u64, fetch: bool) {
        if !self.model.incoming().is_empty() {
            self.pick_next(now_ms);
        }
        if fetch {
            self.refresh();
        }
    }

    /// Starts a fetch for posts newer than anything known. Ignored while a
    /// fetch is already running.
    pub fn refresh(&mut self) {
        if self.torn_down {
            return;
        }
        if self.fetch_in_flight {
            debug!("refresh ignored, fetch in flight");
            return;
        }
        if !self.fetcher.is_linked() {
            self.status(Error::AuthMissing.to_string());
            return;
        }

        let cursor = FetchCursor::from_most_recent(self.model.most_recent_id());
        info!(?cursor, "refreshing timeline");
        self.fetch_in_flight = true;
        let fetcher = self.fetcher.clone();
        let tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch(cursor).await;
            // The receiver is dropped only together with the controller.
            let _ = tx.send(result);
        });
        self.emit(TriageEvent::FetchStarted);
        self.status("Fetching tweets...");
    }

    /// Handles a finished fetch if one is waiting. Returns whether one was.
    pub fn poll_fetch(&mut self, now_ms: u64) -> bool {
        match self.fetch_rx.try_recv() {
            Ok(result) => {
                self.finish_fetch(result, now_ms);
                true
            }
            Err(_) => false,
        }
    }

    /// Waits for the running fetch to finish and handles it. Returns `false`
    /// when no fetch was running.
    pub async fn wait_for_fetch(&mut self, now_ms: u64) -> bool {
        if !self.fetch_in_flight {
            return false;
        }
        match self.fetch_rx.recv().await {
            Some(result) => {
                self.finish_fetch(result, now_ms);
                true
            }
            None => false,
        }
    }

    fn finish_fetch(&mut self, result: Result<Vec<Post>>, now_ms: u64) {
        self.fetch_in_flight = false;
        if self.torn_down {
            debug!("dropping fetch result after teardown");
            return;
        }
        match result {
            Ok(batch) => self.on_fetch_ok(batch, now_ms),
            Err(err) => self.on_fetch_err(err),
        }
    }

    /// Merges a fetched batch. A card already on screen stays current; it
    /// is not part of `incoming`, so the merge cannot duplicate it.
    pub fn on_fetch_ok(&mut self, batch: Vec<Post>, now_ms: u64) {
        if self.torn_down {
            return;
        }
        let fetched = batch.len();
        let added = self.model.merge_incoming(batch);
        info!(fetched, added, most_recent_id = self.model.most_recent_id(), "merged fetch");

        if let Err(e) = self.store.save_pile(Pile::Incoming, &self.incoming_with_current()) {
            warn!("could not save incoming tweets: {}", e);
        }
        self.emit(TriageEvent::IncomingChanged);
        self.status(match added {
            0 => "No new tweets".to_string(),
            1 => "1 new tweet".to_string(),
            n => format!("{} new tweets", n),
        });

        if self.state == CardState::Empty {
            self.pick_next(now_ms);
        }
    }

    /// Reports a failed fetch. The model is left alone.
    pub fn on_fetch_err(&mut self, err: Error) {
        warn!("fetch failed: {}", err);
        self.status(err.to_string());
        if err.is_modal() {
            self.emit(TriageEvent::Warning {
                title: "Could not fetch tweets".to_string(),
                body: err.warning_text(),
            });
        }
    }

    /// Incoming plus the card on screen, as written to disk.
    pub fn incoming_with_current(&self) -> PostSet {
        PostSet::from_posts(
            self.model
                .current()
                .into_iter()
                .chain(self.model.incoming().iter())
                .cloned()
                .collect(),
        )
    }

    /// Mounts the newest incoming post, or leaves the card empty.
    pub fn pick_next(&mut self, now_ms: u64) {
        if !matches!(
            self.state,
            CardState::Empty | CardState::Dismissing(_) | CardState::Returning
        ) {
            debug!(state = ?self.state, "pick_next ignored");
            return;
        }
        self.stop_motion();
        self.dismiss_at_ms = None;
        self.card.unmount();
        self.card.set_opacity(1.0);

        match self.model.pop_next_incoming().cloned() {
            Some(post) => {
                let id = post.id;
                self.card.mount(post);
                self.card.float_in(now_ms);
                self.set_state(CardState::AtRest);
                self.emit(TriageEvent::CardShown(id));
                self.emit(TriageEvent::IncomingChanged);
            }
            None => {
                self.set_state(CardState::Empty);
            }
        }
    }

    pub fn like(&mut self, now_ms: u64) {
        self.classify(Verdict::Liked, now_ms);
    }

    pub fn dislike(&mut self, now_ms: u64) {
        self.classify(Verdict::Disliked, now_ms);
    }

    /// Commits a verdict for the current post and floats the card out. The
    /// next card follows after [`ANIMATION_DURATION_MS`].
    pub fn classify(&mut self, verdict: Verdict, now_ms: u64) {
        if self.torn_down || !self.state.accepts_input() {
            debug!(state = ?self.state, ?verdict, "classify ignored");
            return;
        }
        let Some(post) = self.model.classify(verdict) else {
            return;
        };
        info!(id = post.id, verdict = verdict.label(), "classified");
        self.stop_motion();
        self.card.float_out(verdict, now_ms);
        self.dismiss_at_ms = Some(now_ms + ANIMATION_DURATION_MS);
        self.set_state(CardState::Dismissing(verdict));
        self.emit(TriageEvent::Classified {
            id: post.id,
            verdict,
        });
    }

    fn stop_motion(&mut self) {
        self.velocity = 0.0;
        self.next_tick_ms = None;
        self.gesture = None;
        self.kinetic.clear();
    }

    /// Pointer pressed on the card at screen position `(x, y)`.
    pub fn press(&mut self, x: i32, _y: i32, now_ms: u64) {
        if self.torn_down
            || !matches!(
                self.state,
                CardState::AtRest | CardState::Coasting | CardState::Returning
            )
        {
            return;
        }
        self.stop_motion();
        self.card.stop_animation();
        self.gesture = Some(Gesture {
            press_x: x,
            base_offset: self.card.offset_x(),
            start_ms: now_ms,
        });
        self.set_state(CardState::Dragging);
    }

    /// Pointer moved while pressed. Only the horizontal delta moves the card.
    pub fn drag(&mut self, x: i32, y: i32, now_ms: u64) {
        if self.state != CardState::Dragging {
            return;
        }
        let Some(gesture) = self.gesture else {
            return;
        };
        self.kinetic.push(KineticSample {
            x,
            y,
            t_ms: now_ms.saturating_sub(gesture.start_ms),
        });
        self.move_card_to(gesture.base_offset + (x - gesture.press_x), now_ms);
    }

    /// Pointer released. A quick fling keeps the card coasting, anything
    /// else slides it back.
    pub fn release(&mut self, x: i32, _y: i32, now_ms: u64) {
        if self.state != CardState::Dragging {
            return;
        }
        let Some(gesture) = self.gesture.take() else {
            return;
        };
        let elapsed = now_ms.saturating_sub(gesture.start_ms);
        match self.kinetic.release(x, elapsed) {
            ReleaseDecision::Coast { velocity } => {
                debug!(velocity, "coasting");
                self.velocity = velocity;
                self.next_tick_ms = Some(now_ms + TIME_INTERVAL_MS);
                self.set_state(CardState::Coasting);
            }
            ReleaseDecision::Return => self.start_return(now_ms),
        }
        self.kinetic.clear();
    }

    fn start_return(&mut self, now_ms: u64) {
        self.velocity = 0.0;
        self.next_tick_ms = None;
        self.card.unfloat(now_ms);
        self.set_state(CardState::Returning);
    }

    /// Shifts the card horizontally by `dx`.
    pub fn translate(&mut self, dx: i32, now_ms: u64) {
        let x = self.card.offset_x() + dx;
        self.move_card_to(x, now_ms);
    }

    fn move_card_to(&mut self, x: i32, now_ms: u64) {
        let width = self.card.width();
        self.card.set_offset(x);
        self.card.set_opacity(opacity_for_offset(x, width));

        let w = i32::from(width);
        if x > w {
            self.classify(Verdict::Liked, now_ms);
        } else if x < -w {
            self.classify(Verdict::Disliked, now_ms);
        }
    }

    /// Advances animations and timers to `now_ms`.
    pub fn tick(&mut self, now_ms: u64) {
        if let (CardState::Dismissing(_), Some(deadline)) = (self.state, self.dismiss_at_ms) {
            if now_ms >= deadline {
                self.pick_next(now_ms);
            }
        }

        if let Some(finished) = self.card.advance(now_ms) {
            if finished == CardAnimation::Unfloat && self.state == CardState::Returning {
                self.card.set_opacity(1.0);
                self.set_state(CardState::AtRest);
            }
        }

        if self.state == CardState::Coasting {
            if let Some(due) = self.next_tick_ms {
                if now_ms >= due {
                    self.kinetic_tick(now_ms);
                }
            }
        }
    }

    fn kinetic_tick(&mut self, now_ms: u64) {
        if self.velocity.abs() > MIN_SPEED {
            let dx = self.velocity.round() as i32;
            self.velocity *= FRICTION;
            self.next_tick_ms = Some(now_ms + TIME_INTERVAL_MS);
            self.translate(dx, now_ms);
            return;
        }

        self.velocity = 0.0;
        self.next_tick_ms = None;
        if self.card.is_at_rest() {
            self.card.set_opacity(1.0);
            self.set_state(CardState::AtRest);
        } else {
            self.start_return(now_ms);
        }
    }

    /// A word chip on the card was clicked.
    pub fn select_word(&mut self, token: &str) {
        if self.torn_down || !self.state.accepts_input() {
            return;
        }
        match self.words.insert_token(token) {
            Some(word) => {
                info!(%word, "relevant word added");
                self.status(format!("Added \"{}\" to relevant words", word));
                self.emit(TriageEvent::WordAdded(word));
            }
            None => debug!(token, "word ignored"),
        }
    }

    /// Removes the given incoming rows. Returns how many were removed.
    pub fn delete_rows(&mut self, indices: &[usize]) -> usize {
        let mut indices = indices.to_vec();
        indices.sort_unstable_by(|a, b| b.cmp(a));
        indices.dedup();
        let removed = indices
            .into_iter()
            .filter_map(|index| self.model.remove_incoming(index))
            .count();
        if removed > 0 {
            info!(removed, "deleted incoming rows");
            self.emit(TriageEvent::IncomingChanged);
        }
        removed
    }

    /// Placeholder action of the table menu. Does nothing.
    pub fn evaluate(&mut self, indices: &[usize]) {
        debug!(rows = indices.len(), "evaluate requested");
    }

    /// Stops all timers and writes every pile and the word list. Failures
    /// are logged and returned; none of them stops the rest of the flush.
    pub fn shutdown(&mut self) -> Vec<Error> {
        self.torn_down = true;
        self.stop_motion();
        self.fetch_rx.close();

        let incoming = self.incoming_with_current();
        let liked = self.model.liked().clone();
        let disliked = self.model.disliked().clone();

        let mut failures = Vec::new();
        for (pile, posts) in [
            (Pile::Incoming, &incoming),
            (Pile::Liked, &liked),
            (Pile::Disliked, &disliked),
        ] {
            if let Err(e) = self.store.save_pile(pile, posts) {
                warn!(?pile, "could not save: {}", e);
                failures.push(e);
            }
        }
        if let Err(e) = self.store.save_words(&self.words) {
            warn!("could not save relevant words: {}", e);
            failures.push(e);
        }
        info!(failures = failures.len(), "flushed state");
        failures
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}
