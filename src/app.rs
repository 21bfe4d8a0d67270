//! Terminal shell: owns the controller, routes keyboard and mouse input and
//! runs the draw loop.

use std::cell::RefCell;
use std::io::{self, Stdout};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::feeds::oauth::{Consumer, Signer};
use crate::feeds::{HomeTimelineFetcher, TimelineFetcher};
use crate::images::ImageLoader;
use crate::settings::SettingsStore;
use crate::store::PostStore;
use crate::triage::{TriageController, TriageEvent};
use crate::ui::table::{IncomingTable, TableAction};
use crate::ui::{self, hit, ScreenLayout};

/// Poll timeout of the event loop; also the animation frame period.
const FRAME: Duration = Duration::from_millis(16);
const SPLIT_STEP: u16 = 5;
const COLUMN_STEP: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Card,
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub title: String,
    pub body: String,
}

pub struct App {
    pub(crate) controller: TriageController,
    pub(crate) settings: SettingsStore,
    pub(crate) images: ImageLoader,
    pub(crate) table: IncomingTable,
    pub(crate) focus: Focus,
    pub(crate) layout: ScreenLayout,
    pub(crate) warning: Option<Warning>,
    status: Option<(String, u64)>,
    status_timeout_ms: u64,
    events: Rc<RefCell<Vec<TriageEvent>>>,
    clock: Instant,
    should_quit: bool,
}

/// The real fetcher, signed with the stored tokens when there are any.
pub fn build_fetcher(
    config: &Config,
    settings: &SettingsStore,
    client: reqwest::Client,
) -> Arc<dyn TimelineFetcher> {
    let consumer = Consumer {
        key: config.twitter.consumer_key.clone(),
        secret: config.twitter.consumer_secret.clone(),
    };
    let signer = Signer::new(consumer, settings.credentials());
    Arc::new(HomeTimelineFetcher::new(
        client,
        &config.twitter.api_host,
        signer,
    ))
}

impl App {
    pub fn new(
        config: &Config,
        settings: SettingsStore,
        fetcher: Arc<dyn TimelineFetcher>,
        client: reqwest::Client,
    ) -> Result<Self> {
        let data_dir = config.data_dir();
        let store = PostStore::new(&data_dir, settings.user_id());
        let mut controller =
            TriageController::load(store, fetcher).context("Failed to load stored tweets")?;

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        controller.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        let images = ImageLoader::new(
            config.image_cache_dir(),
            config.storage.image_cache_capacity,
            client,
        );

        Ok(Self {
            controller,
            settings,
            images,
            table: IncomingTable::new(),
            focus: Focus::Card,
            layout: ScreenLayout::default(),
            warning: None,
            status: None,
            status_timeout_ms: config.ui.status_timeout_ms,
            events,
            clock: Instant::now(),
            should_quit: false,
        })
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.elapsed().as_millis() as u64
    }

    pub fn card_percent(&self) -> u16 {
        self.settings.window().card_percent
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status.as_ref().map(|(text, _)| text.as_str())
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn start(&mut self, fetch: bool) {
        let now = self.now_ms();
        self.controller.start(now, fetch);
        self.drain_events(now);
    }

    /// Everything that happens between frames: async completions, timers,
    /// thumbnail loading and status expiry.
    pub fn pump(&mut self, now: u64) {
        while self.controller.poll_fetch(now) {}
        let ready = self.images.poll();
        if !ready.is_empty() {
            debug!(count = ready.len(), "images ready");
        }
        self.controller.tick(now);
        self.load_thumbnails();
        self.drain_events(now);

        if let Some((_, expires)) = &self.status {
            if now >= *expires {
                self.status = None;
            }
        }
    }

    fn load_thumbnails(&mut self) {
        let card_url = self
            .controller
            .card()
            .post()
            .filter(|_| !self.controller.card().has_thumbnail())
            .and_then(|p| p.profile_image_url())
            .map(str::to_string);
        if let Some(url) = card_url {
            if let Some(thumb) = self.images.request(&url) {
                self.controller.card_mut().set_thumbnail(Some(thumb));
            }
        }

        let posts = self.controller.model().incoming();
        let visible = self.table.visible_rows(self.layout.table.height, posts.len());
        let urls: Vec<String> = visible
            .filter_map(|i| posts.get(i))
            .filter_map(|p| p.profile_image_url())
            .map(str::to_string)
            .collect();
        self.images.prefetch(urls);
    }

    fn drain_events(&mut self, now: u64) {
        let events: Vec<TriageEvent> = self.events.borrow_mut().drain(..).collect();
        for event in events {
            match event {
                TriageEvent::StatusMessage(text) => {
                    self.status = Some((text, now + self.status_timeout_ms));
                }
                TriageEvent::Warning { title, body } => {
                    self.warning = Some(Warning { title, body });
                }
                TriageEvent::IncomingChanged => {
                    self.table.sync(self.controller.model().incoming());
                }
                _ => {}
            }
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        let now = self.now_ms();
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key, now),
            Event::Mouse(mouse) => self.handle_mouse(mouse, now),
            _ => {}
        }
        self.drain_events(now);
    }

    fn handle_key(&mut self, key: KeyEvent, now: u64) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if self.warning.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                self.warning = None;
            }
            return;
        }

        if self.focus == Focus::Table && self.table.menu().is_some() {
            let action = self.table.handle_key(key, self.controller.model().incoming());
            self.apply_table_action(action);
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('r') => self.controller.refresh(),
            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = match self.focus {
                    Focus::Card => Focus::Table,
                    Focus::Table => Focus::Card,
                };
            }
            KeyCode::Char('l') | KeyCode::Right => self.controller.like(now),
            KeyCode::Char('h') | KeyCode::Left => self.controller.dislike(now),
            KeyCode::Char('[') => self.resize_split(-(SPLIT_STEP as i32)),
            KeyCode::Char(']') => self.resize_split(SPLIT_STEP as i32),
            KeyCode::Char('<') if self.focus == Focus::Table => {
                self.resize_text_column(-COLUMN_STEP)
            }
            KeyCode::Char('>') if self.focus == Focus::Table => {
                self.resize_text_column(COLUMN_STEP)
            }
            _ if self.focus == Focus::Table => {
                let action = self.table.handle_key(key, self.controller.model().incoming());
                self.apply_table_action(action);
            }
            _ => {}
        }
    }

    fn resize_split(&mut self, delta: i32) {
        let percent = (i32::from(self.card_percent()) + delta).clamp(0, 100) as u16;
        self.settings.set_card_percent(percent);
    }

    fn resize_text_column(&mut self, delta: i32) {
        let mut widths = self.settings.column_widths();
        widths[1] = (i32::from(widths[1]) + delta).clamp(10, 200) as u16;
        self.settings.set_column_widths(widths);
    }

    fn apply_table_action(&mut self, action: Option<TableAction>) {
        match action {
            Some(TableAction::Delete(rows)) => {
                let removed = self.controller.delete_rows(&rows);
                self.status = Some((
                    format!("Deleted {} tweet(s)", removed),
                    self.now_ms() + self.status_timeout_ms,
                ));
            }
            Some(TableAction::Evaluate(rows)) => self.controller.evaluate(&rows),
            None => {}
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent, now: u64) {
        let (column, row) = (mouse.column, mouse.row);
        let rest = self.layout.card_rest;
        let rel_x = i32::from(column) - i32::from(rest.x);
        let rel_y = i32::from(row) - i32::from(rest.y);

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if self.warning.is_some() {
                    self.warning = None;
                    return;
                }
                if self.table.menu().is_some() {
                    let action =
                        self.table
                            .click(column, row, false, self.controller.model().incoming());
                    self.apply_table_action(action);
                    return;
                }
                if hit(self.layout.refresh_button, column, row) {
                    self.controller.refresh();
                } else if hit(self.layout.exit_button, column, row) {
                    self.should_quit = true;
                } else if hit(self.layout.like_button, column, row) {
                    self.controller.like(now);
                } else if hit(self.layout.dislike_button, column, row) {
                    self.controller.dislike(now);
                } else if hit(self.layout.table, column, row) {
                    self.focus = Focus::Table;
                    let toggle = mouse.modifiers.contains(KeyModifiers::CONTROL);
                    let action =
                        self.table
                            .click(column, row, toggle, self.controller.model().incoming());
                    self.apply_table_action(action);
                } else if hit(self.layout.card_pane, column, row) {
                    self.focus = Focus::Card;
                    let card = self.controller.card();
                    let token = card.chip_at(rel_x, rel_y).map(|c| c.token.clone());
                    let on_card = card.contains(rel_x, rel_y);
                    if let Some(token) = token {
                        self.controller.select_word(&token);
                    } else if on_card {
                        self.controller
                            .press(i32::from(column), i32::from(row), now);
                    }
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                self.controller.drag(i32::from(column), i32::from(row), now);
            }
            MouseEventKind::Up(MouseButton::Left) => {
                self.controller
                    .release(i32::from(column), i32::from(row), now);
            }
            MouseEventKind::Down(MouseButton::Right) => {
                if hit(self.layout.table, column, row) {
                    self.focus = Focus::Table;
                    self.table
                        .right_click(column, row, self.controller.model().incoming());
                }
            }
            MouseEventKind::ScrollDown if hit(self.layout.table, column, row) => {
                self.table.scroll(1, self.controller.model().incoming());
            }
            MouseEventKind::ScrollUp if hit(self.layout.table, column, row) => {
                self.table.scroll(-1, self.controller.model().incoming());
            }
            _ => {}
        }
    }

    /// Stops timers, flushes the piles and saves window state. Returns how
    /// many writes failed.
    pub fn teardown(&mut self) -> usize {
        let mut failures = self.controller.shutdown().len();
        self.images.shutdown();
        if let Err(e) = self.settings.save() {
            warn!("could not save settings: {}", e);
            failures += 1;
        }
        failures
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("Failed to create terminal")
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        let now = app.now_ms();
        app.pump(now);
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(FRAME)? {
            app.handle_event(event::read()?);
        }
        if app.should_quit() {
            return Ok(());
        }
    }
}

/// Runs the interactive UI until the user exits. The piles are flushed
/// even when the loop fails.
pub fn run(config: &Config, settings: SettingsStore) -> Result<()> {
    let client = crate::feeds::home_timeline::build_client();
    let fetcher = build_fetcher(config, &settings, client.clone());
    let mut app = App::new(config, settings, fetcher, client)?;

    let mut terminal = setup_terminal()?;
    app.start(config.ui.fetch_on_start);
    let result = run_loop(&mut terminal, &mut app);
    let restored = restore_terminal(&mut terminal);
    finish(&mut app, result, restored)
}

/// Flushes the app whatever happened to the loop or the terminal, then
/// reports the first failure.
fn finish(app: &mut App, result: Result<()>, restored: Result<()>) -> Result<()> {
    if let Err(e) = &restored {
        error!("could not restore the terminal: {:#}", e);
    }
    let failures = app.teardown();
    if failures > 0 {
        eprintln!(
            "{} file(s) could not be saved; see the log for details",
            failures
        );
    }
    info!("exited");
    result.and(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::feeds::FetchCursor;
    use crate::post::Post;
    use crate::triage::CardState;
    use async_trait::async_trait;
    use ratatui::layout::Rect;
    use tempfile::tempdir;

    struct Unlinked;

    #[async_trait]
    impl TimelineFetcher for Unlinked {
        fn is_linked(&self) -> bool {
            false
        }

        async fn fetch(&self, _cursor: FetchCursor) -> crate::error::Result<Vec<Post>> {
            Err(Error::AuthMissing)
        }
    }

    fn app(dir: &std::path::Path) -> App {
        let mut config = Config::default();
        config.storage.data_dir = Some(dir.to_path_buf());
        let settings = SettingsStore::open(dir).unwrap();
        let mut app =
            App::new(&config, settings, Arc::new(Unlinked), reqwest::Client::new()).unwrap();
        app.layout = ScreenLayout::compute(Rect::new(0, 0, 120, 40), 50);
        app
    }

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_refresh_key_shows_status_then_expires() {
        let dir = tempdir().unwrap();
        let mut app = app(dir.path());
        app.handle_event(press(KeyCode::Char('r')));
        assert_eq!(
            app.status_message(),
            Some("Application is not linked to Twitter.")
        );
        app.pump(app.now_ms() + 3_000);
        assert_eq!(app.status_message(), None);
    }

    #[test]
    fn test_warning_swallows_keys_until_dismissed() {
        let dir = tempdir().unwrap();
        let mut app = app(dir.path());
        app.warning = Some(Warning {
            title: "t".to_string(),
            body: "b".to_string(),
        });
        app.handle_event(press(KeyCode::Char('q')));
        assert!(!app.should_quit());
        app.handle_event(press(KeyCode::Enter));
        assert!(app.warning.is_none());
        app.handle_event(press(KeyCode::Char('q')));
        assert!(app.should_quit());
    }

    #[test]
    fn test_like_key_classifies() {
        let dir = tempdir().unwrap();
        let mut app = app(dir.path());
        app.controller
            .on_fetch_ok(vec![Post::new(2, "b", "x"), Post::new(1, "a", "x")], 0);
        app.handle_event(press(KeyCode::Char('l')));
        assert!(matches!(app.controller.state(), CardState::Dismissing(_)));
        assert_eq!(app.controller.model().liked().ids(), vec![2]);
    }

    #[test]
    fn test_tab_and_table_delete() {
        let dir = tempdir().unwrap();
        let mut app = app(dir.path());
        app.controller.on_fetch_ok(
            vec![
                Post::new(3, "c", "x"),
                Post::new(2, "b", "x"),
                Post::new(1, "a", "x"),
            ],
            0,
        );
        app.handle_event(press(KeyCode::Tab));
        assert_eq!(app.focus, Focus::Table);
        app.handle_event(press(KeyCode::Char('d')));
        assert_eq!(app.controller.model().incoming().ids(), vec![1]);
        assert_eq!(app.controller.model().current().map(|p| p.id), Some(3));
    }

    #[test]
    fn test_finish_flushes_when_terminal_restore_fails() {
        let dir = tempdir().unwrap();
        let mut app = app(dir.path());
        app.controller
            .on_fetch_ok(vec![Post::new(2, "b", "x"), Post::new(1, "a", "x")], 0);
        app.handle_event(press(KeyCode::Char('l')));

        let result = finish(&mut app, Ok(()), Err(anyhow::anyhow!("terminal gone")));
        assert!(result.is_err());
        assert!(app.controller.is_torn_down());
        let mut store = PostStore::new(dir.path(), "");
        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.liked.ids(), vec![2]);
        assert_eq!(snapshot.incoming.ids(), vec![1]);
    }

    #[test]
    fn test_split_is_clamped_and_saved() {
        let dir = tempdir().unwrap();
        let mut app = app(dir.path());
        for _ in 0..20 {
            app.handle_event(press(KeyCode::Char(']')));
        }
        assert_eq!(app.card_percent(), 80);
        assert_eq!(app.teardown(), 0);
        let reopened = SettingsStore::open(dir.path()).unwrap();
        assert_eq!(reopened.window().card_percent, 80);
    }
}
