pub mod card;
pub mod table;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Focus};
use crate::images::Thumbnail;
use crate::triage::CardState;

const LIKE_LABEL: &str = " Like ▶ ";
const DISLIKE_LABEL: &str = " ◀ Dislike ";
const REFRESH_LABEL: &str = " Refresh ";
const EXIT_LABEL: &str = " Exit ";

/// Screen regions of the last frame, used for mouse hit tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenLayout {
    pub refresh_button: Rect,
    pub exit_button: Rect,
    pub card_pane: Rect,
    pub card_rest: Rect,
    pub dislike_button: Rect,
    pub like_button: Rect,
    pub table: Rect,
    pub status: Rect,
}

impl ScreenLayout {
    /// Splits `area` into toolbar, card pane, table and status line, the
    /// card pane taking `card_percent` of the width.
    pub fn compute(area: Rect, card_percent: u16) -> Self {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(area);
        let (toolbar, body, status) = (rows[0], rows[1], rows[2]);

        let refresh_width = REFRESH_LABEL.chars().count() as u16;
        let exit_width = EXIT_LABEL.chars().count() as u16;
        let refresh_button = Rect::new(
            toolbar.x,
            toolbar.y,
            refresh_width.min(toolbar.width),
            toolbar.height,
        );
        let exit_button = Rect::new(
            toolbar.x + refresh_button.width + 1,
            toolbar.y,
            exit_width.min(toolbar.width.saturating_sub(refresh_button.width + 1)),
            toolbar.height,
        );

        let percent = card_percent.min(100);
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(percent),
                Constraint::Percentage(100 - percent),
            ])
            .split(body);
        let (card_pane, table) = (columns[0], columns[1]);

        let pane_parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(card_pane);
        let (card_space, buttons) = (pane_parts[0], pane_parts[1]);

        // A margin on each side leaves room for the card to move.
        let margin = (card_space.width / 8).max(1);
        let card_rest = Rect::new(
            card_space.x + margin,
            card_space.y,
            card_space.width.saturating_sub(2 * margin),
            card_space.height,
        );

        let dislike_width = DISLIKE_LABEL.chars().count() as u16;
        let like_width = LIKE_LABEL.chars().count() as u16;
        let gap = 2;
        let total = dislike_width + gap + like_width;
        let start = buttons.x + buttons.width.saturating_sub(total) / 2;
        let dislike_button = Rect::new(
            start,
            buttons.y,
            dislike_width.min(buttons.width),
            buttons.height,
        );
        let like_button = Rect::new(
            start + dislike_width + gap,
            buttons.y,
            like_width.min(buttons.width.saturating_sub(dislike_width + gap)),
            buttons.height,
        );

        Self {
            refresh_button,
            exit_button,
            card_pane: card_space,
            card_rest,
            dislike_button,
            like_button,
            table,
            status,
        }
    }
}

pub fn hit(rect: Rect, column: u16, row: u16) -> bool {
    column >= rect.x && column < rect.x + rect.width && row >= rect.y && row < rect.y + rect.height
}

/// Renders a thumbnail as `rows` lines of `cols` half-block cells, two
/// pixel rows per cell.
pub fn thumbnail_lines(thumb: &Thumbnail, cols: u16, rows: u16) -> Vec<Line<'static>> {
    let (w, h) = (thumb.width(), thumb.height());
    let cols = u32::from(cols.max(1));
    let pixel_rows = u32::from(rows.max(1)) * 2;
    (0..pixel_rows / 2)
        .map(|r| {
            let top_y = (2 * r) * h / pixel_rows;
            let bottom_y = (2 * r + 1) * h / pixel_rows;
            let spans: Vec<Span<'static>> = (0..cols)
                .map(|c| {
                    let x = c * w / cols;
                    let [tr, tg, tb] = thumb.pixel(x, top_y);
                    let [br, bg, bb] = thumb.pixel(x, bottom_y);
                    Span::styled(
                        "▀",
                        Style::default()
                            .fg(Color::Rgb(tr, tg, tb))
                            .bg(Color::Rgb(br, bg, bb)),
                    )
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn button(label: &str, enabled: bool, accent: Color) -> Paragraph<'static> {
    let style = if enabled {
        Style::default().fg(Color::Black).bg(accent).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray).bg(Color::Black)
    };
    Paragraph::new(Span::styled(label.to_string(), style))
}

pub fn draw(frame: &mut Frame, app: &mut App) {
    let layout = ScreenLayout::compute(frame.area(), app.card_percent());
    app.layout = layout;
    app.controller
        .card_mut()
        .resize(layout.card_rest.width, layout.card_rest.height);

    draw_toolbar(frame, app, &layout);
    draw_card_pane(frame, app, &layout);

    let widths = app.settings.column_widths();
    let focused = app.focus == Focus::Table;
    app.table.render(
        frame,
        layout.table,
        app.controller.model().incoming(),
        &app.images,
        widths,
        focused,
    );

    draw_status(frame, app, layout.status);

    if let Some(warning) = &app.warning {
        draw_warning(frame, &warning.title, &warning.body);
    }
}

fn draw_toolbar(frame: &mut Frame, app: &App, layout: &ScreenLayout) {
    frame.render_widget(
        button(REFRESH_LABEL, !app.controller.is_fetching(), Color::Cyan),
        layout.refresh_button,
    );
    frame.render_widget(button(EXIT_LABEL, true, Color::Gray), layout.exit_button);

    let account = match app.settings.screen_name() {
        "" => "not linked".to_string(),
        name => format!("@{}", name),
    };
    let model = app.controller.model();
    let counts = format!(
        "{}  incoming {}  liked {}  disliked {}  words {} ",
        account,
        model.incoming().len(),
        model.liked().len(),
        model.disliked().len(),
        app.controller.words().len(),
    );
    let x = layout.exit_button.x + layout.exit_button.width + 1;
    let toolbar_right = frame.area().x + frame.area().width;
    if x < toolbar_right {
        let area = Rect::new(x, layout.exit_button.y, toolbar_right - x, 1);
        frame.render_widget(
            Paragraph::new(Span::styled(counts, Style::default().fg(Color::DarkGray)))
                .alignment(Alignment::Right),
            area,
        );
    }
}

fn draw_card_pane(frame: &mut Frame, app: &App, layout: &ScreenLayout) {
    let focused = app.focus == Focus::Card;
    app.controller
        .card()
        .render(frame, layout.card_rest, layout.card_pane, focused);

    let enabled = app.controller.state().accepts_input();
    frame.render_widget(button(DISLIKE_LABEL, enabled, Color::LightRed), layout.dislike_button);
    frame.render_widget(button(LIKE_LABEL, enabled, Color::LightGreen), layout.like_button);
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let state = match app.controller.state() {
        CardState::Empty => "empty",
        CardState::AtRest => "ready",
        CardState::Dragging => "dragging",
        CardState::Coasting => "coasting",
        CardState::Dismissing(v) => v.label(),
        CardState::Returning => "returning",
    };
    let mut spans = vec![Span::styled(
        format!(" [{}] ", state),
        Style::default().fg(Color::Black).bg(Color::Gray),
    )];
    if let Some(message) = app.status_message() {
        spans.push(Span::raw(" "));
        spans.push(Span::raw(message.to_string()));
    } else {
        spans.push(Span::styled(
            " r refresh  h/l dislike/like  Tab focus  [ ] resize  q quit",
            Style::default().fg(Color::DarkGray),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn draw_warning(frame: &mut Frame, title: &str, body: &str) {
    let lines = body.lines().count().max(1) as u16;
    let area = centered(frame.area(), 60, lines + 4);
    let mut text: Vec<Line> = body.lines().map(|l| Line::from(l.to_string())).collect();
    text.push(Line::from(""));
    text.push(Line::from(Span::styled(
        "Enter to dismiss",
        Style::default().fg(Color::DarkGray),
    )));
    let popup = Paragraph::new(text)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(format!(" {} ", title))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red)),
        );
    frame.render_widget(Clear, area);
    frame.render_widget(popup, area);
}
