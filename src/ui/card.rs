//! The swipeable card showing the current post.
//!
//! Geometry is kept relative to the card's rest rectangle, which the frame
//! layout hands in every draw. The controller moves the card with
//! [`CardView::set_offset`] and the three float animations; opacity is
//! separate and only changes when the controller says so.

use std::sync::Arc;

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::images::Thumbnail;
use crate::post::{Post, Verdict};
use crate::triage::animation::{Easing, Tween};
use crate::triage::ANIMATION_DURATION_MS;
use crate::ui::thumbnail_lines;

/// Rows above the chips: top border, thumbnail and a spacer.
const HEADER_ROWS: u16 = 1 + THUMB_ROWS + 1;
const THUMB_COLS: u16 = 8;
const THUMB_ROWS: u16 = 4;
const CHIP_BG: Color = Color::Rgb(0xff, 0xda, 0xb9);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardAnimation {
    FloatIn,
    FloatOut(Verdict),
    Unfloat,
}

/// A clickable word on the card, positioned relative to the chip area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chip {
    pub token: String,
    pub row: u16,
    pub col: u16,
    pub width: u16,
}

#[derive(Debug, Clone)]
pub struct CardView {
    post: Option<Post>,
    chips: Vec<Chip>,
    thumbnail: Option<Arc<Thumbnail>>,
    offset: (i32, i32),
    opacity: f64,
    width: u16,
    height: u16,
    animation: Option<(CardAnimation, Tween)>,
}

impl Default for CardView {
    fn default() -> Self {
        Self::new(60, 16)
    }
}

impl CardView {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            post: None,
            chips: Vec::new(),
            thumbnail: None,
            offset: (0, 0),
            opacity: 1.0,
            width: width.max(4),
            height: height.max(HEADER_ROWS + 1),
            animation: None,
        }
    }

    pub fn mount(&mut self, post: Post) {
        self.thumbnail = None;
        self.post = Some(post);
        self.reflow();
    }

    pub fn unmount(&mut self) {
        self.post = None;
        self.chips.clear();
        self.thumbnail = None;
        self.animation = None;
        self.offset = (0, 0);
    }

    pub fn post(&self) -> Option<&Post> {
        self.post.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.post.is_some()
    }

    pub fn chips(&self) -> &[Chip] {
        &self.chips
    }

    pub fn has_thumbnail(&self) -> bool {
        self.thumbnail.is_some()
    }

    pub fn set_thumbnail(&mut self, thumbnail: Option<Arc<Thumbnail>>) {
        self.thumbnail = thumbnail;
    }

    /// Tooltip text for the profile image.
    pub fn tooltip(&self) -> Option<String> {
        self.post.as_ref().map(|p| format!("@{}", p.author_name()))
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Updates the rest size. Chips are reflowed when the width changes.
    pub fn resize(&mut self, width: u16, height: u16) {
        let width = width.max(4);
        let height = height.max(HEADER_ROWS + 1);
        let reflow = width != self.width;
        self.width = width;
        self.height = height;
        if reflow {
            self.reflow();
        }
    }

    pub fn offset(&self) -> (i32, i32) {
        self.offset
    }

    pub fn offset_x(&self) -> i32 {
        self.offset.0
    }

    pub fn is_at_rest(&self) -> bool {
        self.offset == (0, 0)
    }

    /// Moves the card horizontally; vertical position snaps to rest.
    pub fn set_offset(&mut self, x: i32) {
        self.animation = None;
        self.offset = (x, 0);
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn animation(&self) -> Option<CardAnimation> {
        self.animation.map(|(kind, _)| kind)
    }

    fn start(&mut self, kind: CardAnimation, to: (i32, i32), easing: Easing, now_ms: u64) {
        let tween = Tween::new(self.offset, to, now_ms, ANIMATION_DURATION_MS, easing);
        self.animation = Some((kind, tween));
    }

    /// Rises from one card height below rest.
    pub fn float_in(&mut self, now_ms: u64) {
        self.offset = (0, i32::from(self.height));
        self.start(CardAnimation::FloatIn, (0, 0), Easing::InOutQuad, now_ms);
    }

    /// Leaves the screen to the right (liked) or left (disliked).
    pub fn float_out(&mut self, side: Verdict, now_ms: u64) {
        let distance = 3 * i32::from(self.width) / 2;
        let to = match side {
            Verdict::Liked => (distance, 0),
            Verdict::Disliked => (-distance, 0),
        };
        self.start(CardAnimation::FloatOut(side), to, Easing::InQuad, now_ms);
    }

    /// Slides back to rest.
    pub fn unfloat(&mut self, now_ms: u64) {
        self.start(CardAnimation::Unfloat, (0, 0), Easing::InOutQuad, now_ms);
    }

    pub fn stop_animation(&mut self) {
        self.animation = None;
    }

    /// Applies the running animation. Returns the animation that just
    /// finished, if any.
    pub fn advance(&mut self, now_ms: u64) -> Option<CardAnimation> {
        let (kind, tween) = self.animation?;
        self.offset = tween.value(now_ms);
        if tween.is_finished(now_ms) {
            self.offset = tween.end();
            self.animation = None;
            return Some(kind);
        }
        None
    }

    fn chip_area_width(&self) -> usize {
        usize::from(self.width.saturating_sub(2)).max(1)
    }

    fn reflow(&mut self) {
        self.chips = match &self.post {
            Some(post) => layout_chips(&post.text, self.chip_area_width()),
            None => Vec::new(),
        };
    }

    /// Whether a point relative to the rest rectangle's top-left corner hits
    /// the card at its current offset.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        if self.post.is_none() {
            return false;
        }
        let (ox, oy) = self.offset;
        let (x, y) = (x - ox, y - oy);
        x >= 0 && y >= 0 && x < i32::from(self.width) && y < i32::from(self.height)
    }

    /// The chip under a point given relative to the rest rectangle.
    pub fn chip_at(&self, x: i32, y: i32) -> Option<&Chip> {
        if !self.contains(x, y) {
            return None;
        }
        let cx = x - self.offset.0 - 1;
        let cy = y - self.offset.1 - i32::from(HEADER_ROWS);
        if cx < 0 || cy < 0 {
            return None;
        }
        self.chips.iter().find(|chip| {
            i32::from(chip.row) == cy
                && cx >= i32::from(chip.col)
                && cx < i32::from(chip.col + chip.width)
        })
    }

    /// Draws the card inside `rest`, shifted by the current offset and
    /// clipped to `bounds`.
    pub fn render(&self, frame: &mut Frame, rest: Rect, bounds: Rect, focused: bool) {
        let Some(post) = &self.post else {
            let empty = Paragraph::new(vec![
                Line::from(""),
                Line::from(Span::styled(
                    "No more tweets. Press r to refresh.",
                    Style::default().fg(Color::DarkGray),
                )),
            ])
            .alignment(ratatui::layout::Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(" Card "));
            frame.render_widget(empty, rest);
            return;
        };

        let Some(area) = shifted(rest, self.offset, bounds) else {
            return;
        };

        let shade = fade(Color::White, self.opacity);
        let border = if focused { Color::Cyan } else { Color::Gray };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(fade(border, self.opacity)))
            .title(format!(" {} ", post.author_name()));

        frame.render_widget(Clear, area);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let mut lines: Vec<Line> = match &self.thumbnail {
            Some(thumb) => thumbnail_lines(thumb, THUMB_COLS, THUMB_ROWS),
            None => {
                let placeholder = "░".repeat(usize::from(THUMB_COLS));
                (0..THUMB_ROWS)
                    .map(|_| {
                        Line::from(Span::styled(
                            placeholder.clone(),
                            Style::default().fg(Color::DarkGray),
                        ))
                    })
                    .collect()
            }
        };
        if let Some(first) = lines.first_mut() {
            first.spans.push(Span::styled(
                format!("  {}", self.tooltip().unwrap_or_default()),
                Style::default().fg(shade).add_modifier(Modifier::BOLD),
            ));
        }
        if let Some(second) = lines.get_mut(1) {
            second.spans.push(Span::styled(
                format!("  {}", post.created_at_display()),
                Style::default().fg(fade(Color::Gray, self.opacity)),
            ));
        }
        lines.push(Line::from(""));

        let chip_style = Style::default()
            .fg(fade(Color::Black, self.opacity))
            .bg(fade(CHIP_BG, self.opacity));
        let mut row = 0;
        let mut spans: Vec<Span> = Vec::new();
        let mut col = 0;
        for chip in &self.chips {
            if chip.row != row {
                lines.push(Line::from(std::mem::take(&mut spans)));
                row = chip.row;
                col = 0;
            }
            if chip.col > col {
                spans.push(Span::raw(" ".repeat(usize::from(chip.col - col))));
            }
            spans.push(Span::styled(chip.token.clone(), chip_style));
            col = chip.col + chip.width;
        }
        if !spans.is_empty() {
            lines.push(Line::from(spans));
        }

        // The card may hang over the pane edge while moving; draw the part
        // that is still visible.
        let paragraph =
            Paragraph::new(lines).scroll((0, skip_cols_for(rest, self.offset, bounds)));
        frame.render_widget(paragraph, inner);
    }
}

/// Columns cut off on the left when the card hangs past `bounds`.
fn skip_cols_for(rest: Rect, offset: (i32, i32), bounds: Rect) -> u16 {
    let left = i32::from(rest.x) + offset.0;
    (i32::from(bounds.x) - left).max(0) as u16
}

/// `rest` moved by `offset`, clipped to `bounds`. `None` when nothing of it
/// is visible.
fn shifted(rest: Rect, offset: (i32, i32), bounds: Rect) -> Option<Rect> {
    let left = i32::from(rest.x) + offset.0;
    let top = i32::from(rest.y) + offset.1;
    let right = left + i32::from(rest.width);
    let bottom = top + i32::from(rest.height);

    let x0 = left.max(i32::from(bounds.x));
    let y0 = top.max(i32::from(bounds.y));
    let x1 = right.min(i32::from(bounds.x + bounds.width));
    let y1 = bottom.min(i32::from(bounds.y + bounds.height));
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(Rect::new(x0 as u16, y0 as u16, (x1 - x0) as u16, (y1 - y0) as u16))
}

/// Blends `color` toward black by `opacity`.
fn fade(color: Color, opacity: f64) -> Color {
    let (r, g, b) = match color {
        Color::Rgb(r, g, b) => (r, g, b),
        Color::Black => (0, 0, 0),
        Color::White => (255, 255, 255),
        Color::Cyan => (0, 205, 205),
        Color::DarkGray => (96, 96, 96),
        _ => (192, 192, 192),
    };
    let k = opacity.clamp(0.0, 1.0);
    let scale = |c: u8| (f64::from(c) * k).round() as u8;
    Color::Rgb(scale(r), scale(g), scale(b))
}

/// Splits `text` on whitespace and flows the tokens into rows of at most
/// `width` columns, one space between chips.
pub fn layout_chips(text: &str, width: usize) -> Vec<Chip> {
    let width = width.max(1);
    let mut chips = Vec::new();
    let (mut row, mut col) = (0usize, 0usize);
    for token in text.split_whitespace() {
        let token_width = textwrap::core::display_width(token);
        // Overlong tokens get a row of their own and are clipped on render.
        if col > 0 && col + token_width > width {
            row += 1;
            col = 0;
        }
        chips.push(Chip {
            token: token.to_string(),
            row: row as u16,
            col: col as u16,
            width: token_width as u16,
        });
        col += token_width + 1;
    }
    chips
}
