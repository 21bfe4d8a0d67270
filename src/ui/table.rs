use std::collections::HashSet;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, ListState, Row, Table, TableState},
    Frame,
};

use crate::images::ImageLoader;
use crate::post::{Post, PostSet};
use crate::settings::COLUMN_COUNT;
use crate::ui::thumbnail_lines;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Delete,
    Evaluate,
}

impl MenuItem {
    pub const ALL: [MenuItem; 2] = [MenuItem::Delete, MenuItem::Evaluate];

    pub fn label(self) -> &'static str {
        match self {
            MenuItem::Delete => "Delete",
            MenuItem::Evaluate => "Evaluate",
        }
    }
}

/// Popup menu anchored at a screen cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextMenu {
    pub column: u16,
    pub row: u16,
    pub highlighted: usize,
}

impl ContextMenu {
    const WIDTH: u16 = 12;

    pub fn area(&self, bounds: Rect) -> Rect {
        let height = MenuItem::ALL.len() as u16 + 2;
        let right = bounds.x + bounds.width;
        let bottom = bounds.y + bounds.height;
        let x = self.column.min(right.saturating_sub(Self::WIDTH)).max(bounds.x);
        let y = self.row.min(bottom.saturating_sub(height)).max(bounds.y);
        Rect::new(x, y, Self::WIDTH.min(bounds.width), height.min(bounds.height))
    }

    /// The item under a screen cell, if the cell is inside the menu.
    pub fn item_at(&self, bounds: Rect, column: u16, row: u16) -> Option<MenuItem> {
        let area = self.area(bounds);
        if column <= area.x || column >= area.x + area.width.saturating_sub(1) {
            return None;
        }
        let index = row.checked_sub(area.y + 1)? as usize;
        MenuItem::ALL.get(index).copied()
    }
}

/// What the table wants the controller to do with some incoming rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableAction {
    Delete(Vec<usize>),
    Evaluate(Vec<usize>),
}

impl TableAction {
    fn for_item(item: MenuItem, rows: Vec<usize>) -> Self {
        match item {
            MenuItem::Delete => TableAction::Delete(rows),
            MenuItem::Evaluate => TableAction::Evaluate(rows),
        }
    }
}

/// Rows of the incoming pile. Selection is kept by post id so it survives
/// merges that shift rows around.
#[derive(Debug, Default)]
pub struct IncomingTable {
    cursor: usize,
    selected: HashSet<i64>,
    offset: usize,
    menu: Option<ContextMenu>,
    area: Rect,
}

impl IncomingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_selected(&self, id: i64) -> bool {
        self.selected.contains(&id)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn menu(&self) -> Option<&ContextMenu> {
        self.menu.as_ref()
    }

    /// Screen area of the last render.
    pub fn area(&self) -> Rect {
        self.area
    }

    /// Forgets selections for posts that left the pile and keeps the cursor
    /// in range.
    pub fn sync(&mut self, posts: &PostSet) {
        self.selected.retain(|id| posts.contains(*id));
        self.cursor = self.cursor.min(posts.len().saturating_sub(1));
    }

    pub fn move_cursor(&mut self, delta: isize, posts: &PostSet) {
        if posts.is_empty() {
            self.cursor = 0;
            return;
        }
        let last = posts.len() - 1;
        self.cursor = self.cursor.saturating_add_signed(delta).min(last);
    }

    pub fn toggle_cursor(&mut self, posts: &PostSet) {
        if let Some(post) = posts.get(self.cursor) {
            if !self.selected.remove(&post.id) {
                self.selected.insert(post.id);
            }
        }
    }

    /// Selected row indices, or the cursor row when nothing is selected.
    pub fn target_rows(&self, posts: &PostSet) -> Vec<usize> {
        let rows: Vec<usize> = posts
            .iter()
            .enumerate()
            .filter(|(_, p)| self.selected.contains(&p.id))
            .map(|(i, _)| i)
            .collect();
        if !rows.is_empty() {
            return rows;
        }
        if self.cursor < posts.len() {
            vec![self.cursor]
        } else {
            Vec::new()
        }
    }

    pub fn open_menu(&mut self, column: u16, row: u16) {
        self.menu = Some(ContextMenu {
            column,
            row,
            highlighted: 0,
        });
    }

    pub fn close_menu(&mut self) {
        self.menu = None;
    }

    fn finish(&mut self, action: TableAction) -> Option<TableAction> {
        self.menu = None;
        if let TableAction::Delete(_) = action {
            self.selected.clear();
        }
        match &action {
            TableAction::Delete(rows) | TableAction::Evaluate(rows) if rows.is_empty() => None,
            _ => Some(action),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent, posts: &PostSet) -> Option<TableAction> {
        if let Some(menu) = self.menu.as_mut() {
            match key.code {
                KeyCode::Up | KeyCode::Char('k') => {
                    menu.highlighted = menu.highlighted.saturating_sub(1);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    menu.highlighted = (menu.highlighted + 1).min(MenuItem::ALL.len() - 1);
                }
                KeyCode::Enter => {
                    let item = MenuItem::ALL[menu.highlighted];
                    let rows = self.target_rows(posts);
                    return self.finish(TableAction::for_item(item, rows));
                }
                KeyCode::Esc => self.menu = None,
                _ => {}
            }
            return None;
        }

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1, posts),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1, posts),
            KeyCode::PageUp => self.move_cursor(-10, posts),
            KeyCode::PageDown => self.move_cursor(10, posts),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.move_cursor(isize::MAX, posts),
            KeyCode::Char(' ') => self.toggle_cursor(posts),
            KeyCode::Char('a') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.selected = posts.iter().map(|p| p.id).collect();
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                let rows = self.target_rows(posts);
                return self.finish(TableAction::Delete(rows));
            }
            KeyCode::Char('m') => {
                let row = self.area.y + 2 + self.cursor.saturating_sub(self.offset) as u16;
                self.open_menu(self.area.x + 4, row);
            }
            _ => {}
        }
        None
    }

    /// Row index under a screen row of the last rendered area.
    pub fn row_at(&self, row: u16, posts: &PostSet) -> Option<usize> {
        // Border and header come first.
        let first = self.area.y + 2;
        if row < first || row >= self.area.y + self.area.height.saturating_sub(1) {
            return None;
        }
        let index = self.offset + usize::from(row - first);
        (index < posts.len()).then_some(index)
    }

    /// Left click: moves the cursor, or picks a menu item when the menu is
    /// open.
    pub fn click(
        &mut self,
        column: u16,
        row: u16,
        toggle: bool,
        posts: &PostSet,
    ) -> Option<TableAction> {
        if let Some(menu) = self.menu {
            let picked = menu.item_at(self.area, column, row);
            self.menu = None;
            let item = picked?;
            let rows = self.target_rows(posts);
            return self.finish(TableAction::for_item(item, rows));
        }
        if let Some(index) = self.row_at(row, posts) {
            self.cursor = index;
            if toggle {
                self.toggle_cursor(posts);
            }
        }
        None
    }

    /// Right click: moves the cursor to the row (keeping any selection that
    /// includes it) and opens the menu there.
    pub fn right_click(&mut self, column: u16, row: u16, posts: &PostSet) {
        let Some(index) = self.row_at(row, posts) else {
            return;
        };
        let id = posts.get(index).map(|p| p.id);
        if id.is_some_and(|id| !self.selected.contains(&id)) {
            self.selected.clear();
        }
        self.cursor = index;
        self.open_menu(column, row);
    }

    pub fn scroll(&mut self, delta: isize, posts: &PostSet) {
        self.move_cursor(delta, posts);
    }

    /// Row indices visible with the current scroll for a pane `height` tall.
    pub fn visible_rows(&self, height: u16, len: usize) -> std::ops::Range<usize> {
        let rows = usize::from(height.saturating_sub(3));
        let start = self.offset.min(len);
        start..(start + rows).min(len)
    }

    pub fn render(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        posts: &PostSet,
        images: &ImageLoader,
        widths: [u16; COLUMN_COUNT],
        focused: bool,
    ) {
        self.area = area;
        self.sync(posts);

        let border_style = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::White)
        };
        let title = match self.selected.len() {
            0 => format!(" Incoming ({}) ", posts.len()),
            n => format!(" Incoming ({}, {} selected) ", posts.len(), n),
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(border_style);

        let header = Row::new(vec!["", "Tweet", "Created", "Id"])
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

        let rows: Vec<Row> = posts
            .iter()
            .map(|post| self.row(post, images, widths[0]))
            .collect();

        let constraints: Vec<Constraint> = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| if i == 1 { Constraint::Min(w) } else { Constraint::Length(w) })
            .collect();

        let table = Table::new(rows, constraints)
            .header(header)
            .block(block)
            .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

        let mut state = TableState::default()
            .with_offset(self.offset)
            .with_selected((!posts.is_empty()).then_some(self.cursor));
        frame.render_stateful_widget(table, area, &mut state);
        self.offset = state.offset();

        if let Some(menu) = &self.menu {
            let menu_area = menu.area(area);
            let items: Vec<ListItem> = MenuItem::ALL
                .iter()
                .map(|item| ListItem::new(item.label()))
                .collect();
            let list = List::new(items)
                .block(Block::default().borders(Borders::ALL))
                .highlight_style(Style::default().fg(Color::Black).bg(Color::Yellow));
            let mut list_state = ListState::default();
            list_state.select(Some(menu.highlighted));
            frame.render_widget(Clear, menu_area);
            frame.render_stateful_widget(list, menu_area, &mut list_state);
        }
    }

    fn row<'a>(&self, post: &'a Post, images: &ImageLoader, thumb_cols: u16) -> Row<'a> {
        let thumb = post
            .profile_image_url()
            .and_then(|url| images.peek(url))
            .and_then(|t| thumbnail_lines(&t, thumb_cols, 1).into_iter().next())
            .unwrap_or_else(|| {
                Line::from(Span::styled("·", Style::default().fg(Color::DarkGray)))
            });

        let text = post.text.replace(['\n', '\r'], " ");
        let style = if self.selected.contains(&post.id) {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        Row::new(vec![
            Cell::from(thumb),
            Cell::from(text),
            Cell::from(post.created_at_display()),
            Cell::from(post.id.to_string()),
        ])
        .style(style)
    }
}
