//! Terminal client for sorting a Twitter home timeline one card at a time.
//!
//! Swipe a card right to like it, left to dislike it; click words on the
//! card to collect them. Everything is kept in plain files in the data
//! directory.

pub mod app;
pub mod config;
pub mod error;
pub mod feeds;
pub mod images;
pub mod post;
pub mod settings;
pub mod store;
pub mod timeline;
pub mod triage;
pub mod ui;
pub mod words;

pub use error::{Error, Result};
