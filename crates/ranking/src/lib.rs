#![forbid(unsafe_code)]

//! Title resolution and ranking for spots and territories.
//!
//! A catch submitted at a spot may take over the spot's title (its "king").
//! Whoever holds the most titles inside a territory rules it. Everything in
//! here works against the narrow store traits in [`store`], so the same logic
//! runs on top of SQL or the in-process [`memory::MemoryStore`].

pub mod leaderboard;
pub mod memory;
pub mod models;
pub mod qualifier;
pub mod resolver;
pub mod service;
pub mod store;
pub mod territory;
pub mod units;

pub use models::*;
