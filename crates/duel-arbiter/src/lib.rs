//! Duel Arbiter - drives engine-vs-engine chess matches.
//!
//! This crate runs N complete games between two independently-built chess
//! engine processes over a private line-oriented control protocol, enforcing
//! per-move time limits, randomized openings, and clean process teardown,
//! and tallies the results into a final score.
//!
//! # Modules
//!
//! - [`process`] - engine subprocess handle with bounded-wait line reads
//! - [`protocol`] - the control protocol and per-game session state machine
//! - [`board`] - rules-aware position wrapper used for move validation
//! - [`opening`] - randomized opening prefixes
//! - [`pgn`] - game transcript generation and persistence
//! - [`arena`] - the match loop and score tallying
//! - [`config`] - match configuration and `duel.toml` loading

pub mod arena;
pub mod board;
pub mod config;
pub mod opening;
pub mod pgn;
pub mod process;
pub mod protocol;
