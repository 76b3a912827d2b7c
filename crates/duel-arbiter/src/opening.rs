//! Randomized opening prefixes.
//!
//! Each game starts with a short sequence of uniformly-random legal moves so
//! that repeated games between deterministic engines can diverge. The prefix
//! is built once per game on a private board and both engines are launched
//! from the resulting position, so they experience the same opening.

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::board::Board;

/// The randomized opening ran into a position with no legal moves.
#[derive(Error, Debug)]
#[error("no legal moves after {0} opening plies")]
pub struct DeadPosition(pub u32);

/// Applies `plies` uniformly-random legal moves to `board`, returning them
/// in coordinate notation.
///
/// Deterministic under a seeded `Rng`.
///
/// # Errors
///
/// Returns [`DeadPosition`] if the position runs out of legal moves before
/// the prefix is complete; the game cannot be started from a finished
/// position.
pub fn randomize_opening<R: Rng>(
    board: &mut Board,
    plies: u32,
    rng: &mut R,
) -> Result<Vec<String>, DeadPosition> {
    let mut prefix = Vec::with_capacity(plies as usize);
    for ply in 0..plies {
        let legal = board.legal_moves();
        let mv = legal.choose(rng).ok_or(DeadPosition(ply))?.clone();
        prefix.push(board.uci_of(&mv));
        board.play(&mv);
    }
    Ok(prefix)
}
