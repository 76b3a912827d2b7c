//! Game transcript generation and persistence.
//!
//! One file per game, named by game index, written in PGN-style format:
//! header tags identifying which engine played which color, the starting
//! position when it differs from the standard one, and the result, followed
//! by numbered movetext in coordinate notation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::board::STARTPOS_FEN;
use crate::protocol::GameOutcome;

/// The accumulated transcript of one game.
///
/// `moves` holds the full ordered move list: the randomized opening prefix
/// followed by every move exchanged over the protocol.
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub white_name: String,
    pub black_name: String,
    /// The configured starting position (before the random prefix).
    pub initial_fen: String,
    pub moves: Vec<String>,
    pub outcome: GameOutcome,
}

/// The PGN result token for an outcome; canceled games record `*`.
pub fn result_token(outcome: GameOutcome) -> &'static str {
    match outcome {
        GameOutcome::WhiteWins => "1-0",
        GameOutcome::BlackWins => "0-1",
        GameOutcome::Draw => "1/2-1/2",
        GameOutcome::Canceled(_) => "*",
    }
}

impl GameRecord {
    /// Renders the transcript: tag pairs, blank line, movetext wrapped at
    /// 80 columns, result terminator.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let result = result_token(self.outcome);

        out.push_str("[Event \"Engine duel\"]\n");
        out.push_str("[Site \"local\"]\n");
        out.push_str(&format!("[Date \"{}\"]\n", Utc::now().format("%Y.%m.%d")));
        out.push_str(&format!("[White \"{}\"]\n", self.white_name));
        out.push_str(&format!("[Black \"{}\"]\n", self.black_name));
        if self.initial_fen != STARTPOS_FEN {
            out.push_str("[SetUp \"1\"]\n");
            out.push_str(&format!("[FEN \"{}\"]\n", self.initial_fen));
        }
        if let GameOutcome::Canceled(reason) = self.outcome {
            out.push_str(&format!("[Termination \"canceled: {}\"]\n", reason));
        }
        out.push_str(&format!("[Result \"{}\"]\n", result));
        out.push('\n');

        let mut move_text = String::new();
        for (i, mv) in self.moves.iter().enumerate() {
            if i % 2 == 0 {
                move_text.push_str(&format!("{}. ", i / 2 + 1));
            }
            move_text.push_str(mv);
            move_text.push(' ');
        }
        move_text.push_str(result);

        for chunk in move_text.as_bytes().chunks(80) {
            out.push_str(&String::from_utf8_lossy(chunk));
            out.push('\n');
        }

        out
    }
}

/// Writes the transcript for game `index` into `dir` as `Game<index>.pgn`.
///
/// The render is written to a temporary sibling first and renamed into
/// place, so an interrupted write never corrupts an existing file. Each game
/// gets its own file with an independent lifetime.
///
/// # Errors
///
/// Returns an `io::Error` if the directory cannot be created or the file
/// cannot be written.
pub fn write_game(dir: &Path, index: u32, record: &GameRecord) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("Game{}.pgn", index));
    let tmp = dir.join(format!("Game{}.pgn.tmp", index));
    fs::write(&tmp, record.render())?;
    fs::rename(&tmp, &path)?;
    Ok(path)
}
