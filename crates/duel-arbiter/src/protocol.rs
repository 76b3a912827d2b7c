//! Control-protocol session between two engine processes.
//!
//! The protocol is line-oriented text, one message per line:
//!
//! 1. **Handshake** — the arbiter sends each engine its opponent's color as
//!    a single token; the engine acknowledges with one line (content is
//!    ignored, only presence matters).
//! 2. **Move turn** — the engine to move emits its move in coordinate
//!    notation, then the resulting FEN on a second line. The FEN echo is
//!    logged for verification but never advances arbiter state; the board
//!    adapter does.
//! 3. **Opponent notification** — the arbiter validates and applies the
//!    move, forwards it verbatim to the other engine, and consumes that
//!    engine's two-line acknowledgment pair before flipping the turn.
//! 4. **Terminal signal** — a line whose length is neither 4 nor 5 announces
//!    the end of the game (`Draw...`, `White...`, `Black...`), or cancels it
//!    if unrecognized.
//!
//! [`Session::play`] drives the exchange as an explicit state machine and
//! guarantees both processes are terminated on every exit path.

use std::fmt;
use std::time::Duration;

use shakmaty::Color;

use crate::board::{Board, MoveError};
use crate::process::{EngineProcess, ReadOutcome};

/// Color-token encoding used by the engine build under test.
///
/// The two observed engine generations disagree on the handshake token;
/// the arbiter treats it as a configurable dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `"w"` / `"b"` color tokens.
    #[default]
    Letters,
    /// `"0"` (white) / `"1"` (black) color tokens.
    Digits,
}

impl Dialect {
    /// The handshake token for `color` in this dialect.
    pub fn color_token(self, color: Color) -> &'static str {
        match (self, color) {
            (Dialect::Letters, Color::White) => "w",
            (Dialect::Letters, Color::Black) => "b",
            (Dialect::Digits, Color::White) => "0",
            (Dialect::Digits, Color::Black) => "1",
        }
    }
}

/// Why a game was canceled rather than decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// An engine executable could not be spawned.
    Spawn,
    /// Game setup failed before the handshake (e.g. the randomized opening
    /// ran into a position with no legal moves).
    Setup,
    /// The handshake acknowledgment did not arrive in time.
    Handshake,
    /// No reply within the per-move window.
    Timeout,
    /// A 4/5-character reply that is not a legal move.
    IllegalMove,
    /// A malformed reply or an unrecognized terminal line.
    ProtocolViolation,
    /// An engine process exited or closed its pipes mid-game.
    EngineExited,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CancelReason::Spawn => "spawn failure",
            CancelReason::Setup => "setup failure",
            CancelReason::Handshake => "handshake timeout",
            CancelReason::Timeout => "timeout",
            CancelReason::IllegalMove => "illegal move",
            CancelReason::ProtocolViolation => "protocol violation",
            CancelReason::EngineExited => "engine exited",
        };
        f.write_str(text)
    }
}

/// The outcome of one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    WhiteWins,
    BlackWins,
    Draw,
    /// The game produced no result; the reason separates engine-strength
    /// signal from infrastructure noise.
    Canceled(CancelReason),
}

impl fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameOutcome::WhiteWins => f.write_str("white wins"),
            GameOutcome::BlackWins => f.write_str("black wins"),
            GameOutcome::Draw => f.write_str("draw"),
            GameOutcome::Canceled(reason) => write!(f, "canceled ({})", reason),
        }
    }
}

/// What a terminal (non-move) line announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    Draw,
    WhiteWins,
    BlackWins,
    /// Unrecognized content, including an empty line.
    Uninformative,
}

/// Classification of one engine reply line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Length 4 or 5: a move candidate, still subject to validation.
    MoveCandidate,
    /// Any other length: a game-end announcement.
    Terminal(TerminalKind),
}

/// Classifies an engine reply line.
///
/// Lines of length 4 or 5 are always move candidates, never terminal
/// signals; everything else is terminal, recognized by prefix.
pub fn classify_reply(line: &str) -> Reply {
    if line.len() == 4 || line.len() == 5 {
        return Reply::MoveCandidate;
    }
    Reply::Terminal(if line.starts_with("Draw") {
        TerminalKind::Draw
    } else if line.starts_with("White") {
        TerminalKind::WhiteWins
    } else if line.starts_with("Black") {
        TerminalKind::BlackWins
    } else {
        TerminalKind::Uninformative
    })
}

/// Per-game parameters the session needs from the match configuration.
#[derive(Debug, Clone)]
pub struct SessionParams {
    /// Bound on every per-move read (move line, FEN echo, ack pair):
    /// the per-move time limit plus a grace margin.
    pub move_timeout: Duration,
    /// Bound on each handshake acknowledgment.
    pub handshake_timeout: Duration,
    /// Plies after which the game is adjudicated a draw; 0 disables the cap.
    pub max_plies: u32,
    pub dialect: Dialect,
    /// Echo moves and FEN lines to stdout as they arrive.
    pub print_moves: bool,
}

/// A finished game: its outcome and the moves exchanged over the protocol
/// (the randomized opening prefix is not included).
#[derive(Debug)]
pub struct PlayedGame {
    pub outcome: GameOutcome,
    pub moves: Vec<String>,
}

/// Session state. Turn ownership strictly alternates: exactly one engine is
/// awaiting a reply at any instant, and the idle engine is never read.
enum State {
    Handshaking,
    AwaitingMove(Color),
    ApplyingMove(Color, String),
    NotifyingOpponent(Color, String),
    Terminal(GameOutcome),
}

/// Drives one game between two engine processes.
pub struct Session<'a> {
    params: &'a SessionParams,
    board: Board,
    moves: Vec<String>,
}

fn by_color<'e>(
    white: &'e mut EngineProcess,
    black: &'e mut EngineProcess,
    color: Color,
) -> &'e mut EngineProcess {
    match color {
        Color::White => white,
        Color::Black => black,
    }
}

impl<'a> Session<'a> {
    /// Creates a session over a board already advanced past the opening
    /// prefix. Both engines must have been launched from this position.
    pub fn new(params: &'a SessionParams, board: Board) -> Self {
        Self {
            params,
            board,
            moves: Vec::new(),
        }
    }

    /// Plays the game to completion.
    ///
    /// Consumes both handles; they are terminated on every exit path before
    /// this returns, including all cancellation paths.
    pub fn play(mut self, mut white: EngineProcess, mut black: EngineProcess) -> PlayedGame {
        let mut state = State::Handshaking;
        loop {
            state = match state {
                State::Handshaking => self.handshake(&mut white, &mut black),
                State::AwaitingMove(color) => {
                    let active = by_color(&mut white, &mut black, color);
                    self.await_move(active, color)
                }
                State::ApplyingMove(color, text) => self.apply_move(color, text),
                State::NotifyingOpponent(color, text) => {
                    let idle = by_color(&mut white, &mut black, !color);
                    self.notify_opponent(idle, color, text)
                }
                State::Terminal(outcome) => {
                    white.terminate();
                    black.terminate();
                    return PlayedGame {
                        outcome,
                        moves: self.moves,
                    };
                }
            };
        }
    }

    /// Sends each engine its opponent's color token and waits for the
    /// one-line readiness acknowledgment.
    fn handshake(&mut self, white: &mut EngineProcess, black: &mut EngineProcess) -> State {
        for (engine, own) in [(white, Color::White), (black, Color::Black)] {
            let token = self.params.dialect.color_token(!own);
            if engine.send_line(token).is_err() {
                return State::Terminal(GameOutcome::Canceled(CancelReason::EngineExited));
            }
            match engine.read_line(self.params.handshake_timeout) {
                ReadOutcome::Line(_) => {}
                ReadOutcome::TimedOut => {
                    tracing::warn!(color = ?own, "handshake acknowledgment timed out");
                    return State::Terminal(GameOutcome::Canceled(CancelReason::Handshake));
                }
                ReadOutcome::Closed => {
                    return State::Terminal(GameOutcome::Canceled(CancelReason::EngineExited))
                }
            }
        }
        State::AwaitingMove(self.board.turn())
    }

    /// Waits for the active engine's move line and its FEN echo.
    fn await_move(&mut self, active: &mut EngineProcess, color: Color) -> State {
        let line = match active.read_line(self.params.move_timeout) {
            ReadOutcome::Line(line) => line,
            ReadOutcome::TimedOut => {
                tracing::warn!(color = ?color, "no reply within the move window");
                return State::Terminal(GameOutcome::Canceled(CancelReason::Timeout));
            }
            ReadOutcome::Closed => {
                return State::Terminal(GameOutcome::Canceled(CancelReason::EngineExited))
            }
        };

        match classify_reply(&line) {
            Reply::Terminal(kind) => {
                tracing::info!(line = %line, "terminal signal");
                State::Terminal(match kind {
                    TerminalKind::Draw => GameOutcome::Draw,
                    TerminalKind::WhiteWins => GameOutcome::WhiteWins,
                    TerminalKind::BlackWins => GameOutcome::BlackWins,
                    TerminalKind::Uninformative => {
                        GameOutcome::Canceled(CancelReason::ProtocolViolation)
                    }
                })
            }
            Reply::MoveCandidate => match active.read_line(self.params.move_timeout) {
                ReadOutcome::Line(fen) => {
                    if self.params.print_moves {
                        println!("{}", line);
                        println!("{}", fen);
                    } else {
                        tracing::debug!(mv = %line, fen = %fen, "received move");
                    }
                    State::ApplyingMove(color, line)
                }
                ReadOutcome::TimedOut => State::Terminal(GameOutcome::Canceled(CancelReason::Timeout)),
                ReadOutcome::Closed => {
                    State::Terminal(GameOutcome::Canceled(CancelReason::EngineExited))
                }
            },
        }
    }

    /// Validates the move against the board adapter and applies it.
    fn apply_move(&mut self, color: Color, text: String) -> State {
        match self.board.play_uci(&text) {
            Ok(()) => {
                self.moves.push(text.clone());
                if self.params.max_plies > 0 && self.moves.len() as u32 >= self.params.max_plies {
                    tracing::info!(plies = self.moves.len(), "ply cap reached, adjudicating draw");
                    return State::Terminal(GameOutcome::Draw);
                }
                State::NotifyingOpponent(color, text)
            }
            Err(MoveError::Unparseable(text)) => {
                tracing::warn!(mv = %text, "unparseable move");
                State::Terminal(GameOutcome::Canceled(CancelReason::ProtocolViolation))
            }
            Err(MoveError::Illegal(text)) => {
                tracing::warn!(mv = %text, "illegal move");
                State::Terminal(GameOutcome::Canceled(CancelReason::IllegalMove))
            }
        }
    }

    /// Forwards the applied move to the idle engine and consumes its
    /// two-line acknowledgment pair.
    fn notify_opponent(&mut self, idle: &mut EngineProcess, color: Color, text: String) -> State {
        if idle.send_line(&text).is_err() {
            return State::Terminal(GameOutcome::Canceled(CancelReason::EngineExited));
        }
        let idle_color = !color;
        for _ in 0..2 {
            match idle.read_line(self.params.move_timeout) {
                ReadOutcome::Line(_) => {}
                ReadOutcome::TimedOut => {
                    tracing::warn!(color = ?idle_color, "acknowledgment pair timed out");
                    return State::Terminal(GameOutcome::Canceled(CancelReason::Timeout));
                }
                ReadOutcome::Closed => {
                    return State::Terminal(GameOutcome::Canceled(CancelReason::EngineExited))
                }
            }
        }
        State::AwaitingMove(!color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_move_lengths_are_never_terminal() {
        assert_eq!(classify_reply("e2e4"), Reply::MoveCandidate);
        assert_eq!(classify_reply("e7e8q"), Reply::MoveCandidate);
        // Length gate applies before prefix recognition.
        assert_eq!(classify_reply("Draw"), Reply::MoveCandidate);
        assert_eq!(classify_reply("White"), Reply::MoveCandidate);
        assert_eq!(classify_reply("Black"), Reply::MoveCandidate);
    }

    #[test]
    fn test_terminal_prefixes_are_recognized() {
        assert_eq!(
            classify_reply("Draw by repetition"),
            Reply::Terminal(TerminalKind::Draw)
        );
        assert_eq!(
            classify_reply("White wins by checkmate"),
            Reply::Terminal(TerminalKind::WhiteWins)
        );
        assert_eq!(
            classify_reply("Black wins on time"),
            Reply::Terminal(TerminalKind::BlackWins)
        );
    }

    #[test]
    fn test_unrecognized_terminal_lines_are_uninformative() {
        assert_eq!(classify_reply(""), Reply::Terminal(TerminalKind::Uninformative));
        assert_eq!(
            classify_reply("resignation"),
            Reply::Terminal(TerminalKind::Uninformative)
        );
    }

    #[test]
    fn test_dialect_tokens() {
        assert_eq!(Dialect::Letters.color_token(Color::White), "w");
        assert_eq!(Dialect::Letters.color_token(Color::Black), "b");
        assert_eq!(Dialect::Digits.color_token(Color::White), "0");
        assert_eq!(Dialect::Digits.color_token(Color::Black), "1");
    }

    #[test]
    fn test_outcome_display_includes_cancel_reason() {
        let outcome = GameOutcome::Canceled(CancelReason::IllegalMove);
        assert_eq!(outcome.to_string(), "canceled (illegal move)");
        assert_eq!(GameOutcome::Draw.to_string(), "draw");
    }

    proptest! {
        /// Any line whose length is neither 4 nor 5 classifies as terminal,
        /// for both engines symmetrically (classification is engine-blind).
        #[test]
        fn prop_non_move_lengths_are_terminal(line in "[ -~]{0,3}|[ -~]{6,40}") {
            prop_assert!(matches!(classify_reply(&line), Reply::Terminal(_)));
        }

        /// Lines of length 4 or 5 are always move candidates.
        #[test]
        fn prop_move_lengths_are_candidates(line in "[ -~]{4,5}") {
            prop_assert_eq!(classify_reply(&line), Reply::MoveCandidate);
        }
    }
}
