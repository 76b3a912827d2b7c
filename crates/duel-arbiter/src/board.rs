//! Rules-aware board wrapper.
//!
//! The arbiter does not keep its own chess rules; it delegates legality and
//! position bookkeeping to `shakmaty`. Only the small surface the match loop
//! needs is exposed here: legal-move enumeration for opening randomization,
//! validated move application for engine replies, and FEN serialization for
//! engine launch arguments and transcripts.

use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position};
use thiserror::Error;

/// FEN of the standard chess starting position.
pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// The starting FEN could not be parsed into a legal position.
#[derive(Error, Debug)]
#[error("invalid FEN: {0}")]
pub struct InvalidFen(pub String);

/// An engine reply failed move validation.
#[derive(Error, Debug)]
pub enum MoveError {
    /// The reply does not parse as coordinate notation.
    #[error("unparseable move: {0}")]
    Unparseable(String),
    /// The reply parses but is not legal in the current position.
    #[error("illegal move: {0}")]
    Illegal(String),
}

/// A chess position with move application and FEN serialization.
#[derive(Debug, Clone)]
pub struct Board {
    pos: Chess,
}

impl Board {
    /// Creates a board from a FEN string.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFen`] if the string does not describe a legal
    /// standard-chess position.
    pub fn from_fen(fen: &str) -> Result<Self, InvalidFen> {
        let parsed: Fen = fen.parse().map_err(|_| InvalidFen(fen.to_string()))?;
        let pos: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|_| InvalidFen(fen.to_string()))?;
        Ok(Self { pos })
    }

    /// Creates a board at the standard starting position.
    pub fn startpos() -> Self {
        Self {
            pos: Chess::default(),
        }
    }

    /// The side to move.
    pub fn turn(&self) -> Color {
        self.pos.turn()
    }

    /// Serializes the current position to FEN.
    pub fn fen(&self) -> String {
        Fen::from_position(self.pos.clone(), EnPassantMode::Legal).to_string()
    }

    /// All legal moves in the current position.
    pub fn legal_moves(&self) -> Vec<Move> {
        self.pos.legal_moves().into_iter().collect()
    }

    /// Renders a move in coordinate notation (e.g. `e2e4`, `e7e8q`).
    pub fn uci_of(&self, mv: &Move) -> String {
        mv.to_uci(CastlingMode::Standard).to_string()
    }

    /// Applies a known-legal move (from [`Board::legal_moves`]).
    pub fn play(&mut self, mv: &Move) {
        self.pos.play_unchecked(mv);
    }

    /// Validates and applies an engine reply in coordinate notation.
    ///
    /// # Errors
    ///
    /// [`MoveError::Unparseable`] if the text is not coordinate notation,
    /// [`MoveError::Illegal`] if the move is not legal in this position.
    pub fn play_uci(&mut self, text: &str) -> Result<(), MoveError> {
        let parsed: UciMove = text
            .parse()
            .map_err(|_| MoveError::Unparseable(text.to_string()))?;
        let mv = parsed
            .to_move(&self.pos)
            .map_err(|_| MoveError::Illegal(text.to_string()))?;
        self.pos.play_unchecked(&mv);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startpos_has_twenty_legal_moves() {
        let board = Board::startpos();
        assert_eq!(board.legal_moves().len(), 20);
        assert_eq!(board.turn(), Color::White);
    }

    #[test]
    fn test_startpos_fen_round_trip() {
        let board = Board::from_fen(STARTPOS_FEN).expect("startpos FEN must parse");
        assert_eq!(board.fen(), STARTPOS_FEN);
    }

    #[test]
    fn test_invalid_fen_is_rejected() {
        assert!(Board::from_fen("not a fen").is_err());
        assert!(Board::from_fen("8/8/8/8/8/8/8/8 w - - 0 1").is_err());
    }

    #[test]
    fn test_play_uci_applies_legal_move() {
        let mut board = Board::startpos();
        board.play_uci("e2e4").expect("e2e4 is legal");
        assert_eq!(board.turn(), Color::Black);
        assert!(board.fen().contains("4P3"));
    }

    #[test]
    fn test_play_uci_rejects_unparseable_move() {
        let mut board = Board::startpos();
        match board.play_uci("z9z9") {
            Err(MoveError::Unparseable(text)) => assert_eq!(text, "z9z9"),
            other => panic!("expected Unparseable, got {:?}", other),
        }
    }

    #[test]
    fn test_play_uci_rejects_illegal_move() {
        let mut board = Board::startpos();
        match board.play_uci("e2e5") {
            Err(MoveError::Illegal(text)) => assert_eq!(text, "e2e5"),
            other => panic!("expected Illegal, got {:?}", other),
        }
    }

    #[test]
    fn test_promotion_notation_is_accepted() {
        let mut board =
            Board::from_fen("8/4P3/8/8/8/8/2k5/K7 w - - 0 1").expect("valid position");
        board.play_uci("e7e8q").expect("promotion is legal");
        assert!(board.fen().starts_with("4Q3/"));
    }
}
