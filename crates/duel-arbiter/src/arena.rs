//! Match loop: drives N games and accumulates the score.
//!
//! Games run strictly sequentially; each produces exactly one outcome that
//! is folded into the [`ScoreBoard`] before the next game begins. Per-game
//! failures (spawn errors, protocol violations, timeouts) cancel that game
//! only and never abort the remaining games.

use rand::Rng;
use shakmaty::Color;

use crate::board::Board;
use crate::config::MatchConfig;
use crate::opening;
use crate::pgn::{self, GameRecord};
use crate::process::EngineProcess;
use crate::protocol::{CancelReason, GameOutcome, PlayedGame, Session};

/// Which color engine 1 plays this game; engine 2 takes the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorAssignment {
    pub engine1: Color,
}

impl ColorAssignment {
    /// Fair-coin assignment, independent of prior games.
    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self {
            engine1: if rng.gen_bool(0.5) {
                Color::White
            } else {
                Color::Black
            },
        }
    }

    pub fn engine2(&self) -> Color {
        !self.engine1
    }
}

/// Aggregate score of a match. Counters are only ever incremented, once per
/// completed game; their sum equals the number of games completed so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreBoard {
    pub wins_engine1: u32,
    pub wins_engine2: u32,
    pub draws: u32,
    pub canceled: u32,
}

impl ScoreBoard {
    /// Folds one game's outcome into the counters, attributing color wins
    /// to engine identity through the game's color assignment.
    pub fn record(&mut self, outcome: GameOutcome, assignment: ColorAssignment) {
        match outcome {
            GameOutcome::WhiteWins => {
                if assignment.engine1 == Color::White {
                    self.wins_engine1 += 1;
                } else {
                    self.wins_engine2 += 1;
                }
            }
            GameOutcome::BlackWins => {
                if assignment.engine1 == Color::Black {
                    self.wins_engine1 += 1;
                } else {
                    self.wins_engine2 += 1;
                }
            }
            GameOutcome::Draw => self.draws += 1,
            GameOutcome::Canceled(_) => self.canceled += 1,
        }
    }

    /// Total games recorded, canceled ones included.
    pub fn total(&self) -> u32 {
        self.wins_engine1 + self.wins_engine2 + self.draws + self.canceled
    }
}

/// Runs the per-game loop over an immutable match configuration.
pub struct Arena<'a> {
    config: &'a MatchConfig,
}

impl<'a> Arena<'a> {
    pub fn new(config: &'a MatchConfig) -> Self {
        Self { config }
    }

    /// Plays all configured games and returns the final tally.
    ///
    /// All randomized decisions (openings, color assignment) draw from
    /// `rng`, so a seeded run is reproducible.
    pub fn run<R: Rng>(&self, rng: &mut R) -> ScoreBoard {
        let mut score = ScoreBoard::default();
        for index in 1..=self.config.games {
            let (outcome, assignment) = self.play_game(index, rng);
            score.record(outcome, assignment);
            match outcome {
                GameOutcome::Canceled(reason) => {
                    tracing::warn!(game = index, reason = %reason, "game canceled");
                }
                _ => {
                    tracing::info!(game = index, outcome = %outcome, "game finished");
                }
            }
        }
        score
    }

    fn play_game<R: Rng>(&self, index: u32, rng: &mut R) -> (GameOutcome, ColorAssignment) {
        let assignment = ColorAssignment::random(rng);

        let mut board = match Board::from_fen(&self.config.initial_fen) {
            Ok(board) => board,
            // The FEN was validated at startup; a failure here means the
            // config was mutated out from under us.
            Err(_) => return (GameOutcome::Canceled(CancelReason::Setup), assignment),
        };
        let prefix = match opening::randomize_opening(
            &mut board,
            self.config.random_plies_per_side * 2,
            rng,
        ) {
            Ok(prefix) => prefix,
            Err(e) => {
                tracing::warn!(game = index, error = %e, "opening randomization failed");
                return (GameOutcome::Canceled(CancelReason::Setup), assignment);
            }
        };
        if self.config.print_moves {
            for mv in &prefix {
                println!("{} (random)", mv);
            }
        }
        let start_fen = board.fen();

        let mut engine1 = match EngineProcess::spawn(
            &self.config.engine1.path,
            &self.config.launch_args(&self.config.engine1, &start_fen),
        ) {
            Ok(process) => process,
            Err(e) => {
                tracing::warn!(game = index, engine = %self.config.engine1.display_name(), error = %e, "spawn failed");
                return (GameOutcome::Canceled(CancelReason::Spawn), assignment);
            }
        };
        let engine2 = match EngineProcess::spawn(
            &self.config.engine2.path,
            &self.config.launch_args(&self.config.engine2, &start_fen),
        ) {
            Ok(process) => process,
            Err(e) => {
                engine1.terminate();
                tracing::warn!(game = index, engine = %self.config.engine2.display_name(), error = %e, "spawn failed");
                return (GameOutcome::Canceled(CancelReason::Spawn), assignment);
            }
        };

        let (white, black) = match assignment.engine1 {
            Color::White => (engine1, engine2),
            Color::Black => (engine2, engine1),
        };

        let params = self.config.session_params();
        let played = Session::new(&params, board).play(white, black);

        if self.should_save(&played) {
            self.save_game(index, assignment, &prefix, &played);
        }

        (played.outcome, assignment)
    }

    /// Games canceled before the first real move are not persisted unless
    /// marker transcripts are explicitly enabled.
    fn should_save(&self, played: &PlayedGame) -> bool {
        if !self.config.save_games {
            return false;
        }
        if matches!(played.outcome, GameOutcome::Canceled(_)) && played.moves.is_empty() {
            return self.config.save_canceled;
        }
        true
    }

    fn save_game(
        &self,
        index: u32,
        assignment: ColorAssignment,
        prefix: &[String],
        played: &PlayedGame,
    ) {
        let engine1_name = self.config.engine1.display_name();
        let engine2_name = self.config.engine2.display_name();
        let (white_name, black_name) = match assignment.engine1 {
            Color::White => (engine1_name, engine2_name),
            Color::Black => (engine2_name, engine1_name),
        };

        let mut moves = prefix.to_vec();
        moves.extend(played.moves.iter().cloned());

        let record = GameRecord {
            white_name,
            black_name,
            initial_fen: self.config.initial_fen.clone(),
            moves,
            outcome: played.outcome,
        };

        match pgn::write_game(&self.config.games_dir, index, &record) {
            Ok(path) => tracing::info!(game = index, path = %path.display(), "game saved"),
            Err(e) => tracing::warn!(game = index, error = %e, "failed to save game"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn white_assignment() -> ColorAssignment {
        ColorAssignment {
            engine1: Color::White,
        }
    }

    fn black_assignment() -> ColorAssignment {
        ColorAssignment {
            engine1: Color::Black,
        }
    }

    #[test]
    fn test_white_win_attribution_follows_assignment() {
        let mut score = ScoreBoard::default();
        score.record(GameOutcome::WhiteWins, white_assignment());
        assert_eq!(score.wins_engine1, 1);
        assert_eq!(score.wins_engine2, 0);

        score.record(GameOutcome::WhiteWins, black_assignment());
        assert_eq!(score.wins_engine1, 1);
        assert_eq!(score.wins_engine2, 1);
    }

    #[test]
    fn test_black_win_attribution_follows_assignment() {
        let mut score = ScoreBoard::default();
        score.record(GameOutcome::BlackWins, black_assignment());
        assert_eq!(score.wins_engine1, 1);

        score.record(GameOutcome::BlackWins, white_assignment());
        assert_eq!(score.wins_engine2, 1);
    }

    #[test]
    fn test_draws_and_cancellations_are_counted_separately() {
        let mut score = ScoreBoard::default();
        score.record(GameOutcome::Draw, white_assignment());
        score.record(
            GameOutcome::Canceled(CancelReason::Timeout),
            black_assignment(),
        );
        assert_eq!(score.draws, 1);
        assert_eq!(score.canceled, 1);
        assert_eq!(score.total(), 2);
    }

    #[test]
    fn test_assignment_covers_both_engines() {
        let assignment = white_assignment();
        assert_eq!(assignment.engine1, Color::White);
        assert_eq!(assignment.engine2(), Color::Black);
    }

    proptest! {
        /// The four counters always sum to the number of games recorded.
        #[test]
        fn prop_counters_sum_to_games_recorded(outcomes in proptest::collection::vec(0u8..6, 0..200)) {
            let mut score = ScoreBoard::default();
            for (i, code) in outcomes.iter().enumerate() {
                let outcome = match code {
                    0 => GameOutcome::WhiteWins,
                    1 => GameOutcome::BlackWins,
                    2 => GameOutcome::Draw,
                    3 => GameOutcome::Canceled(CancelReason::Timeout),
                    4 => GameOutcome::Canceled(CancelReason::Spawn),
                    _ => GameOutcome::Canceled(CancelReason::ProtocolViolation),
                };
                let assignment = if i % 2 == 0 { white_assignment() } else { black_assignment() };
                score.record(outcome, assignment);
            }
            prop_assert_eq!(score.total() as usize, outcomes.len());
        }
    }
}
