//! Match configuration and TOML config file loading.
//!
//! Two layers: [`DuelConfig`] is the optional on-disk `duel.toml` holding
//! named engine definitions and match defaults, and [`MatchConfig`] is the
//! fully-resolved, validated, immutable configuration one match runs with.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::{Board, STARTPOS_FEN};
use crate::protocol::{Dialect, SessionParams};

/// Errors that can occur when loading or validating configuration.
///
/// All of these are fatal to the whole run and are surfaced before any game
/// starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// Requested engine was not found in the configuration.
    #[error("engine not found in config: {0}")]
    EngineNotFound(String),
    /// The configured starting position is not a valid FEN.
    #[error("invalid starting FEN: {0}")]
    InvalidFen(String),
    /// The per-move time limit must be positive.
    #[error("per-move time limit must be positive")]
    ZeroMovetime,
}

/// Definition of one engine build.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineSpec {
    /// Path to the engine executable.
    pub path: PathBuf,
    /// Extra launch arguments, prepended to the protocol-mandated ones.
    #[serde(default)]
    pub args: Vec<String>,
    /// Display name for logs and transcripts; defaults to the file stem.
    #[serde(default)]
    pub name: Option<String>,
}

impl EngineSpec {
    /// A spec pointing straight at an executable, with no extras.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            name: None,
        }
    }

    /// The name used in logs and transcript headers.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Fully-resolved configuration for one match. Immutable once validated.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    pub engine1: EngineSpec,
    pub engine2: EngineSpec,
    /// Number of games to play.
    pub games: u32,
    /// Per-move time limit handed to the engines, in milliseconds.
    pub movetime_ms: u64,
    /// Grace added to every bounded read on top of the move time.
    pub timeout_margin_ms: u64,
    /// Bound on each handshake acknowledgment.
    pub handshake_timeout_ms: u64,
    /// Random opening plies per side (total prefix is twice this).
    pub random_plies_per_side: u32,
    /// Starting position for every game.
    pub initial_fen: String,
    /// Plies after which a game is adjudicated a draw; 0 disables the cap.
    pub max_plies: u32,
    pub dialect: Dialect,
    /// Echo moves and FEN lines to stdout as they arrive.
    pub print_moves: bool,
    /// Persist a transcript file per game.
    pub save_games: bool,
    /// Also persist marker transcripts for games canceled before any move.
    pub save_canceled: bool,
    /// Directory transcripts are written into.
    pub games_dir: PathBuf,
}

impl MatchConfig {
    /// Checks the run-level invariants that must hold before any game
    /// starts.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidFen`] if the starting position does not parse,
    /// [`ConfigError::ZeroMovetime`] if the per-move limit is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Board::from_fen(&self.initial_fen)
            .map_err(|_| ConfigError::InvalidFen(self.initial_fen.clone()))?;
        if self.movetime_ms == 0 {
            return Err(ConfigError::ZeroMovetime);
        }
        Ok(())
    }

    /// The bound applied to every per-move read.
    pub fn move_timeout(&self) -> Duration {
        Duration::from_millis(self.movetime_ms + self.timeout_margin_ms)
    }

    /// The bound applied to each handshake acknowledgment.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// The per-game parameter block handed to the protocol session.
    pub fn session_params(&self) -> SessionParams {
        SessionParams {
            move_timeout: self.move_timeout(),
            handshake_timeout: self.handshake_timeout(),
            max_plies: self.max_plies,
            dialect: self.dialect,
            print_moves: self.print_moves,
        }
    }

    /// Launch arguments for `spec` starting from `fen`: the engine's own
    /// extras, then `-q -t <ms> --fen <fields...>`.
    pub fn launch_args(&self, spec: &EngineSpec, fen: &str) -> Vec<String> {
        let mut args = spec.args.clone();
        args.push("-q".to_string());
        args.push("-t".to_string());
        args.push(self.movetime_ms.to_string());
        args.push("--fen".to_string());
        args.extend(fen.split_whitespace().map(str::to_string));
        args
    }
}

/// Match defaults loaded from the config file; every field has a default so
/// a partial (or absent) file works.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MatchDefaults {
    pub games: u32,
    pub movetime_ms: u64,
    pub timeout_margin_ms: u64,
    pub handshake_timeout_ms: u64,
    pub random_plies_per_side: u32,
    pub initial_fen: String,
    pub max_plies: u32,
    pub dialect: Dialect,
    pub save_games: bool,
    pub save_canceled: bool,
    pub games_dir: PathBuf,
}

impl Default for MatchDefaults {
    fn default() -> Self {
        Self {
            games: 10,
            movetime_ms: 100,
            timeout_margin_ms: 100,
            handshake_timeout_ms: 5000,
            random_plies_per_side: 2,
            initial_fen: STARTPOS_FEN.to_string(),
            max_plies: 512,
            dialect: Dialect::default(),
            save_games: true,
            save_canceled: false,
            games_dir: PathBuf::from("games"),
        }
    }
}

/// On-disk configuration (`duel.toml`): named engines plus match defaults.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct DuelConfig {
    /// Map of engine names to their definitions.
    #[serde(default)]
    pub engines: HashMap<String, EngineSpec>,
    #[serde(default)]
    pub defaults: MatchDefaults,
}

impl DuelConfig {
    /// Loads the configuration from `path`, or returns the defaults when
    /// the file does not exist.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`] if the file exists but cannot be read,
    /// [`ConfigError::Parse`] if it is not valid TOML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Retrieves an engine definition by name.
    ///
    /// # Errors
    ///
    /// [`ConfigError::EngineNotFound`] if no engine with that name exists.
    pub fn get_engine(&self, name: &str) -> Result<&EngineSpec, ConfigError> {
        self.engines
            .get(name)
            .ok_or_else(|| ConfigError::EngineNotFound(name.to_string()))
    }

    /// Resolves a CLI engine argument: a configured name, or failing that a
    /// bare executable path.
    pub fn resolve_engine(&self, arg: &str) -> EngineSpec {
        self.get_engine(arg)
            .cloned()
            .unwrap_or_else(|_| EngineSpec::from_path(arg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> MatchConfig {
        MatchConfig {
            engine1: EngineSpec::from_path("/bin/e1"),
            engine2: EngineSpec::from_path("/bin/e2"),
            games: 2,
            movetime_ms: 100,
            timeout_margin_ms: 100,
            handshake_timeout_ms: 5000,
            random_plies_per_side: 2,
            initial_fen: STARTPOS_FEN.to_string(),
            max_plies: 512,
            dialect: Dialect::Letters,
            print_moves: false,
            save_games: false,
            save_canceled: false,
            games_dir: PathBuf::from("games"),
        }
    }

    #[test]
    fn test_parse_valid_toml_config() {
        let toml_content = r#"
[engines.v6]
path = "/opt/engines/v6"
name = "V6"

[engines.v7]
path = "/opt/engines/v7"
args = ["--nnue"]

[defaults]
games = 500
movetime_ms = 100
random_plies_per_side = 2
dialect = "digits"
"#;
        let config: DuelConfig = toml::from_str(toml_content).unwrap();

        assert_eq!(config.engines.len(), 2);
        let v6 = config.get_engine("v6").unwrap();
        assert_eq!(v6.path, PathBuf::from("/opt/engines/v6"));
        assert_eq!(v6.display_name(), "V6");
        let v7 = config.get_engine("v7").unwrap();
        assert_eq!(v7.args, vec!["--nnue"]);
        assert_eq!(v7.display_name(), "v7");

        assert_eq!(config.defaults.games, 500);
        assert_eq!(config.defaults.dialect, Dialect::Digits);
        // Unspecified fields fall back to defaults.
        assert_eq!(config.defaults.max_plies, 512);
        assert!(config.defaults.save_games);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: DuelConfig = toml::from_str("").unwrap();
        assert!(config.engines.is_empty());
        assert_eq!(config.defaults.games, 10);
        assert_eq!(config.defaults.movetime_ms, 100);
        assert_eq!(config.defaults.initial_fen, STARTPOS_FEN);
    }

    #[test]
    fn test_get_engine_returns_error_for_unknown_name() {
        let config = DuelConfig::default();
        match config.get_engine("nonexistent") {
            Err(ConfigError::EngineNotFound(name)) => assert_eq!(name, "nonexistent"),
            _ => panic!("expected EngineNotFound"),
        }
    }

    #[test]
    fn test_resolve_engine_falls_back_to_path() {
        let config = DuelConfig::default();
        let spec = config.resolve_engine("./engines/v8");
        assert_eq!(spec.path, PathBuf::from("./engines/v8"));
        assert_eq!(spec.display_name(), "v8");
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let config = DuelConfig::load(Path::new("/nonexistent/duel.toml")).unwrap();
        assert!(config.engines.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_fen() {
        let mut config = test_config();
        config.initial_fen = "not a fen".to_string();
        match config.validate() {
            Err(ConfigError::InvalidFen(fen)) => assert_eq!(fen, "not a fen"),
            _ => panic!("expected InvalidFen"),
        }
    }

    #[test]
    fn test_validate_rejects_zero_movetime() {
        let mut config = test_config();
        config.movetime_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroMovetime)));
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_move_timeout_includes_margin() {
        let config = test_config();
        assert_eq!(config.move_timeout(), Duration::from_millis(200));
    }

    #[test]
    fn test_launch_args_carry_quiet_time_and_fen_fields() {
        let config = test_config();
        let mut spec = EngineSpec::from_path("/bin/e1");
        spec.args = vec!["--nnue".to_string()];
        let args = config.launch_args(&spec, STARTPOS_FEN);
        assert_eq!(
            args,
            vec![
                "--nnue",
                "-q",
                "-t",
                "100",
                "--fen",
                "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR",
                "w",
                "KQkq",
                "-",
                "0",
                "1",
            ]
        );
    }

    #[test]
    fn test_engine_spec_serialization_roundtrip() {
        let spec = EngineSpec {
            path: PathBuf::from("/opt/engines/v6"),
            args: vec!["--nnue".to_string()],
            name: Some("V6".to_string()),
        };
        let serialized = toml::to_string(&spec).unwrap();
        let deserialized: EngineSpec = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.path, spec.path);
        assert_eq!(deserialized.args, spec.args);
        assert_eq!(deserialized.name, spec.name);
    }
}
