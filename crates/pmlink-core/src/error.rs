// ── Core error types ──
//
// Errors surfaced by the engine API. Device-side failures (an `error:` reply,
// a timeout) are not errors here: they arrive as `CommandResult` variants.
// Only misuse of the engine and transport failures end up in `CoreError`.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Engine has been released")]
    EngineReleased,

    #[error("Engine is already attached to a shell link")]
    AlreadyAttached,

    // ── Command errors ───────────────────────────────────────────────
    #[error("Command already in flight: {command}")]
    DuplicateCommand { command: String },

    // ── Transport errors (wrapped) ───────────────────────────────────
    #[error("Transport error: {0}")]
    Transport(#[from] pmlink_shell::Error),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Whether retrying against a fresh engine could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_transient(),
            _ => false,
        }
    }
}
