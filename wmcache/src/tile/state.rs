use std::fmt;

/// Lifecycle state of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileState {
    /// Initial, unresolved.
    Loading,
    /// Re-attempting after a failure; painted like `Loading`.
    Retrying,
    /// Image present.
    Loaded,
    /// Resolution failed; may be retried.
    Error,
    /// Resolution failed for good; never retried.
    FatalError,
    /// Being torn down.
    Disposing,
}

impl TileState {
    /// `Disposing` and `FatalError` only ever move to `Disposing`.
    pub fn is_terminal(self) -> bool {
        matches!(self, TileState::Disposing | TileState::FatalError)
    }

    /// Whether a tile currently in `self` may move to `next`.
    pub fn accepts(self, next: TileState) -> bool {
        next == TileState::Disposing || !self.is_terminal()
    }

    /// Still waiting for an image.
    pub fn is_pending(self) -> bool {
        matches!(self, TileState::Loading | TileState::Retrying)
    }

    /// Label painted over a tile and used in diagnostics.
    pub fn label(self) -> &'static str {
        match self {
            TileState::Loading => "LOADING",
            TileState::Retrying => "RETRYING",
            TileState::Loaded => "LOADED",
            TileState::Error => "ERROR",
            TileState::FatalError => "FATAL_ERROR",
            TileState::Disposing => "DISPOSING",
        }
    }
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
