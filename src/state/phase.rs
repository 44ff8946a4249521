//! Per-URL state machine of the variant resolver
use std::fmt;

/// `Navigating → Rendered → {EnumeratingVariants → VariantActive}* → Done`,
/// with `Navigating → Failed` as the only failure terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolvePhase {
    // ===== Active States =====
    /// Loading the page and waiting for the ready marker
    Navigating,

    /// Ready marker seen, baseline fields readable
    Rendered,

    /// Looking at the next variant control
    EnumeratingVariants,

    /// A variant is activated and its region is being re-read
    VariantActive,

    // ===== Terminal States =====
    /// All variants (or the baseline) emitted
    Done,

    /// Navigation retries exhausted
    Failed,
}

impl ResolvePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether the machine may move from `self` to `next`
    pub fn can_transition_to(&self, next: ResolvePhase) -> bool {
        use ResolvePhase::*;
        matches!(
            (*self, next),
            (Navigating, Navigating)
                | (Navigating, Rendered)
                | (Navigating, Failed)
                | (Rendered, EnumeratingVariants)
                | (Rendered, Done)
                | (EnumeratingVariants, VariantActive)
                | (EnumeratingVariants, EnumeratingVariants)
                | (EnumeratingVariants, Done)
                | (VariantActive, EnumeratingVariants)
                | (VariantActive, Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigating => "navigating",
            Self::Rendered => "rendered",
            Self::EnumeratingVariants => "enumerating_variants",
            Self::VariantActive => "variant_active",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ResolvePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks the phase of one URL and logs every move
#[derive(Debug)]
pub struct PhaseTracker<'a> {
    url: &'a str,
    phase: ResolvePhase,
}

impl<'a> PhaseTracker<'a> {
    pub fn new(url: &'a str) -> Self {
        Self {
            url,
            phase: ResolvePhase::Navigating,
        }
    }

    pub fn phase(&self) -> ResolvePhase {
        self.phase
    }

    /// Moves to `next`; an illegal move is logged and ignored
    pub fn advance(&mut self, next: ResolvePhase) -> bool {
        if !self.phase.can_transition_to(next) {
            tracing::warn!(
                "Ignoring invalid phase transition {} -> {} for {}",
                self.phase,
                next,
                self.url
            );
            return false;
        }
        tracing::trace!("{}: {} -> {}", self.url, self.phase, next);
        self.phase = next;
        true
    }
}
