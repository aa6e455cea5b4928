// MateKeeper — keeps DesktopMate on the desktop and off the taskbar
// SPDX-License-Identifier: AGPL-3.0-or-later

use thiserror::Error;

/// Failure of a single OS primitive behind the platform seam.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("window {0:#x} no longer exists")]
    WindowGone(isize),

    #[error("no window found for {0}")]
    WindowNotFound(String),

    #[error("window enumeration failed: {0}")]
    Enumeration(String),

    #[error("no desktop anchor window could be resolved")]
    NoDesktopAnchor,

    #[error("{call} failed: {detail}")]
    Call {
        call: &'static str,
        detail: String,
    },

    #[error("failed to spawn controller process: {0}")]
    Spawn(String),
}

/// Tri-state result so callers can decide retry vs abort vs ignore instead of
/// every failure being swallowed the same way.
#[derive(Debug)]
pub enum Outcome {
    Success,
    /// Worth retrying; the compositor may simply not have settled yet.
    Transient(PlatformError),
    /// Retries exhausted or a condition retrying cannot fix.
    Terminal(PlatformError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_not_success() {
        let o = Outcome::Transient(PlatformError::NoDesktopAnchor);
        assert!(!o.is_success());
        assert!(Outcome::Success.is_success());
    }
}
