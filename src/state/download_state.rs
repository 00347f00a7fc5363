//! Download and parse state definitions for sources and articles
//!
//! Both state machines only move forward. Asking for a backward move returns
//! [`NewzError::InvalidTransition`].
use crate::NewzError;
use std::fmt;

/// Represents where a source or article is in its download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DownloadState {
    /// Nothing has been requested yet
    #[default]
    NotStarted,

    /// A fetch is in flight
    Downloading,

    // ===== Terminal States =====
    /// The payload was received and is owned by the object
    Downloaded,

    /// The fetch failed; the object is pruned for this crawl run
    Failed,
}

impl DownloadState {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Downloaded | Self::Failed)
    }

    /// Returns true if the transition `self -> next` is allowed
    ///
    /// `NotStarted -> Failed` is allowed for fetches that never start (for
    /// example an unusable url).
    pub fn can_transition_to(&self, next: DownloadState) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Downloading)
                | (Self::NotStarted, Self::Failed)
                | (Self::Downloading, Self::Downloaded)
                | (Self::Downloading, Self::Failed)
        )
    }

    /// Moves to `next`, or reports the illegal move
    pub fn transition(self, next: DownloadState) -> Result<DownloadState, NewzError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(NewzError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents whether extraction has run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParseState {
    #[default]
    NotParsed,
    Parsed,
}

impl ParseState {
    pub fn transition(self, next: ParseState) -> Result<ParseState, NewzError> {
        match (self, next) {
            (Self::NotParsed, Self::Parsed) => Ok(next),
            _ => Err(NewzError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            }),
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed)
    }
}

impl fmt::Display for ParseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotParsed => write!(f, "not_parsed"),
            Self::Parsed => write!(f, "parsed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let state = DownloadState::NotStarted;
        let state = state.transition(DownloadState::Downloading).unwrap();
        let state = state.transition(DownloadState::Downloaded).unwrap();
        assert!(state.is_terminal());

        let failed = DownloadState::Downloading
            .transition(DownloadState::Failed)
            .unwrap();
        assert_eq!(failed, DownloadState::Failed);

        assert!(DownloadState::NotStarted
            .transition(DownloadState::Failed)
            .is_ok());
    }

    #[test]
    fn test_backward_transitions_rejected() {
        assert!(DownloadState::Downloaded
            .transition(DownloadState::Downloading)
            .is_err());
        assert!(DownloadState::Failed
            .transition(DownloadState::Downloaded)
            .is_err());
        assert!(DownloadState::Downloaded
            .transition(DownloadState::NotStarted)
            .is_err());
        // skipping the in-flight state is not a valid success path
        assert!(DownloadState::NotStarted
            .transition(DownloadState::Downloaded)
            .is_err());
    }

    #[test]
    fn test_invalid_transition_error_names_states() {
        let err = DownloadState::Failed
            .transition(DownloadState::Downloading)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid state transition: failed -> downloading"
        );
    }

    #[test]
    fn test_parse_state_is_monotonic() {
        let parsed = ParseState::NotParsed.transition(ParseState::Parsed).unwrap();
        assert!(parsed.is_parsed());
        assert!(parsed.transition(ParseState::Parsed).is_err());
        assert!(parsed.transition(ParseState::NotParsed).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", DownloadState::NotStarted), "not_started");
        assert_eq!(format!("{}", ParseState::Parsed), "parsed");
    }
}
