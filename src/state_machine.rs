//! Per-invocation state machine of a gallery upload.
//!
//! ```text
//! Idle -> Validating -> Rejected
//! Validating -> Uploading -> UploadFailed
//! Uploading -> UploadSucceeded -> CommittingMetadata -> MetadataFailed
//! CommittingMetadata -> Committed
//! ```

use serde::Serialize;
use thiserror::Error;

/// Where a single upload invocation currently is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploadState {
    #[default]
    Idle,
    Validating,
    Rejected { reason: String },
    Uploading,
    UploadFailed { reason: String },
    UploadSucceeded { object_path: String },
    CommittingMetadata,
    /// The binary at `object_path` is left without a record
    MetadataFailed { object_path: String, reason: String },
    Committed { item_id: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal upload transition from {from} to {to}")]
pub struct IllegalTransition {
    pub from: &'static str,
    pub to: &'static str,
}

impl UploadState {
    pub fn name(&self) -> &'static str {
        match self {
            UploadState::Idle => "idle",
            UploadState::Validating => "validating",
            UploadState::Rejected { .. } => "rejected",
            UploadState::Uploading => "uploading",
            UploadState::UploadFailed { .. } => "upload_failed",
            UploadState::UploadSucceeded { .. } => "upload_succeeded",
            UploadState::CommittingMetadata => "committing_metadata",
            UploadState::MetadataFailed { .. } => "metadata_failed",
            UploadState::Committed { .. } => "committed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadState::Rejected { .. }
                | UploadState::UploadFailed { .. }
                | UploadState::MetadataFailed { .. }
                | UploadState::Committed { .. }
        )
    }

    fn allows(&self, next: &UploadState) -> bool {
        use UploadState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Rejected { .. })
                | (Validating, Uploading)
                | (Uploading, UploadFailed { .. })
                | (Uploading, UploadSucceeded { .. })
                | (UploadSucceeded { .. }, CommittingMetadata)
                | (CommittingMetadata, MetadataFailed { .. })
                | (CommittingMetadata, Committed { .. })
        )
    }

    /// Move to `next`, refusing any edge not in the diagram above.
    pub fn advance(&mut self, next: UploadState) -> Result<(), IllegalTransition> {
        if !self.allows(&next) {
            return Err(IllegalTransition {
                from: self.name(),
                to: next.name(),
            });
        }
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_committed() {
        let mut state = UploadState::default();
        state.advance(UploadState::Validating).unwrap();
        state.advance(UploadState::Uploading).unwrap();
        state
            .advance(UploadState::UploadSucceeded {
                object_path: "gallery/1-a.jpg".to_string(),
            })
            .unwrap();
        state.advance(UploadState::CommittingMetadata).unwrap();
        state
            .advance(UploadState::Committed {
                item_id: "abc".to_string(),
            })
            .unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn metadata_commit_requires_successful_upload() {
        let mut state = UploadState::Uploading;
        let err = state.advance(UploadState::CommittingMetadata).unwrap_err();
        assert_eq!(err.from, "uploading");
        assert_eq!(err.to, "committing_metadata");
        assert_eq!(state, UploadState::Uploading);
    }

    #[test]
    fn terminal_states_do_not_move() {
        let mut state = UploadState::UploadFailed {
            reason: "canceled".to_string(),
        };
        assert!(state.advance(UploadState::Uploading).is_err());
        assert!(state.is_terminal());
    }
}
