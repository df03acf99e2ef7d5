//! Error taxonomy and soft-failure reports.

use std::path::PathBuf;

use poselib_api_core::{ChannelError, CoercionError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wrong selection for an operation. Raised before anything is mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no or too many objects selected: expected exactly {expected}, found {found}")]
    WrongCount { expected: usize, found: usize },
    #[error("object '{object}' is a {kind}, an ARMATURE is required")]
    WrongType { object: String, kind: String },
    #[error("no bones selected on '{object}'")]
    NoBones { object: String },
}

#[derive(Debug, Error)]
pub enum PoseLibError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Missing or malformed library file, or a scene file holding zero/several entities.
    #[error("library file {}: {reason}", path.display())]
    LibraryFile { path: PathBuf, reason: String },

    #[error("bone '{bone}' uses {side} rotation mode AXIS_ANGLE, use QUATERNION or Euler")]
    UnsupportedRotation { bone: String, side: String },

    #[error("blend pose failed: {0}")]
    Blend(String),

    #[error("paste animation failed: {0}")]
    Paste(String),

    #[error("invalid item name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type PoseLibResult<T> = Result<T, PoseLibError>;

impl PoseLibError {
    pub fn library_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PoseLibError::LibraryFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PoseLibError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        PoseLibError::Json {
            path: path.into(),
            source,
        }
    }

    /// Terminal, user-actionable failures (shown in a notice by hosts).
    pub fn is_user_actionable(&self) -> bool {
        matches!(
            self,
            PoseLibError::Selection(_)
                | PoseLibError::LibraryFile { .. }
                | PoseLibError::UnsupportedRotation { .. }
                | PoseLibError::InvalidName { .. }
        )
    }
}

/// A non-fatal problem collected while processing a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Bone, property, object or constraint the warning is about.
    pub subject: String,
    pub message: String,
}

impl Warning {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        let w = Warning {
            subject: subject.into(),
            message: message.into(),
        };
        log::warn!("{}: {}", w.subject, w.message);
        w
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.subject, self.message)
    }
}

/// Result summary of a pose blend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlendReport {
    /// Live bones written, in processing order.
    pub bones: Vec<String>,
    pub keys_inserted: usize,
    pub warnings: Vec<Warning>,
}

/// Result summary of an animation paste.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasteReport {
    /// Name of the action the keys ended up in.
    pub action: String,
    pub keys_written: usize,
    pub keys_deleted: usize,
    pub warnings: Vec<Warning>,
}

/// Result summary of a constraint set application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintReport {
    /// (object, bone, constraint) triples created.
    pub created: Vec<(String, String, String)>,
    pub warnings: Vec<Warning>,
}

/// Result summary of a bone selection operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionReport {
    pub selected: Vec<String>,
    pub warnings: Vec<Warning>,
}

/// Collect-all-then-report helper shared by the reports.
pub(crate) fn summarize(warnings: &[Warning]) -> Option<String> {
    if warnings.is_empty() {
        None
    } else {
        Some(
            warnings
                .iter()
                .map(Warning::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

macro_rules! impl_summary {
    ($($report:ty),*) => {
        $(impl $report {
            /// All warnings joined into one message, `None` when clean.
            pub fn summary(&self) -> Option<String> {
                summarize(&self.warnings)
            }
        })*
    };
}

impl_summary!(BlendReport, PasteReport, ConstraintReport, SelectionReport);
