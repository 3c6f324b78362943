use crate::{IoCategory, Status};
use snafu::Snafu;
use std::path::PathBuf;

/// Errors that can occur while replacing files in an image.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
#[non_exhaustive]
pub enum ReplaceError {
    // Resolution errors
    #[snafu(display("cannot look up {target} in image"))]
    ResolveFailed {
        target: String,
        source: umd_iso::ResolveError,
    },

    #[snafu(display("{target} does not exist in image"))]
    TargetNotFound { target: String },

    #[snafu(display("cannot read {}", path.display()))]
    LoadPayloadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("{} is too large to be stored in an image ({len} bytes)", path.display()))]
    PayloadTooLarge { path: PathBuf, len: u64 },

    #[snafu(display("{first} and {second} name the same file"))]
    DuplicateTarget { first: String, second: String },

    // Application errors
    #[snafu(display("cannot read volume descriptor"))]
    ReadDescriptorFailed {
        source: umd_iso::layout::ReadError,
    },

    #[snafu(display("cannot replace {target}"))]
    ApplyFailed {
        target: String,
        source: umd_iso::ReplaceError,
    },
}

impl ReplaceError {
    /// Returns the exit status this error is reported with.
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::TargetNotFound { .. } => Status::TargetNotFound,
            Self::LoadPayloadFailed { source, .. } => IoCategory::of(source).status(),
            Self::DuplicateTarget { .. } => Status::BadArguments,
            Self::ResolveFailed { .. } | Self::PayloadTooLarge { .. } => Status::UnsupportedFormat,
            Self::ReadDescriptorFailed { .. } | Self::ApplyFailed { .. } => Status::Io,
        }
    }
}
