//! Library for replacing files inside PSP and PS2 UMD images.
//!
//! This crate drives [`umd_iso`] over a whole batch of replacements: it loads
//! the image from disk, resolves every requested path against the untouched
//! image, applies the replacements back to front and writes the result over
//! the original file.
//!
//! # Overview
//!
//! The main entry point is [`BatchReplacer`], which takes a [`ReplaceProgress`]
//! implementation and applies a list of [`Replacement`]s to an opened
//! [`UmdImage`](umd_iso::UmdImage).
//!
//! # Example
//!
//! ```no_run
//! use umd_replace::{BatchReplacer, Replacement, SilentProgress, open_image, save_image};
//! use umd_iso::buffer::DEFAULT_SEGMENT_CAPACITY;
//!
//! let path = std::path::Path::new("game.iso");
//! let mut image =
//!     unsafe { open_image(path, DEFAULT_SEGMENT_CAPACITY) }.expect("failed to open image");
//!
//! let requests = [Replacement::new("PSP_GAME/SYSDIR/EBOOT.BIN", "EBOOT.BIN")];
//! let summary = BatchReplacer::new(SilentProgress)
//!     .run(&mut image, &requests)
//!     .expect("replacement failed");
//!
//! save_image(&image, path, &SilentProgress).expect("failed to save image");
//! println!("image grew by {} bytes", summary.byte_delta());
//! ```
//!
//! # Custom progress reporting
//!
//! You can implement the [`ReplaceProgress`] trait to receive progress updates
//! while requests are resolved and applied and while the image is written.

pub mod args;
pub mod progress;
pub mod replace;
pub mod write;

pub use self::args::{ArgumentError, expand_arguments};
pub use self::progress::{ReplaceProgress, SilentProgress};
pub use self::replace::{BatchReplacer, BatchSummary, FileSummary, ReplaceError, Replacement};
pub use self::write::{SaveImageError, save_image};

#[cfg(feature = "cli")]
pub use self::progress::ConsoleProgress;

use snafu::{ResultExt, Snafu};
use std::io::ErrorKind;
use std::path::Path;
use umd_iso::{SegmentedBuffer, UmdImage};

/// Coarse classification of I/O failures, one per process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCategory {
    NotFound,
    PathTooLong,
    PermissionDenied,
    UnsupportedFormat,
    Other,
}

impl IoCategory {
    #[must_use]
    pub fn of(err: &std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => Self::NotFound,
            ErrorKind::InvalidFilename => Self::PathTooLong,
            ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => Self::PermissionDenied,
            ErrorKind::InvalidData | ErrorKind::Unsupported => Self::UnsupportedFormat,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub fn status(self) -> Status {
        match self {
            Self::NotFound => Status::NotFound,
            Self::PathTooLong => Status::PathTooLong,
            Self::PermissionDenied => Status::PermissionDenied,
            Self::UnsupportedFormat => Status::UnsupportedFormat,
            Self::Other => Status::Io,
        }
    }
}

/// Outcome of a run, as reported to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    NotFound,
    TargetNotFound,
    PermissionDenied,
    UnsupportedFormat,
    Io,
    PathTooLong,
    BadArguments,
}

impl Status {
    /// Returns the process exit code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::NotFound => 2,
            Self::TargetNotFound => 3,
            Self::PermissionDenied => 5,
            Self::UnsupportedFormat => 11,
            Self::Io => 110,
            Self::PathTooLong => 111,
            Self::BadArguments => 160,
        }
    }
}

/// Errors that can occur when opening an image from disk.
#[derive(Debug, Snafu)]
pub enum OpenImageError {
    #[snafu(display("failed to open file"))]
    OpenFile { source: std::io::Error },

    #[snafu(display("failed to memory map file"))]
    MmapFile { source: std::io::Error },

    #[snafu(display("failed to parse image"))]
    ParseImage { source: umd_iso::OpenError },
}

impl OpenImageError {
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::OpenFile { source } | Self::MmapFile { source } => {
                IoCategory::of(source).status()
            }
            Self::ParseImage { source } if source.is_unrecognized() => Status::UnsupportedFormat,
            Self::ParseImage { .. } => Status::Io,
        }
    }
}

/// Loads an image from disk into a buffer of `segment_capacity`-byte segments.
///
/// The file is memory mapped and copied; the returned image owns its data and
/// does not keep the file open.
///
/// # Safety
///
/// This function uses `unsafe` internally to create a memory map. The caller
/// must ensure the file is not modified or truncated while it is being loaded.
pub unsafe fn open_image(path: &Path, segment_capacity: usize) -> Result<UmdImage, OpenImageError> {
    let file = std::fs::File::open(path).context(OpenFileSnafu)?;
    let len = file.metadata().context(OpenFileSnafu)?.len();

    let buffer = if len == 0 {
        SegmentedBuffer::new(segment_capacity)
    } else {
        let raw = unsafe { memmap2::Mmap::map(&file).context(MmapFileSnafu)? };
        SegmentedBuffer::from_slice(&raw, segment_capacity)
    };

    UmdImage::new(buffer).context(ParseImageSnafu)
}
