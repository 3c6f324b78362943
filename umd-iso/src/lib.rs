//! A library for replacing files inside PSP and PS2 UMD images.
//!
//! UMD images are plain ISO 9660 volumes with 2048-byte sectors. This crate
//! edits such an image in memory: it finds a file's directory record by path,
//! swaps the file's data for new content of any size, and renumbers every
//! sector address stored after it so the volume stays consistent.
//!
//! # Features
//!
//! - Segmented in-memory image buffer with splice support for images larger
//!   than a single allocation
//! - Case-insensitive path resolution that ignores `;1` version suffixes
//! - In-place overwrite when the sector count is unchanged, splice otherwise
//! - Renumbering of the volume descriptor, all four path tables and the
//!   directory tree after a size change
//!
//! # Example
//!
//! ```no_run
//! use umd_iso::{Payload, SegmentedBuffer, UmdImage};
//! use umd_iso::buffer::DEFAULT_SEGMENT_CAPACITY;
//!
//! let data = std::fs::read("game.iso").unwrap();
//! let buffer = SegmentedBuffer::from_slice(&data, DEFAULT_SEGMENT_CAPACITY);
//! let mut image = UmdImage::new(buffer).unwrap();
//!
//! let record = image.resolve("PSP_GAME/SYSDIR/EBOOT.BIN").unwrap().unwrap();
//! let payload = Payload::new(std::fs::read("EBOOT.BIN").unwrap());
//! let outcome = image.replace(record.offset(), &payload).unwrap();
//!
//! println!("image grew by {} bytes", outcome.byte_delta());
//! ```
//!
//! # References
//!
//! - [ECMA-119](https://ecma-international.org/publications-and-standards/standards/ecma-119/)
//! - [PSP Developer Wiki - UMD](https://www.psdevwiki.com/psp/UMD)

pub use self::buffer::{RangeError, SegmentedBuffer};
pub use self::layout::{DirectoryRecord, Extent, VolumeDescriptor};
pub use self::navigator::ResolveError;
pub use self::propagate::PropagateError;
pub use self::replace::{Payload, ReplaceError, ReplaceOutcome};

use snafu::{ResultExt, Snafu};

pub mod buffer;
pub mod layout;
pub mod navigator;
pub mod propagate;
pub mod replace;

/// Errors for [`UmdImage::new()`].
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum OpenError {
    #[snafu(display("cannot read volume descriptor"))]
    ReadDescriptorFailed { source: layout::ReadError },
}

impl OpenError {
    /// Returns `true` if the data is not an ISO 9660 volume at all, as opposed
    /// to a volume that could not be read.
    #[must_use]
    pub fn is_unrecognized(&self) -> bool {
        match self {
            Self::ReadDescriptorFailed { source } => matches!(
                source,
                layout::ReadError::NotPrimaryDescriptor | layout::ReadError::OutOfImage { .. }
            ),
        }
    }
}

/// A UMD image loaded into memory.
///
/// Lookups take `&self` and may run from many threads at once. Replacements
/// take `&mut self`, so they are serialized by ownership of the image.
#[must_use]
pub struct UmdImage {
    buffer: SegmentedBuffer,
}

impl std::fmt::Debug for UmdImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UmdImage")
            .field("len", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

impl UmdImage {
    /// Wraps `buffer` after checking that it holds a primary volume descriptor.
    pub fn new(buffer: SegmentedBuffer) -> Result<Self, OpenError> {
        let _descriptor = VolumeDescriptor::read(&buffer).context(ReadDescriptorFailedSnafu)?;
        Ok(Self { buffer })
    }

    /// Reads the current volume descriptor.
    pub fn descriptor(&self) -> Result<VolumeDescriptor, layout::ReadError> {
        VolumeDescriptor::read(&self.buffer)
    }

    /// Returns the volume space size recorded in the descriptor.
    pub fn total_sectors(&self) -> Result<u32, layout::ReadError> {
        Ok(self.descriptor()?.total_sectors())
    }

    /// Finds the directory record of the file at `path`.
    ///
    /// See [`navigator::resolve()`] for the matching rules.
    pub fn resolve(&self, path: &str) -> Result<Option<DirectoryRecord>, ResolveError> {
        let root = VolumeDescriptor::read(&self.buffer)
            .context(navigator::ReadDescriptorSnafu)?
            .root();

        navigator::resolve(&self.buffer, root, path)
    }

    /// Replaces the data of the file whose directory record is at `record_offset`.
    ///
    /// See [`replace::replace()`].
    pub fn replace(
        &mut self,
        record_offset: u64,
        payload: &Payload,
    ) -> Result<ReplaceOutcome, ReplaceError> {
        replace::replace(&mut self.buffer, record_offset, payload)
    }

    /// Returns the image size in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn buffer(&self) -> &SegmentedBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> SegmentedBuffer {
        self.buffer
    }
}
