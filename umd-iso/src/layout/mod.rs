//! Fixed-offset accessors for the on-disk structures touched by a replacement.
//!
//! All multi-byte fields that locate data on the disc are stored twice, once
//! little-endian and once big-endian. Readers use the little-endian copy;
//! writers always update both.
//!
//! References:
//! - ECMA-119 (ISO 9660), sections 8.4 and 9.1
//! - <https://www.psdevwiki.com/psp/UMD>

use crate::buffer::RangeError;
use snafu::Snafu;
use zerocopy::byteorder::{big_endian, little_endian};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

pub use self::descriptor::VolumeDescriptor;
pub use self::path_table::{Endian, PathTableLocation};
pub use self::record::{DirectoryRecord, FileFlags, RecordCursor, logical_name};

pub mod descriptor;
pub mod path_table;
pub mod record;

/// Size of a Mode 0 sector in bytes. LBAs are counted in these units.
pub const SECTOR_SIZE: u64 = 2048;

/// LBA of the primary volume descriptor.
pub const DESCRIPTOR_LBA: u32 = 16;

/// Errors when reading a structure from the image.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ReadError {
    #[snafu(display("cannot read {what} at {offset:#x}"))]
    OutOfImage {
        what: &'static str,
        offset: u64,
        source: RangeError,
    },

    #[snafu(display("sector {DESCRIPTOR_LBA} does not hold a primary volume descriptor"))]
    NotPrimaryDescriptor,

    #[snafu(display("directory record at {offset:#x} is malformed"))]
    MalformedRecord { offset: u64 },
}

/// Returns the byte offset of sector `lba`.
#[inline]
#[must_use]
pub const fn sector_offset(lba: u32) -> u64 {
    lba as u64 * SECTOR_SIZE
}

/// Returns the number of whole sectors needed to hold `len` bytes.
#[inline]
#[must_use]
pub const fn sectors_for(len: u64) -> u64 {
    len.div_ceil(SECTOR_SIZE)
}

/// A contiguous run of sectors holding a file or directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    /// First sector of the extent.
    pub lba: u32,
    /// Length of the data in bytes.
    pub len: u32,
}

impl Extent {
    /// Returns the absolute byte offset of the first sector.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        sector_offset(self.lba)
    }

    /// Returns the number of sectors covered by the extent.
    #[must_use]
    pub const fn sectors(&self) -> u64 {
        sectors_for(self.len as u64)
    }
}

/// A 32-bit value recorded in both byte orders (ECMA-119 7.3.3).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct BothEndianU32 {
    le: little_endian::U32,
    be: big_endian::U32,
}

impl BothEndianU32 {
    #[must_use]
    pub fn new(value: u32) -> Self {
        Self {
            le: little_endian::U32::new(value),
            be: big_endian::U32::new(value),
        }
    }

    /// Returns the little-endian copy.
    #[must_use]
    pub fn get(&self) -> u32 {
        self.le.get()
    }
}
