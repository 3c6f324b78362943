use super::sector_offset;
use std::fmt::{Display, Formatter};

/// Size of the fixed part of a path table record (ECMA-119 9.4).
pub const PATH_RECORD_HEADER: u64 = 8;

/// Position of the directory LBA inside a path table record.
pub const PATH_RECORD_LBA_FIELD: u64 = 2;

/// Byte order a path table is recorded in.
///
/// Type L tables are little-endian, type M tables big-endian. Each table also
/// records its own location in the descriptor in the same byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    #[inline]
    #[must_use]
    pub const fn decode(self, bytes: [u8; 4]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        }
    }

    #[inline]
    #[must_use]
    pub const fn encode(self, value: u32) -> [u8; 4] {
        match self {
            Self::Little => value.to_le_bytes(),
            Self::Big => value.to_be_bytes(),
        }
    }
}

impl Display for Endian {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Little => f.write_str("type L"),
            Self::Big => f.write_str("type M"),
        }
    }
}

/// One of the four path table location fields of the volume descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathTableLocation {
    /// Index of the field (0 and 1 are type L, 2 and 3 are type M).
    pub slot: usize,
    pub lba: u32,
    pub endian: Endian,
}

impl PathTableLocation {
    /// Returns `true` if the descriptor records no table in this slot.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.lba == 0
    }

    #[must_use]
    pub fn offset(&self) -> u64 {
        sector_offset(self.lba)
    }
}

/// Returns the size of a path table record with a `name_len`-byte identifier.
///
/// Records are padded to an even length.
#[inline]
#[must_use]
pub const fn path_record_len(name_len: u8) -> u64 {
    PATH_RECORD_HEADER + name_len as u64 + (name_len as u64 & 1)
}
