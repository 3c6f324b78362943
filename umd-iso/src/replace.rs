//! Replacement of a single file's data extent.

use crate::buffer::{RangeError, SegmentedBuffer};
use crate::layout::{self, DirectoryRecord, SECTOR_SIZE, sector_offset, sectors_for};
use crate::propagate::{self, PropagateError, Shift};
use snafu::{OptionExt, ResultExt, Snafu, ensure};

/// Errors of [`replace()`].
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ReplaceError {
    #[snafu(display("cannot read directory record at {offset:#x}"))]
    ReadRecord {
        offset: u64,
        source: layout::ReadError,
    },

    #[snafu(display("no directory record at {offset:#x}"))]
    NoRecord { offset: u64 },

    #[snafu(display("directory record at {offset:#x} describes a directory"))]
    IsDirectory { offset: u64 },

    #[snafu(display("payload of {len} bytes does not fit in a directory record"))]
    PayloadTooLarge { len: u64 },

    #[snafu(display("cannot write data of the extent at LBA {lba}"))]
    WriteExtent { lba: u32, source: RangeError },

    #[snafu(display("cannot update size of the directory record at {offset:#x}"))]
    WriteSize { offset: u64, source: RangeError },

    #[snafu(display("cannot renumber sectors after LBA {lba}"))]
    Propagate { lba: u32, source: PropagateError },
}

/// New data for a file, zero-padded to a whole number of sectors.
#[derive(Clone, PartialEq, Eq)]
#[must_use]
pub struct Payload {
    data: Vec<u8>,
    len: u64,
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("len", &self.len)
            .field("sectors", &self.sectors())
            .finish_non_exhaustive()
    }
}

impl Payload {
    pub fn new(mut data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        data.resize((sectors_for(len) * SECTOR_SIZE) as usize, 0);
        Self { data, len }
    }

    /// Returns the unpadded size in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn sectors(&self) -> u64 {
        sectors_for(self.len)
    }

    /// Returns the data including the zero padding.
    #[must_use]
    pub fn padded(&self) -> &[u8] {
        &self.data
    }
}

/// What a single replacement changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// First sector of the replaced extent (unchanged by the replacement).
    pub lba: u32,
    /// Data length recorded before the replacement.
    pub old_len: u32,
    /// Data length recorded after the replacement.
    pub new_len: u32,
    pub old_sectors: u64,
    pub new_sectors: u64,
}

impl ReplaceOutcome {
    /// Returns the signed change of the image size in sectors.
    #[must_use]
    pub fn sector_delta(&self) -> i64 {
        self.new_sectors as i64 - self.old_sectors as i64
    }

    /// Returns the signed change of the image size in bytes.
    #[must_use]
    pub fn byte_delta(&self) -> i64 {
        self.sector_delta() * SECTOR_SIZE as i64
    }

    /// Maps a byte offset taken before the replacement to its current position.
    ///
    /// Offsets past the old extent moved by [`byte_delta()`](Self::byte_delta);
    /// everything before it stayed in place.
    #[must_use]
    pub fn relocate(&self, offset: u64) -> u64 {
        let end = sector_offset(self.lba) + self.old_sectors * SECTOR_SIZE;

        if self.sector_delta() != 0 && offset >= end {
            offset.saturating_add_signed(self.byte_delta())
        } else {
            offset
        }
    }
}

/// Replaces the data of the file described by the record at `record_offset`.
///
/// When the sector count is unchanged the extent is overwritten in place;
/// otherwise it is spliced and every later sector address is renumbered. The
/// record's data length is updated whenever the unpadded size differs.
pub fn replace(
    buffer: &mut SegmentedBuffer,
    record_offset: u64,
    payload: &Payload,
) -> Result<ReplaceOutcome, ReplaceError> {
    let record = DirectoryRecord::read(buffer, record_offset)
        .context(ReadRecordSnafu {
            offset: record_offset,
        })?
        .context(NoRecordSnafu {
            offset: record_offset,
        })?;

    ensure!(
        !record.is_directory(),
        IsDirectorySnafu {
            offset: record_offset
        }
    );

    let payload_len = payload.len();
    let new_len = u32::try_from(payload_len)
        .ok()
        .context(PayloadTooLargeSnafu { len: payload_len })?;

    let lba = record.lba();
    let outcome = ReplaceOutcome {
        lba,
        old_len: record.data_length(),
        new_len,
        old_sectors: sectors_for(record.data_length() as u64),
        new_sectors: payload.sectors(),
    };

    let start = sector_offset(lba);

    if outcome.new_sectors == outcome.old_sectors {
        if !payload.is_empty() {
            buffer
                .write(start, payload.padded())
                .context(WriteExtentSnafu { lba })?;
        }
    } else {
        buffer
            .splice(start, outcome.old_sectors * SECTOR_SIZE, payload.padded())
            .context(WriteExtentSnafu { lba })?;
    }

    // The record itself moves if its directory is stored after the file.
    let offset = outcome.relocate(record_offset);

    if outcome.old_len != outcome.new_len {
        DirectoryRecord::write_data_length(buffer, offset, new_len)
            .context(WriteSizeSnafu { offset })?;
    }

    if outcome.sector_delta() != 0 {
        let shift = Shift {
            lba,
            diff: outcome.sector_delta(),
            record: offset,
        };

        propagate::propagate(buffer, &shift).context(PropagateSnafu { lba })?;
    }

    Ok(outcome)
}
