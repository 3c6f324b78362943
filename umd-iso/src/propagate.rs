//! Renumbering of stored sector addresses after an extent changed size.
//!
//! Once the data of one file has been spliced, every structure recording an
//! LBA past that file points at the wrong sector. [`propagate()`] walks the
//! volume descriptor, the path tables and the whole directory tree and moves
//! those addresses by the sector delta.

use crate::buffer::{RangeError, SegmentedBuffer};
use crate::layout::path_table::{PATH_RECORD_HEADER, PATH_RECORD_LBA_FIELD, path_record_len};
use crate::layout::{
    self, DirectoryRecord, Extent, PathTableLocation, RecordCursor, VolumeDescriptor,
};
use crate::navigator::MAX_DEPTH;
use snafu::{OptionExt, ResultExt, Snafu, ensure};

/// Errors of [`propagate()`].
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum PropagateError {
    #[snafu(display("cannot read volume descriptor"))]
    ReadDescriptor { source: layout::ReadError },

    #[snafu(display("cannot read {table} path table at LBA {lba}"))]
    ReadPathTable {
        table: layout::Endian,
        lba: u32,
        source: RangeError,
    },

    #[snafu(display("cannot read directory record"))]
    ReadRecord { source: layout::ReadError },

    #[snafu(display("cannot update {what} at {offset:#x}"))]
    Write {
        what: &'static str,
        offset: u64,
        source: RangeError,
    },

    #[snafu(display("LBA {lba} cannot be moved by {diff} sectors"))]
    LbaOutOfRange { lba: u32, diff: i64 },

    #[snafu(display("directory tree is nested deeper than {MAX_DEPTH} levels"))]
    TooDeep,
}

/// Describes how the extent at `lba` moved everything behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    /// Original LBA of the resized extent.
    pub lba: u32,
    /// Signed change of the extent's size in sectors.
    pub diff: i64,
    /// Absolute offset of the directory record of the resized file.
    pub record: u64,
}

impl Shift {
    /// Returns `true` if an address recorded at `offset` must move.
    ///
    /// Zero-length files may share the LBA of the resized file; of those, only
    /// the ones recorded after its directory record are pushed along.
    #[must_use]
    pub fn applies_to(&self, lba: u32, offset: u64) -> bool {
        lba > self.lba || (lba == self.lba && offset > self.record)
    }

    /// Returns `lba` moved by the delta.
    pub fn apply(&self, lba: u32) -> Result<u32, PropagateError> {
        i64::from(lba)
            .checked_add(self.diff)
            .and_then(|v| u32::try_from(v).ok())
            .context(LbaOutOfRangeSnafu {
                lba,
                diff: self.diff,
            })
    }
}

/// Moves every sector address affected by `shift`.
///
/// Runs in three passes: the descriptor's total sector count (and embedded
/// root record), each present path table, then the directory tree from the
/// root. Must be called after the data has been spliced, since directory
/// extents past the resized file are read at their new position.
pub fn propagate(buffer: &mut SegmentedBuffer, shift: &Shift) -> Result<(), PropagateError> {
    if shift.diff == 0 {
        return Ok(());
    }

    let descriptor = VolumeDescriptor::read(buffer).context(ReadDescriptorSnafu)?;

    let total = shift.apply(descriptor.total_sectors())?;
    VolumeDescriptor::write_total_sectors(buffer, total).context(WriteSnafu {
        what: "total sector count",
        offset: VolumeDescriptor::TOTAL_SECTORS_FIELD,
    })?;

    let table_size = descriptor.path_table_size() as u64;

    for table in descriptor.path_tables() {
        if !table.is_absent() {
            shift_path_table(buffer, table, table_size, shift)?;
        }
    }

    let mut root = descriptor.root();

    if shift.applies_to(root.lba, VolumeDescriptor::ROOT_RECORD) {
        root.lba = shift.apply(root.lba)?;
        write_record_lba(buffer, VolumeDescriptor::ROOT_RECORD, root.lba)?;
    }

    shift_directory(buffer, root, shift, 0)
}

fn shift_path_table(
    buffer: &mut SegmentedBuffer,
    mut table: PathTableLocation,
    size: u64,
    shift: &Shift,
) -> Result<(), PropagateError> {
    // A table stored past the resized file has itself moved.
    if table.lba > shift.lba {
        let lba = shift.apply(table.lba)?;

        VolumeDescriptor::write_path_table_lba(buffer, &table, lba).context(WriteSnafu {
            what: "path table location",
            offset: VolumeDescriptor::path_table_field(table.slot),
        })?;

        table.lba = lba;
    }

    let base = table.offset();
    let read_failed = ReadPathTableSnafu {
        table: table.endian,
        lba: table.lba,
    };
    let mut pos = 0;

    while pos + PATH_RECORD_HEADER <= size {
        let offset = base + pos;
        let [name_len] = buffer.read_array::<1>(offset).context(read_failed)?;

        if name_len == 0 {
            break;
        }

        let field = offset + PATH_RECORD_LBA_FIELD;
        let bytes = buffer.read_array::<4>(field).context(read_failed)?;
        let lba = table.endian.decode(bytes);

        if lba > shift.lba {
            let lba = shift.apply(lba)?;

            buffer
                .write(field, &table.endian.encode(lba))
                .context(WriteSnafu {
                    what: "path table record",
                    offset,
                })?;
        }

        pos += path_record_len(name_len);
    }

    Ok(())
}

fn shift_directory(
    buffer: &mut SegmentedBuffer,
    extent: Extent,
    shift: &Shift,
    depth: usize,
) -> Result<(), PropagateError> {
    ensure!(depth <= MAX_DEPTH, TooDeepSnafu);

    let mut cursor = RecordCursor::new(extent);

    while let Some(record) = cursor.next(buffer).context(ReadRecordSnafu)? {
        let mut child = record.extent();

        if shift.applies_to(child.lba, record.offset()) {
            child.lba = shift.apply(child.lba)?;
            write_record_lba(buffer, record.offset(), child.lba)?;
        }

        // The subdirectory is walked at its updated location.
        if record.is_directory() && !record.is_self_or_parent() {
            shift_directory(buffer, child, shift, depth + 1)?;
        }
    }

    Ok(())
}

fn write_record_lba(
    buffer: &mut SegmentedBuffer,
    offset: u64,
    lba: u32,
) -> Result<(), PropagateError> {
    DirectoryRecord::write_lba(buffer, offset, lba).context(WriteSnafu {
        what: "directory record",
        offset,
    })
}
