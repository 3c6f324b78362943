use super::{BothEndianU32, Extent, OutOfImageSnafu, ReadError, SECTOR_SIZE};
use crate::buffer::{RangeError, SegmentedBuffer};
use snafu::{ResultExt, ensure};
use std::mem::offset_of;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Fixed part of a directory record (33 bytes), followed by the identifier.
///
/// See ECMA-119 9.1.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub(crate) struct DirectoryRecordRaw {
    length: u8,                 // 0x00
    ext_attr_length: u8,        // 0x01
    extent: BothEndianU32,      // 0x02
    data_length: BothEndianU32, // 0x0A
    recorded_at: [u8; 7],       // 0x12
    flags: FileFlags,           // 0x19
    unit_size: u8,              // 0x1A
    interleave_gap: u8,         // 0x1B
    volume_sequence: [u8; 4],   // 0x1C
    name_length: u8,            // 0x20
}

const HEADER_SIZE: usize = size_of::<DirectoryRecordRaw>();

impl DirectoryRecordRaw {
    pub(crate) fn extent(&self) -> Extent {
        Extent {
            lba: self.extent.get(),
            len: self.data_length.get(),
        }
    }
}

/// Directory record file flags (ECMA-119 9.1.6).
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    FromBytes,
    IntoBytes,
    KnownLayout,
    Immutable,
    Unaligned,
)]
#[repr(C)]
pub struct FileFlags(u8);

bitflags::bitflags! {
    impl FileFlags: u8 {
        const HIDDEN = 0x01;
        const DIRECTORY = 0x02;
        const ASSOCIATED = 0x04;
        const RECORD = 0x08;
        const PROTECTION = 0x10;
        const MULTI_EXTENT = 0x80;
    }
}

/// A directory record read from the image, with its absolute position.
#[derive(Debug, Clone)]
#[must_use]
pub struct DirectoryRecord {
    offset: u64,
    raw: DirectoryRecordRaw,
    name: Vec<u8>,
}

impl DirectoryRecord {
    /// Size of the fixed part of a record.
    pub const HEADER_SIZE: usize = HEADER_SIZE;

    /// Position of the both-endian extent LBA inside a record.
    pub const EXTENT_FIELD: u64 = offset_of!(DirectoryRecordRaw, extent) as u64;

    /// Position of the both-endian data length inside a record.
    pub const DATA_LENGTH_FIELD: u64 = offset_of!(DirectoryRecordRaw, data_length) as u64;

    /// Reads the record starting at `offset`.
    ///
    /// Returns `None` when the length byte is zero, which marks the end of the
    /// used space in a sector.
    pub fn read(buffer: &SegmentedBuffer, offset: u64) -> Result<Option<Self>, ReadError> {
        let [length] = buffer.read_array::<1>(offset).context(OutOfImageSnafu {
            what: "directory record length",
            offset,
        })?;

        if length == 0 {
            return Ok(None);
        }

        ensure!(
            length as usize > Self::HEADER_SIZE,
            super::MalformedRecordSnafu { offset }
        );

        let bytes = buffer
            .read_array::<HEADER_SIZE>(offset)
            .context(OutOfImageSnafu {
                what: "directory record",
                offset,
            })?;

        let raw =
            DirectoryRecordRaw::read_from_bytes(&bytes).expect("header buffer is correctly sized");

        ensure!(
            Self::HEADER_SIZE + raw.name_length as usize <= length as usize,
            super::MalformedRecordSnafu { offset }
        );

        let name = buffer
            .read(offset + Self::HEADER_SIZE as u64, raw.name_length as usize)
            .context(OutOfImageSnafu {
                what: "file identifier",
                offset,
            })?;

        Ok(Some(Self { offset, raw, name }))
    }

    /// Returns the absolute byte offset of this record.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the record length in bytes.
    #[must_use]
    pub fn len(&self) -> u8 {
        self.raw.length
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.length == 0
    }

    /// Returns the first sector of the file or directory data.
    #[must_use]
    pub fn lba(&self) -> u32 {
        self.raw.extent.get()
    }

    /// Returns the unpadded size of the data in bytes.
    #[must_use]
    pub fn data_length(&self) -> u32 {
        self.raw.data_length.get()
    }

    #[must_use]
    pub fn extent(&self) -> Extent {
        Extent {
            lba: self.lba(),
            len: self.data_length(),
        }
    }

    #[must_use]
    pub fn flags(&self) -> FileFlags {
        self.raw.flags
    }

    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.raw.flags.contains(FileFlags::DIRECTORY)
    }

    /// Returns `true` for the `\0` (self) and `\1` (parent) entries.
    #[must_use]
    pub fn is_self_or_parent(&self) -> bool {
        matches!(self.name.as_slice(), [0] | [1])
    }

    /// Returns the identifier exactly as recorded.
    #[must_use]
    pub fn raw_name(&self) -> &[u8] {
        &self.name
    }

    /// Returns the identifier without a version suffix or NUL padding.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        logical_name(&self.name)
    }

    /// Rewrites both copies of the extent LBA of the record at `offset`.
    pub fn write_lba(
        buffer: &mut SegmentedBuffer,
        offset: u64,
        lba: u32,
    ) -> Result<(), RangeError> {
        buffer.write(
            offset + Self::EXTENT_FIELD,
            BothEndianU32::new(lba).as_bytes(),
        )
    }

    /// Rewrites both copies of the data length of the record at `offset`.
    pub fn write_data_length(
        buffer: &mut SegmentedBuffer,
        offset: u64,
        len: u32,
    ) -> Result<(), RangeError> {
        buffer.write(
            offset + Self::DATA_LENGTH_FIELD,
            BothEndianU32::new(len).as_bytes(),
        )
    }
}

/// Strips what is not part of a logical file name from a recorded identifier.
///
/// The identifier is cut at the first NUL (some mastering tools leave garbage
/// after it), then a trailing `;<version>` suffix is removed.
#[must_use]
pub fn logical_name(raw: &[u8]) -> &[u8] {
    let name = match raw.iter().position(|&b| b == 0) {
        Some(end) => &raw[..end],
        None => raw,
    };

    let Some(pos) = name.iter().rposition(|&b| b == b';') else {
        return name;
    };
    let version = &name[pos + 1..];

    if pos > 0 && !version.is_empty() && version.iter().all(u8::is_ascii_digit) {
        &name[..pos]
    } else {
        name
    }
}

/// Walks the directory records of one extent, sector by sector.
///
/// The cursor holds no borrow of the buffer, so the caller may patch the
/// records it has already seen between calls to [`next()`](Self::next).
#[derive(Debug, Clone)]
pub struct RecordCursor {
    base: u64,
    sectors: u64,
    sector: u64,
    pos: u64,
}

impl RecordCursor {
    pub fn new(extent: Extent) -> Self {
        Self {
            base: extent.offset(),
            sectors: extent.sectors(),
            sector: 0,
            pos: 0,
        }
    }

    /// Returns the next record, or `None` once every sector has been walked.
    pub fn next(&mut self, buffer: &SegmentedBuffer) -> Result<Option<DirectoryRecord>, ReadError> {
        while self.sector < self.sectors {
            if self.pos < SECTOR_SIZE {
                let offset = self.base + self.sector * SECTOR_SIZE + self.pos;

                if let Some(record) = DirectoryRecord::read(buffer, offset)? {
                    // Records never span sectors.
                    ensure!(
                        self.pos + record.len() as u64 <= SECTOR_SIZE,
                        super::MalformedRecordSnafu { offset }
                    );

                    self.pos += record.len() as u64;
                    return Ok(Some(record));
                }
            }

            self.sector += 1;
            self.pos = 0;
        }

        Ok(None)
    }
}
