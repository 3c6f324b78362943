use super::path_table::{Endian, PathTableLocation};
use super::record::DirectoryRecordRaw;
use super::{BothEndianU32, DESCRIPTOR_LBA, Extent, OutOfImageSnafu, ReadError, sector_offset};
use crate::buffer::{RangeError, SegmentedBuffer};
use snafu::{ResultExt, ensure};
use std::mem::offset_of;
use zerocopy::byteorder::{big_endian, little_endian};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

const TYPE_PRIMARY: u8 = 1;
const STANDARD_IDENTIFIER: &[u8; 5] = b"CD001";
const VERSION: u8 = 1;

/// Leading part of the primary volume descriptor, up to and including the
/// root directory record.
///
/// See ECMA-119 8.4.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub(crate) struct VolumeDescriptorRaw {
    ty: u8,                               // 0x00
    identifier: [u8; 5],                  // 0x01
    version: u8,                          // 0x06
    unused1: u8,                          // 0x07
    system_id: [u8; 32],                  // 0x08
    volume_id: [u8; 32],                  // 0x28
    unused2: [u8; 8],                     // 0x48
    space_size: BothEndianU32,            // 0x50
    unused3: [u8; 32],                    // 0x58
    set_size: [u8; 4],                    // 0x78
    sequence_number: [u8; 4],             // 0x7C
    block_size: [u8; 4],                  // 0x80
    path_table_size: BothEndianU32,       // 0x84
    l_path_table: little_endian::U32,     // 0x8C
    opt_l_path_table: little_endian::U32, // 0x90
    m_path_table: big_endian::U32,        // 0x94
    opt_m_path_table: big_endian::U32,    // 0x98
    root: DirectoryRecordRaw,             // 0x9C
    root_name: u8,                        // 0xBD
}

const RAW_SIZE: usize = size_of::<VolumeDescriptorRaw>();

/// The primary volume descriptor at sector 16.
///
/// This is a snapshot; the accessors do not observe later writes to the
/// buffer. Re-read the descriptor after changing it.
#[must_use]
pub struct VolumeDescriptor {
    raw: VolumeDescriptorRaw,
}

impl std::fmt::Debug for VolumeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeDescriptor")
            .field("total_sectors", &self.total_sectors())
            .field("root", &self.root())
            .field("path_table_size", &self.path_table_size())
            .field("path_tables", &self.path_tables())
            .finish()
    }
}

impl VolumeDescriptor {
    /// Absolute byte offset of the descriptor.
    pub const OFFSET: u64 = sector_offset(DESCRIPTOR_LBA);

    /// Absolute byte offset of the total sector count.
    pub const TOTAL_SECTORS_FIELD: u64 =
        Self::OFFSET + offset_of!(VolumeDescriptorRaw, space_size) as u64;

    /// Absolute byte offset of the embedded root directory record.
    pub const ROOT_RECORD: u64 = Self::OFFSET + offset_of!(VolumeDescriptorRaw, root) as u64;

    const PATH_TABLE_FIELDS: u64 =
        Self::OFFSET + offset_of!(VolumeDescriptorRaw, l_path_table) as u64;

    /// Reads and validates the descriptor.
    pub fn read(buffer: &SegmentedBuffer) -> Result<Self, ReadError> {
        let bytes = buffer
            .read_array::<RAW_SIZE>(Self::OFFSET)
            .context(OutOfImageSnafu {
                what: "volume descriptor",
                offset: Self::OFFSET,
            })?;

        let raw = VolumeDescriptorRaw::read_from_bytes(&bytes)
            .expect("descriptor buffer is correctly sized");

        ensure!(
            raw.ty == TYPE_PRIMARY
                && &raw.identifier == STANDARD_IDENTIFIER
                && raw.version == VERSION,
            super::NotPrimaryDescriptorSnafu
        );

        Ok(Self { raw })
    }

    /// Returns the volume space size in sectors.
    #[must_use]
    pub fn total_sectors(&self) -> u32 {
        self.raw.space_size.get()
    }

    /// Returns the extent of the root directory.
    #[must_use]
    pub fn root(&self) -> Extent {
        self.raw.root.extent()
    }

    /// Returns the size in bytes shared by all path tables.
    #[must_use]
    pub fn path_table_size(&self) -> u32 {
        self.raw.path_table_size.get()
    }

    /// Returns the four path table locations, including absent ones.
    #[must_use]
    pub fn path_tables(&self) -> [PathTableLocation; 4] {
        let fields = [
            (self.raw.l_path_table.get(), Endian::Little),
            (self.raw.opt_l_path_table.get(), Endian::Little),
            (self.raw.m_path_table.get(), Endian::Big),
            (self.raw.opt_m_path_table.get(), Endian::Big),
        ];

        std::array::from_fn(|slot| {
            let (lba, endian) = fields[slot];
            PathTableLocation { slot, lba, endian }
        })
    }

    /// Returns the absolute byte offset of the location field for path table `slot`.
    #[must_use]
    pub const fn path_table_field(slot: usize) -> u64 {
        Self::PATH_TABLE_FIELDS + 4 * slot as u64
    }

    /// Rewrites both copies of the total sector count.
    pub fn write_total_sectors(
        buffer: &mut SegmentedBuffer,
        sectors: u32,
    ) -> Result<(), RangeError> {
        buffer.write(
            Self::TOTAL_SECTORS_FIELD,
            BothEndianU32::new(sectors).as_bytes(),
        )
    }

    /// Rewrites the location field of a path table, in the table's byte order.
    pub fn write_path_table_lba(
        buffer: &mut SegmentedBuffer,
        table: &PathTableLocation,
        lba: u32,
    ) -> Result<(), RangeError> {
        buffer.write(
            Self::path_table_field(table.slot),
            &table.endian.encode(lba),
        )
    }
}
