#![allow(dead_code)]

use umd_iso::{SegmentedBuffer, UmdImage};

pub const SECTOR: usize = 2048;

/// Offset of the first path table location field inside the descriptor.
const PATH_TABLE_FIELDS: usize = 140;

const FLAG_DIRECTORY: u8 = 0x02;

/// Builds small ISO 9660 images with every extent at an explicit LBA.
///
/// Each directory occupies exactly one sector. Sector 16 holds the primary
/// volume descriptor and sector 17 the set terminator.
pub struct IsoBuilder {
    dirs: Vec<Dir>,
    /// Path table locations by descriptor slot: L, optional L, M, optional M.
    tables: [Option<u32>; 4],
    trailing: u32,
}

struct Dir {
    path: String,
    name: Vec<u8>,
    lba: u32,
    parent: usize,
    children: Vec<Child>,
}

enum Child {
    Dir(usize),
    File {
        name: Vec<u8>,
        lba: u32,
        data: Vec<u8>,
    },
}

impl IsoBuilder {
    pub fn new(root_lba: u32) -> Self {
        Self {
            dirs: vec![Dir {
                path: "/".to_string(),
                name: vec![0],
                lba: root_lba,
                parent: 0,
                children: Vec::new(),
            }],
            tables: [None; 4],
            trailing: 0,
        }
    }

    /// Records a type L and a type M path table at the given sectors.
    pub fn path_tables(mut self, l_lba: u32, m_lba: u32) -> Self {
        self.tables[0] = Some(l_lba);
        self.tables[2] = Some(m_lba);
        self
    }

    /// Records the optional copies of the type L and type M path tables.
    pub fn optional_path_tables(mut self, l_lba: u32, m_lba: u32) -> Self {
        self.tables[1] = Some(l_lba);
        self.tables[3] = Some(m_lba);
        self
    }

    /// Appends unused sectors after the last extent.
    pub fn trailing_sectors(mut self, count: u32) -> Self {
        self.trailing = count;
        self
    }

    pub fn dir(mut self, parent: &str, name: &str, lba: u32) -> Self {
        let parent = self.find(parent);
        let index = self.dirs.len();
        let path = match parent {
            0 => format!("/{name}"),
            _ => format!("{}/{name}", self.dirs[parent].path),
        };

        self.dirs.push(Dir {
            path,
            name: name.as_bytes().to_vec(),
            lba,
            parent,
            children: Vec::new(),
        });
        self.dirs[parent].children.push(Child::Dir(index));
        self
    }

    /// Adds a file whose record carries `name` verbatim, version suffix included.
    pub fn file(self, parent: &str, name: &str, lba: u32, data: &[u8]) -> Self {
        self.raw_file(parent, name.as_bytes(), lba, data)
    }

    pub fn raw_file(mut self, parent: &str, name: &[u8], lba: u32, data: &[u8]) -> Self {
        let parent = self.find(parent);

        self.dirs[parent].children.push(Child::File {
            name: name.to_vec(),
            lba,
            data: data.to_vec(),
        });
        self
    }

    pub fn build(self) -> Vec<u8> {
        let table_len = self.path_table_records(false).len();
        let total = self.end_lba(table_len) + self.trailing;
        let mut image = vec![0u8; total as usize * SECTOR];

        let pvd = 16 * SECTOR;
        image[pvd] = 1;
        image[pvd + 1..pvd + 6].copy_from_slice(b"CD001");
        image[pvd + 6] = 1;
        both_u32(&mut image[pvd + 80..], total);
        both_u16(&mut image[pvd + 128..], SECTOR as u16);
        both_u32(&mut image[pvd + 132..], table_len as u32);

        for (slot, table) in self.tables.iter().enumerate() {
            if let Some(lba) = *table {
                let big_endian = slot >= 2;
                let field = pvd + PATH_TABLE_FIELDS + 4 * slot;

                put_u32(&mut image[field..], lba, big_endian);
                self.write_path_table(&mut image, lba, big_endian);
            }
        }

        dir_record(&mut image[pvd + 156..], self.dirs[0].lba, &[0]);

        let terminator = 17 * SECTOR;
        image[terminator] = 255;
        image[terminator + 1..terminator + 6].copy_from_slice(b"CD001");
        image[terminator + 6] = 1;

        for dir in &self.dirs {
            let start = dir.lba as usize * SECTOR;
            let mut pos = start;
            let parent = &self.dirs[dir.parent];

            pos += dir_record(&mut image[pos..], dir.lba, &[0]);
            pos += dir_record(&mut image[pos..], parent.lba, &[1]);

            for child in &dir.children {
                pos += match child {
                    Child::Dir(index) => {
                        let sub = &self.dirs[*index];
                        dir_record(&mut image[pos..], sub.lba, &sub.name)
                    }
                    Child::File { name, lba, data } => {
                        let offset = *lba as usize * SECTOR;
                        image[offset..offset + data.len()].copy_from_slice(data);
                        record(&mut image[pos..], *lba, data.len() as u32, 0, name)
                    }
                };
            }

            assert!(pos <= start + SECTOR, "{} overflows its sector", dir.path);
        }

        image
    }

    fn find(&self, path: &str) -> usize {
        self.dirs
            .iter()
            .position(|d| d.path == path)
            .unwrap_or_else(|| panic!("no directory {path}"))
    }

    fn end_lba(&self, table_len: usize) -> u32 {
        let table_sectors = table_len.div_ceil(SECTOR).max(1) as u32;
        let mut end = 18;

        for lba in self.tables.into_iter().flatten() {
            end = end.max(lba + table_sectors);
        }

        for dir in &self.dirs {
            end = end.max(dir.lba + 1);

            for child in &dir.children {
                if let Child::File { lba, data, .. } = child {
                    end = end.max(lba + data.len().div_ceil(SECTOR) as u32);
                }
            }
        }

        end
    }

    fn path_table_records(&self, big_endian: bool) -> Vec<u8> {
        let mut table = Vec::new();

        for dir in &self.dirs {
            let mut header = [dir.name.len() as u8, 0, 0, 0, 0, 0, 0, 0];
            put_u32(&mut header[2..], dir.lba, big_endian);

            let parent = dir.parent as u16 + 1;
            if big_endian {
                header[6..].copy_from_slice(&parent.to_be_bytes());
            } else {
                header[6..].copy_from_slice(&parent.to_le_bytes());
            }

            table.extend_from_slice(&header);
            table.extend_from_slice(&dir.name);

            if dir.name.len() % 2 == 1 {
                table.push(0);
            }
        }

        table
    }

    fn write_path_table(&self, image: &mut [u8], lba: u32, big_endian: bool) {
        let table = self.path_table_records(big_endian);
        let offset = lba as usize * SECTOR;
        image[offset..offset + table.len()].copy_from_slice(&table);
    }
}

fn both_u32(dst: &mut [u8], value: u32) {
    dst[0..4].copy_from_slice(&value.to_le_bytes());
    dst[4..8].copy_from_slice(&value.to_be_bytes());
}

fn both_u16(dst: &mut [u8], value: u16) {
    dst[0..2].copy_from_slice(&value.to_le_bytes());
    dst[2..4].copy_from_slice(&value.to_be_bytes());
}

fn put_u32(dst: &mut [u8], value: u32, big_endian: bool) {
    if big_endian {
        dst[..4].copy_from_slice(&value.to_be_bytes());
    } else {
        dst[..4].copy_from_slice(&value.to_le_bytes());
    }
}

/// Writes a directory record and returns its length.
fn record(dst: &mut [u8], lba: u32, size: u32, flags: u8, name: &[u8]) -> usize {
    let len = 33 + name.len() + (name.len() + 1) % 2;

    dst[0] = len as u8;
    both_u32(&mut dst[2..], lba);
    both_u32(&mut dst[10..], size);
    dst[25] = flags;
    both_u16(&mut dst[28..], 1);
    dst[32] = name.len() as u8;
    dst[33..33 + name.len()].copy_from_slice(name);

    len
}

/// Writes the record of a one-sector directory.
fn dir_record(dst: &mut [u8], lba: u32, name: &[u8]) -> usize {
    record(dst, lba, SECTOR as u32, FLAG_DIRECTORY, name)
}

/// One-sector root at LBA 18 holding `A.BIN` (LBA 20) and `B.BIN` (LBA 21),
/// one sector each, with path tables at 19 and 22.
pub fn two_files() -> Vec<u8> {
    IsoBuilder::new(18)
        .path_tables(19, 22)
        .file("/", "A.BIN;1", 20, &[0xAA; SECTOR])
        .file("/", "B.BIN;1", 21, &[0xBB; SECTOR])
        .build()
}

/// A nested tree with a subdirectory stored after file data:
///
/// ```text
/// /            LBA 18
/// /README.TXT  LBA 21  (100 bytes)
/// /DATA        LBA 24
/// /DATA/X.BIN  LBA 25  (3000 bytes)
/// /DATA/SUB    LBA 27
/// /DATA/SUB/Y.BIN  LBA 28  (1 byte)
/// /Z.BIN       LBA 29  (2048 bytes)
/// ```
///
/// Path tables are at 19 (type L) and 30 (type M).
pub fn nested() -> Vec<u8> {
    IsoBuilder::new(18)
        .path_tables(19, 30)
        .file("/", "README.TXT;1", 21, &[b'r'; 100])
        .dir("/", "DATA", 24)
        .file("/DATA", "X.BIN;1", 25, &[b'x'; 3000])
        .dir("/DATA", "SUB", 27)
        .file("/DATA/SUB", "Y.BIN;1", 28, b"y")
        .file("/", "Z.BIN;1", 29, &[b'z'; SECTOR])
        .build()
}

pub fn open(data: &[u8]) -> UmdImage {
    open_with_capacity(data, 1 << 20)
}

pub fn open_with_capacity(data: &[u8], segment_capacity: usize) -> UmdImage {
    UmdImage::new(SegmentedBuffer::from_slice(data, segment_capacity)).unwrap()
}

pub fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

pub fn read_u32_be(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(data[offset..offset + 4].try_into().unwrap())
}
