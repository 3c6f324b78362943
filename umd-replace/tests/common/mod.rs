use umd_iso::{SegmentedBuffer, UmdImage};

pub const SECTOR: usize = 2048;

const TOTAL_SECTORS: u32 = 31;

const ROOT: u32 = 18;
const DATA: u32 = 24;
const SUB: u32 = 27;

/// Type L and type M path table locations.
const TABLES: (u32, u32) = (19, 30);

const FLAG_DIRECTORY: u8 = 0x02;

enum Entry {
    Dir(&'static str, u32),
    File {
        name: &'static str,
        lba: u32,
        fill: u8,
        len: usize,
    },
}

fn file(name: &'static str, lba: u32, fill: u8, len: usize) -> Entry {
    Entry::File {
        name,
        lba,
        fill,
        len,
    }
}

/// The image every batch test starts from:
///
/// ```text
/// /                LBA 18
/// /README.TXT      LBA 21  (100 bytes of 'r')
/// /DATA            LBA 24
/// /DATA/X.BIN      LBA 25  (3000 bytes of 'x')
/// /DATA/SUB        LBA 27
/// /DATA/SUB/Y.BIN  LBA 28  (1 byte 'y')
/// /Z.BIN           LBA 29  (2048 bytes of 'z')
/// ```
///
/// Path tables are at 19 (type L) and 30 (type M); the image is 31 sectors.
pub fn nested() -> Vec<u8> {
    let mut image = vec![0u8; TOTAL_SECTORS as usize * SECTOR];

    // (directory, parent, entries), in path table order.
    let dirs = [
        (
            ROOT,
            ROOT,
            vec![
                file("README.TXT;1", 21, b'r', 100),
                Entry::Dir("DATA", DATA),
                file("Z.BIN;1", 29, b'z', SECTOR),
            ],
        ),
        (
            DATA,
            ROOT,
            vec![file("X.BIN;1", 25, b'x', 3000), Entry::Dir("SUB", SUB)],
        ),
        (SUB, DATA, vec![file("Y.BIN;1", 28, b'y', 1)]),
    ];

    let l_table = path_table(false);
    let m_table = path_table(true);

    let pvd = 16 * SECTOR;
    descriptor_header(&mut image[pvd..], 1);
    both_u32(&mut image[pvd + 80..], TOTAL_SECTORS);
    both_u16(&mut image[pvd + 128..], SECTOR as u16);
    both_u32(&mut image[pvd + 132..], l_table.len() as u32);
    image[pvd + 140..pvd + 144].copy_from_slice(&TABLES.0.to_le_bytes());
    image[pvd + 148..pvd + 152].copy_from_slice(&TABLES.1.to_be_bytes());
    dir_record(&mut image[pvd + 156..], ROOT, &[0]);

    descriptor_header(&mut image[17 * SECTOR..], 255);

    for (table, lba) in [(l_table, TABLES.0), (m_table, TABLES.1)] {
        let offset = lba as usize * SECTOR;
        image[offset..offset + table.len()].copy_from_slice(&table);
    }

    for (lba, parent, entries) in dirs {
        let mut pos = lba as usize * SECTOR;

        pos += dir_record(&mut image[pos..], lba, &[0]);
        pos += dir_record(&mut image[pos..], parent, &[1]);

        for entry in entries {
            pos += match entry {
                Entry::Dir(name, sub) => dir_record(&mut image[pos..], sub, name.as_bytes()),
                Entry::File {
                    name,
                    lba,
                    fill,
                    len,
                } => {
                    let offset = lba as usize * SECTOR;
                    image[offset..offset + len].fill(fill);
                    record(&mut image[pos..], lba, len, 0, name.as_bytes())
                }
            };
        }
    }

    image
}

pub fn open(data: &[u8]) -> UmdImage {
    UmdImage::new(SegmentedBuffer::from_slice(data, 1 << 20)).unwrap()
}

fn descriptor_header(dst: &mut [u8], kind: u8) {
    dst[0] = kind;
    dst[1..6].copy_from_slice(b"CD001");
    dst[6] = 1;
}

fn path_table(big_endian: bool) -> Vec<u8> {
    let dirs: [(&[u8], u32, u16); 3] = [(&[0], ROOT, 1), (b"DATA", DATA, 1), (b"SUB", SUB, 2)];
    let mut table = Vec::new();

    for (name, lba, parent) in dirs {
        table.push(name.len() as u8);
        table.push(0);

        if big_endian {
            table.extend_from_slice(&lba.to_be_bytes());
            table.extend_from_slice(&parent.to_be_bytes());
        } else {
            table.extend_from_slice(&lba.to_le_bytes());
            table.extend_from_slice(&parent.to_le_bytes());
        }

        table.extend_from_slice(name);
        if name.len() % 2 == 1 {
            table.push(0);
        }
    }

    table
}

/// Writes a directory record and returns its length.
fn record(dst: &mut [u8], lba: u32, size: usize, flags: u8, name: &[u8]) -> usize {
    let len = 33 + name.len() + (name.len() + 1) % 2;

    dst[0] = len as u8;
    both_u32(&mut dst[2..], lba);
    both_u32(&mut dst[10..], size as u32);
    dst[25] = flags;
    both_u16(&mut dst[28..], 1);
    dst[32] = name.len() as u8;
    dst[33..33 + name.len()].copy_from_slice(name);

    len
}

/// Writes the record of a one-sector directory.
fn dir_record(dst: &mut [u8], lba: u32, name: &[u8]) -> usize {
    record(dst, lba, SECTOR, FLAG_DIRECTORY, name)
}

fn both_u32(dst: &mut [u8], value: u32) {
    dst[0..4].copy_from_slice(&value.to_le_bytes());
    dst[4..8].copy_from_slice(&value.to_be_bytes());
}

fn both_u16(dst: &mut [u8], value: u16) {
    dst[0..2].copy_from_slice(&value.to_le_bytes());
    dst[2..4].copy_from_slice(&value.to_be_bytes());
}
