use snafu::{Snafu, ensure};
use std::cmp::min;
use std::io::{self, Read, Write};

/// Default capacity of a single backing segment (1 GiB).
pub const DEFAULT_SEGMENT_CAPACITY: usize = 1 << 30;

/// Errors for offset arithmetic that falls outside the buffer.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum RangeError {
    #[snafu(display("range {offset:#x}+{len:#x} is past image end {image_len:#x}"))]
    OutOfRange {
        offset: u64,
        len: u64,
        image_len: u64,
    },
}

/// A logical byte array stored as a list of fixed-capacity segments.
///
/// Every segment except the last one holds exactly `segment_capacity` bytes,
/// so a logical offset maps to `(offset / capacity, offset % capacity)`
/// without a lookup table. This keeps each allocation below the capacity
/// ceiling regardless of the image size.
///
/// Segments are never exposed mutably; all changes go through
/// [`write()`](Self::write) and [`splice()`](Self::splice), which restore the
/// layout invariant before returning.
#[must_use]
pub struct SegmentedBuffer {
    segments: Vec<Vec<u8>>,
    capacity: usize,
    len: u64,
}

impl std::fmt::Debug for SegmentedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentedBuffer")
            .field("len", &self.len)
            .field("segment_capacity", &self.capacity)
            .field("segment_count", &self.segments.len())
            .finish()
    }
}

impl SegmentedBuffer {
    /// Creates an empty buffer whose segments hold at most `segment_capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `segment_capacity` is zero.
    pub fn new(segment_capacity: usize) -> Self {
        assert!(segment_capacity > 0, "segment capacity must be non-zero");

        Self {
            segments: Vec::new(),
            capacity: segment_capacity,
            len: 0,
        }
    }

    /// Creates a buffer holding a copy of `data`.
    pub fn from_slice(data: &[u8], segment_capacity: usize) -> Self {
        let mut buffer = Self::new(segment_capacity);
        buffer.extend_from_slice(data);
        buffer
    }

    /// Reads `reader` to the end into a new buffer, one segment at a time.
    pub fn from_reader<R: Read>(mut reader: R, segment_capacity: usize) -> io::Result<Self> {
        let mut buffer = Self::new(segment_capacity);

        loop {
            let mut segment = Vec::new();
            let read = reader
                .by_ref()
                .take(segment_capacity as u64)
                .read_to_end(&mut segment)?;

            if read == 0 {
                break;
            }

            buffer.len += read as u64;
            buffer.segments.push(segment);

            if read < segment_capacity {
                break;
            }
        }

        Ok(buffer)
    }

    /// Appends `data` to the end of the buffer.
    pub fn extend_from_slice(&mut self, data: &[u8]) {
        append(&mut self.segments, self.capacity, data);
        self.len += data.len() as u64;
    }

    /// Returns the logical length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the capacity of a single segment.
    #[must_use]
    pub fn segment_capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the backing segments in logical order.
    pub fn segments(&self) -> impl ExactSizeIterator<Item = &[u8]> {
        self.segments.iter().map(|s| s.as_slice())
    }

    /// Fills `output_buf` with the bytes starting at `offset`.
    pub fn read_at(&self, offset: u64, output_buf: &mut [u8]) -> Result<(), RangeError> {
        self.check_range(offset, output_buf.len() as u64)?;

        let mut copied = 0;
        let mut pos = offset;

        while copied < output_buf.len() {
            let (index, start) = self.locate(pos);
            let segment = &self.segments[index];
            let n = min(segment.len() - start, output_buf.len() - copied);

            output_buf[copied..copied + n].copy_from_slice(&segment[start..start + n]);

            copied += n;
            pos += n as u64;
        }

        Ok(())
    }

    /// Returns a copy of `len` bytes starting at `offset`.
    pub fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>, RangeError> {
        let mut data = vec![0u8; len];
        self.read_at(offset, &mut data)?;
        Ok(data)
    }

    /// Reads a fixed-size array starting at `offset`.
    pub fn read_array<const N: usize>(&self, offset: u64) -> Result<[u8; N], RangeError> {
        let mut data = [0u8; N];
        self.read_at(offset, &mut data)?;
        Ok(data)
    }

    /// Overwrites the bytes starting at `offset` with `data`.
    ///
    /// The write may cross segment boundaries but never extends the buffer.
    pub fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), RangeError> {
        self.check_start(offset, data.len() as u64)?;
        self.check_range(offset, data.len() as u64)?;

        let mut written = 0;
        let mut pos = offset;

        while written < data.len() {
            let (index, start) = self.locate(pos);
            let segment = &mut self.segments[index];
            let n = min(segment.len() - start, data.len() - written);

            segment[start..start + n].copy_from_slice(&data[written..written + n]);

            written += n;
            pos += n as u64;
        }

        Ok(())
    }

    /// Removes `remove_len` bytes at `offset` and inserts `insert` in their place.
    ///
    /// Every byte after the removed range moves by `insert.len() - remove_len`.
    /// Segments before the one containing `offset` are left untouched; the rest
    /// are rebuilt, releasing each old segment as soon as it has been consumed.
    pub fn splice(
        &mut self,
        offset: u64,
        remove_len: u64,
        insert: &[u8],
    ) -> Result<(), RangeError> {
        self.check_start(offset, remove_len)?;
        self.check_range(offset, remove_len)?;

        if remove_len == 0 && insert.is_empty() {
            return Ok(());
        }

        let (first, start) = self.locate(offset);
        let mut tail = self.segments.split_off(first).into_iter();

        // `offset < len`, so the segment holding it always exists.
        let Some(head) = tail.next() else {
            unreachable!("segment #{first} is missing");
        };

        append(&mut self.segments, self.capacity, &head[..start]);
        append(&mut self.segments, self.capacity, insert);

        let mut skip = remove_len;

        for (segment, from) in std::iter::once((head, start)).chain(tail.map(|s| (s, 0))) {
            let available = (segment.len() - from) as u64;

            if skip >= available {
                skip -= available;
                continue;
            }

            append(
                &mut self.segments,
                self.capacity,
                &segment[from + skip as usize..],
            );

            skip = 0;
        }

        self.len = self.len - remove_len + insert.len() as u64;

        debug_assert_eq!(
            self.segments.iter().map(|s| s.len() as u64).sum::<u64>(),
            self.len
        );

        Ok(())
    }

    /// Writes the whole buffer to `output`.
    pub fn write_to<W: Write>(&self, mut output: W) -> io::Result<()> {
        for segment in &self.segments {
            output.write_all(segment)?;
        }

        Ok(())
    }

    /// Copies the whole buffer into one contiguous vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.segments.concat()
    }

    fn locate(&self, offset: u64) -> (usize, usize) {
        let capacity = self.capacity as u64;
        ((offset / capacity) as usize, (offset % capacity) as usize)
    }

    fn check_start(&self, offset: u64, len: u64) -> Result<(), RangeError> {
        ensure!(
            offset < self.len,
            OutOfRangeSnafu {
                offset,
                len,
                image_len: self.len
            }
        );

        Ok(())
    }

    fn check_range(&self, offset: u64, len: u64) -> Result<(), RangeError> {
        ensure!(
            offset.checked_add(len).is_some_and(|end| end <= self.len),
            OutOfRangeSnafu {
                offset,
                len,
                image_len: self.len
            }
        );

        Ok(())
    }
}

/// Appends `data` to `segments`, filling the last segment up to `capacity`
/// before starting a new one.
fn append(segments: &mut Vec<Vec<u8>>, capacity: usize, mut data: &[u8]) {
    while !data.is_empty() {
        match segments.last_mut() {
            Some(last) if last.len() < capacity => {
                let n = min(capacity - last.len(), data.len());
                last.reserve_exact(n);
                last.extend_from_slice(&data[..n]);
                data = &data[n..];
            }
            _ => {
                let n = min(capacity, data.len());
                segments.push(data[..n].to_vec());
                data = &data[n..];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn assert_layout(buffer: &SegmentedBuffer) {
        let lens: Vec<usize> = buffer.segments().map(<[u8]>::len).collect();

        if let Some((last, full)) = lens.split_last() {
            assert!(full.iter().all(|&l| l == buffer.segment_capacity()));
            assert!(*last > 0 && *last <= buffer.segment_capacity());
        }

        assert_eq!(lens.iter().sum::<usize>() as u64, buffer.len());
    }

    #[test]
    fn from_slice_partitions_into_segments() {
        let buffer = SegmentedBuffer::from_slice(&pattern(10), 4);

        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.segments().len(), 3);
        assert_layout(&buffer);
    }

    #[test]
    fn from_reader_matches_from_slice() {
        let data = pattern(4096 + 17);
        let read = SegmentedBuffer::from_reader(data.as_slice(), 1024).unwrap();

        assert_eq!(read.to_vec(), data);
        assert_eq!(read.segments().len(), 5);
        assert_layout(&read);

        let exact = SegmentedBuffer::from_reader(&data[..2048], 1024).unwrap();
        assert_eq!(exact.segments().len(), 2);
        assert_layout(&exact);
    }

    #[test]
    fn read_and_write_cross_segment_boundaries() {
        let mut buffer = SegmentedBuffer::from_slice(&pattern(16), 4);

        assert_eq!(buffer.read(2, 7).unwrap(), pattern(16)[2..9]);

        buffer.write(3, &[0xAA; 6]).unwrap();

        let mut expected = pattern(16);
        expected[3..9].fill(0xAA);
        assert_eq!(buffer.to_vec(), expected);
    }

    #[test]
    fn out_of_range_access_fails() {
        let mut buffer = SegmentedBuffer::from_slice(&pattern(8), 4);

        assert!(buffer.read(6, 3).is_err());
        assert!(buffer.read(8, 0).is_ok());
        assert!(buffer.write(8, &[1]).is_err());
        assert!(buffer.write(7, &[1, 2]).is_err());
        assert!(buffer.splice(8, 0, &[1]).is_err());
        assert!(buffer.splice(6, 4, &[]).is_err());
        assert!(buffer.read(u64::MAX, 2).is_err());

        // Nothing changed.
        assert_eq!(buffer.to_vec(), pattern(8));
    }

    #[test]
    fn splice_grows_and_shrinks() {
        let original = pattern(23);

        for capacity in [1, 3, 4, 7, 64] {
            for offset in [0usize, 1, 5, 11, 22] {
                for remove in [0usize, 1, 4] {
                    if offset + remove > original.len() {
                        continue;
                    }

                    for insert_len in [0usize, 2, 9] {
                        let insert = vec![0xEE; insert_len];
                        let mut buffer = SegmentedBuffer::from_slice(&original, capacity);
                        buffer
                            .splice(offset as u64, remove as u64, &insert)
                            .unwrap();

                        let mut expected = original.clone();
                        expected.splice(offset..offset + remove, insert.iter().copied());

                        assert_eq!(buffer.to_vec(), expected, "cap {capacity} at {offset}");
                        assert_eq!(buffer.len(), expected.len() as u64);
                        assert_layout(&buffer);
                    }
                }
            }
        }
    }

    #[test]
    fn splice_leaves_leading_segments_alone() {
        let mut buffer = SegmentedBuffer::from_slice(&pattern(40), 8);
        let before: Vec<*const u8> = buffer.segments().map(<[u8]>::as_ptr).collect();

        buffer.splice(20, 8, &[0; 16]).unwrap();

        let after: Vec<*const u8> = buffer.segments().map(<[u8]>::as_ptr).collect();
        assert_eq!(before[..2], after[..2]);
        assert_layout(&buffer);
    }

    #[test]
    fn splice_removing_everything_after_offset() {
        let mut buffer = SegmentedBuffer::from_slice(&pattern(12), 4);
        buffer.splice(4, 8, &[]).unwrap();

        assert_eq!(buffer.to_vec(), pattern(4));
        assert_eq!(buffer.segments().len(), 1);
        assert_layout(&buffer);
    }

    #[test]
    fn write_to_streams_all_segments() {
        let buffer = SegmentedBuffer::from_slice(&pattern(10), 3);
        let mut out = Vec::new();
        buffer.write_to(&mut out).unwrap();

        assert_eq!(out, pattern(10));
    }
}
