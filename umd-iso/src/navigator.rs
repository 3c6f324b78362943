//! Path resolution against the directory tree.

use crate::buffer::SegmentedBuffer;
use crate::layout::{self, DirectoryRecord, Extent, RecordCursor};
use snafu::{ResultExt, Snafu, ensure};

/// Deepest directory nesting followed before the tree is considered corrupt.
pub const MAX_DEPTH: usize = 64;

/// Errors of [`resolve()`].
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ResolveError {
    #[snafu(display("cannot read volume descriptor"), visibility(pub(crate)))]
    ReadDescriptor { source: layout::ReadError },

    #[snafu(display("cannot read directory record"))]
    ReadRecord { source: layout::ReadError },

    #[snafu(display("directory tree is nested deeper than {MAX_DEPTH} levels at {path}"))]
    TooDeep { path: String },
}

/// Normalizes a user-supplied path to the form built during the walk.
///
/// Backslashes become slashes, empty components are dropped and the result
/// always starts with a single `/`.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);

    for component in path.split(['/', '\\']).filter(|c| !c.is_empty()) {
        normalized.push('/');
        normalized.push_str(component);
    }

    if normalized.is_empty() {
        normalized.push('/');
    }

    normalized
}

/// Finds the directory record of the file at `target`, starting from `root`.
///
/// The comparison ignores ASCII case and version suffixes. Directories are
/// only descended into, never matched. The first match in sector order, then
/// record order, wins; subdirectories are searched before later siblings.
///
/// Only reads from `buffer`, so concurrent calls are safe.
pub fn resolve(
    buffer: &SegmentedBuffer,
    root: Extent,
    target: &str,
) -> Result<Option<DirectoryRecord>, ResolveError> {
    let target = normalize_path(target);
    search(buffer, root, b"", target.as_bytes(), 0)
}

fn search(
    buffer: &SegmentedBuffer,
    extent: Extent,
    parent: &[u8],
    target: &[u8],
    depth: usize,
) -> Result<Option<DirectoryRecord>, ResolveError> {
    ensure!(
        depth <= MAX_DEPTH,
        TooDeepSnafu {
            path: String::from_utf8_lossy(parent)
        }
    );

    let mut cursor = RecordCursor::new(extent);
    let mut path = Vec::with_capacity(parent.len() + 32);

    while let Some(record) = cursor.next(buffer).context(ReadRecordSnafu)? {
        if record.is_self_or_parent() {
            continue;
        }

        path.clear();
        path.extend_from_slice(parent);
        path.push(b'/');
        path.extend_from_slice(record.name());

        if record.is_directory() {
            // Only a directory whose path prefixes the target can contain it.
            if !is_ancestor(&path, target) {
                continue;
            }

            if let Some(found) = search(buffer, record.extent(), &path, target, depth + 1)? {
                return Ok(Some(found));
            }
        } else if path.eq_ignore_ascii_case(target) {
            return Ok(Some(record));
        }
    }

    Ok(None)
}

fn is_ancestor(dir: &[u8], target: &[u8]) -> bool {
    target.len() > dir.len()
        && target[dir.len()] == b'/'
        && target[..dir.len()].eq_ignore_ascii_case(dir)
}
