mod error;

pub use self::error::ReplaceError;

use self::error::{
    ApplyFailedSnafu, DuplicateTargetSnafu, LoadPayloadFailedSnafu, PayloadTooLargeSnafu,
    ReadDescriptorFailedSnafu, ResolveFailedSnafu, TargetNotFoundSnafu,
};
use crate::progress::ReplaceProgress;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use snafu::{OptionExt, ResultExt, ensure};
use std::path::PathBuf;
use umd_iso::layout::SECTOR_SIZE;
use umd_iso::{Payload, UmdImage};

/// A request to swap the file at `target` inside the image for `source` on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// Path inside the image; either separator, any case.
    pub target: String,
    pub source: PathBuf,
}

impl Replacement {
    pub fn new(target: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            source: source.into(),
        }
    }
}

/// A request whose record has been located and whose data has been loaded.
#[derive(Debug)]
pub struct Resolved {
    index: usize,
    target: String,
    record_offset: u64,
    old_size: u32,
    payload: Payload,
}

impl Resolved {
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the offset of the directory record in the image as it is now.
    #[must_use]
    pub fn record_offset(&self) -> u64 {
        self.record_offset
    }

    #[must_use]
    pub fn old_size(&self) -> u32 {
        self.old_size
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// What a batch changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub old_sectors: u32,
    pub new_sectors: u32,
    /// One entry per request, in request order.
    pub files: Vec<FileSummary>,
}

impl BatchSummary {
    /// Returns the signed change of the image size in bytes.
    #[must_use]
    pub fn byte_delta(&self) -> i64 {
        self.files
            .iter()
            .map(|f| f.sector_delta * SECTOR_SIZE as i64)
            .sum()
    }

    #[must_use]
    pub fn size_changed(&self) -> bool {
        self.byte_delta() != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub target: String,
    pub old_size: u64,
    pub new_size: u64,
    pub sector_delta: i64,
}

/// Applies a batch of replacements to an image.
pub struct BatchReplacer<P: ReplaceProgress> {
    progress: P,
}

impl<P: ReplaceProgress> BatchReplacer<P> {
    pub fn new(progress: P) -> Self {
        Self { progress }
    }

    pub fn progress(&self) -> &P {
        &self.progress
    }

    /// Resolves every request against `image` and then applies them all.
    ///
    /// The image is left untouched if any request fails to resolve.
    pub fn run(
        &self,
        image: &mut UmdImage,
        requests: &[Replacement],
    ) -> Result<BatchSummary, ReplaceError> {
        let resolved = self.resolve(image, requests)?;
        self.apply(image, resolved)
    }

    /// Locates every target and loads every source, in parallel.
    ///
    /// Each request does one lookup and one file read, joined with rayon.
    /// Fails if any target is missing or two requests name the same record.
    pub fn resolve(
        &self,
        image: &UmdImage,
        requests: &[Replacement],
    ) -> Result<Vec<Resolved>, ReplaceError> {
        self.progress.resolve_start(requests.len());

        let indexed: Vec<(usize, &Replacement)> = requests.iter().enumerate().collect();
        let resolved = indexed
            .par_iter()
            .map(|&(index, request)| self.resolve_one(image, index, request))
            .collect::<Result<Vec<_>, _>>()?;

        let mut by_offset: Vec<&Resolved> = resolved.iter().collect();
        by_offset.sort_by_key(|r| (r.record_offset, r.index));

        for pair in by_offset.windows(2) {
            ensure!(
                pair[0].record_offset != pair[1].record_offset,
                DuplicateTargetSnafu {
                    first: &pair[0].target,
                    second: &pair[1].target,
                }
            );
        }

        Ok(resolved)
    }

    fn resolve_one(
        &self,
        image: &UmdImage,
        index: usize,
        request: &Replacement,
    ) -> Result<Resolved, ReplaceError> {
        let target = &request.target;
        let (record, data) = rayon::join(
            || image.resolve(target),
            || std::fs::read(&request.source),
        );

        let record = record
            .context(ResolveFailedSnafu { target })?
            .context(TargetNotFoundSnafu { target })?;

        let data = data.context(LoadPayloadFailedSnafu {
            path: &request.source,
        })?;

        let len = data.len() as u64;
        ensure!(
            len <= u32::MAX as u64,
            PayloadTooLargeSnafu {
                path: &request.source,
                len,
            }
        );

        self.progress.resolved(target, &request.source, len);

        Ok(Resolved {
            index,
            target: target.clone(),
            record_offset: record.offset(),
            old_size: record.data_length(),
            payload: Payload::new(data),
        })
    }

    /// Applies resolved requests one at a time, from the highest record offset down.
    ///
    /// A splice only moves bytes past the replaced extent, so offsets of the
    /// requests still pending remain valid. Any pending record that did sit
    /// past the extent is moved along with it.
    pub fn apply(
        &self,
        image: &mut UmdImage,
        mut pending: Vec<Resolved>,
    ) -> Result<BatchSummary, ReplaceError> {
        let old_sectors = image.total_sectors().context(ReadDescriptorFailedSnafu)?;
        let mut files = Vec::with_capacity(pending.len());

        pending.sort_by_key(|r| r.record_offset);

        while let Some(request) = pending.pop() {
            let outcome = image
                .replace(request.record_offset, &request.payload)
                .context(ApplyFailedSnafu {
                    target: &request.target,
                })?;

            for other in &mut pending {
                other.record_offset = outcome.relocate(other.record_offset);
            }

            self.progress.applied(
                &request.target,
                outcome.old_len.into(),
                outcome.new_len.into(),
                outcome.sector_delta(),
            );

            files.push((
                request.index,
                FileSummary {
                    target: request.target,
                    old_size: outcome.old_len.into(),
                    new_size: outcome.new_len.into(),
                    sector_delta: outcome.sector_delta(),
                },
            ));
        }

        files.sort_by_key(|&(index, _)| index);

        Ok(BatchSummary {
            old_sectors,
            new_sectors: image.total_sectors().context(ReadDescriptorFailedSnafu)?,
            files: files.into_iter().map(|(_, file)| file).collect(),
        })
    }
}
