use crate::IoCategory;
use crate::Status;
use crate::progress::ReplaceProgress;
use snafu::{ResultExt, Snafu};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use umd_iso::UmdImage;

const TEMP_SUFFIX: &str = ".umd-replace.tmp";
const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Errors that can occur when writing an image back to disk.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum SaveImageError {
    #[snafu(display("cannot create {}", path.display()))]
    CreateFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot write to {}", path.display()))]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot move {} over {}", from.display(), to.display()))]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

impl SaveImageError {
    #[must_use]
    pub fn status(&self) -> Status {
        match self {
            Self::CreateFailed { source, .. }
            | Self::WriteFailed { source, .. }
            | Self::RenameFailed { source, .. } => IoCategory::of(source).status(),
        }
    }
}

/// Returns the sibling file an image is written to before it replaces `path`.
#[must_use]
pub fn temp_path(path: &Path) -> PathBuf {
    let mut temp = path.as_os_str().to_owned();
    temp.push(TEMP_SUFFIX);
    temp.into()
}

/// Writes `image` over the file at `path`.
///
/// The data goes to a temporary sibling first, which is renamed over `path`
/// once it has been flushed to disk. On failure the temporary file is removed
/// and `path` is left as it was.
pub fn save_image(
    image: &UmdImage,
    path: &Path,
    progress: &impl ReplaceProgress,
) -> Result<(), SaveImageError> {
    let temp = temp_path(path);

    progress.write_start(path, image.len());

    let result = write_temp(image, &temp, progress).and_then(|()| {
        std::fs::rename(&temp, path).context(RenameFailedSnafu {
            from: &temp,
            to: path,
        })
    });

    if result.is_err() {
        let _ = std::fs::remove_file(&temp);
    }

    result?;
    progress.write_completed();

    Ok(())
}

fn write_temp(
    image: &UmdImage,
    path: &Path,
    progress: &impl ReplaceProgress,
) -> Result<(), SaveImageError> {
    let file = File::create(path).context(CreateFailedSnafu { path })?;
    let mut writer = BufWriter::new(file);

    for segment in image.buffer().segments() {
        for chunk in segment.chunks(CHUNK_SIZE) {
            writer.write_all(chunk).context(WriteFailedSnafu { path })?;
            progress.write_progress(chunk.len() as u64);
        }
    }

    let file = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context(WriteFailedSnafu { path })?;

    file.sync_all().context(WriteFailedSnafu { path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_file_is_a_sibling() {
        assert_eq!(
            temp_path(Path::new("/games/umd.iso")),
            Path::new("/games/umd.iso.umd-replace.tmp")
        );
    }
}
