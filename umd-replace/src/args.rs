//! Expansion of the positional arguments that follow the image path.

use crate::replace::Replacement;
use snafu::{ResultExt, Snafu, ensure};
use std::path::{Path, PathBuf};

/// Errors of [`expand_arguments()`].
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ArgumentError {
    #[snafu(display("cannot read batch file {}", path.display()))]
    ReadBatchFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("{count} arguments do not form (target, source) pairs"))]
    UnpairedArguments { count: usize },

    #[snafu(display("no replacements given"))]
    NoReplacements,
}

/// Turns the arguments after the image path into replacement requests.
///
/// A single argument names a batch file whose non-blank lines alternate
/// between a path inside the image and a file on disk. Otherwise the
/// arguments themselves alternate the same way.
pub fn expand_arguments<S: AsRef<str>>(args: &[S]) -> Result<Vec<Replacement>, ArgumentError> {
    match args {
        [] => NoReplacementsSnafu.fail(),
        [batch] => {
            let batch: &str = batch.as_ref();
            let path = Path::new(batch);
            let text = std::fs::read_to_string(path).context(ReadBatchFileSnafu { path })?;
            let lines: Vec<&str> = text
                .lines()
                .map(|line| line.trim_end_matches('\r'))
                .filter(|line| !line.trim().is_empty())
                .collect();

            ensure!(!lines.is_empty(), NoReplacementsSnafu);
            pair_up(&lines)
        }
        args => pair_up(args),
    }
}

fn pair_up<S: AsRef<str>>(args: &[S]) -> Result<Vec<Replacement>, ArgumentError> {
    ensure!(
        args.len() % 2 == 0,
        UnpairedArgumentsSnafu { count: args.len() }
    );

    Ok(args
        .chunks_exact(2)
        .map(|pair| Replacement::new(pair[0].as_ref(), pair[1].as_ref()))
        .collect())
}

impl ArgumentError {
    #[must_use]
    pub fn status(&self) -> crate::Status {
        match self {
            Self::ReadBatchFile { source, .. } => crate::IoCategory::of(source).status(),
            Self::UnpairedArguments { .. } | Self::NoReplacements => crate::Status::BadArguments,
        }
    }
}
