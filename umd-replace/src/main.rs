mod cli;

use clap::Parser;
use cli::Cli;
use snafu::{ResultExt, Snafu};
use std::path::PathBuf;
use std::process::ExitCode;
use umd_iso::layout::SECTOR_SIZE;
use umd_replace::{
    ArgumentError, BatchReplacer, BatchSummary, ConsoleProgress, OpenImageError, ReplaceError,
    ReplaceProgress, Replacement, SaveImageError, SilentProgress, Status, expand_arguments,
    save_image,
};

/// Top-level application errors for umd-replace.
#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("invalid arguments"))]
    Arguments { source: ArgumentError },

    #[snafu(display("failed to open image '{}'", path.display()))]
    OpenImage {
        path: PathBuf,
        source: OpenImageError,
    },

    #[snafu(display("failed to replace files in '{}'", path.display()))]
    Replace {
        path: PathBuf,
        source: ReplaceError,
    },

    #[snafu(display("failed to save image '{}'", path.display()))]
    SaveImage {
        path: PathBuf,
        source: SaveImageError,
    },
}

impl Error {
    fn status(&self) -> Status {
        match self {
            Self::Arguments { source } => source.status(),
            Self::OpenImage { source, .. } => source.status(),
            Self::Replace { source, .. } => source.status(),
            Self::SaveImage { source, .. } => source.status(),
        }
    }
}

type Result<T, E = Error> = std::result::Result<T, E>;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();

            // Help and version requests are not failures.
            return if e.use_stderr() {
                ExitCode::from(Status::BadArguments.code())
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let status = e.status();
            eprintln!("{}", snafu::Report::from_error(e));
            ExitCode::from(status.code())
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let requests = expand_arguments(&cli.args).context(ArgumentsSnafu)?;

    if cli.quiet {
        replace_files(cli, &requests, &SilentProgress)
    } else {
        replace_files(cli, &requests, &ConsoleProgress::new())
    }
}

fn replace_files(
    cli: &Cli,
    requests: &[Replacement],
    progress: &impl ReplaceProgress,
) -> Result<()> {
    let path = cli.image.as_path();
    let start = std::time::Instant::now();

    let mut image = unsafe {
        umd_replace::open_image(path, cli.segment_capacity()).context(OpenImageSnafu { path })?
    };

    let summary = BatchReplacer::new(progress)
        .run(&mut image, requests)
        .context(ReplaceSnafu { path })?;

    save_image(&image, path, progress).context(SaveImageSnafu { path })?;

    print_report(&summary);

    if !cli.quiet {
        println!("Done in {:.2}s.", start.elapsed().as_secs_f64());
    }

    Ok(())
}

fn print_report(summary: &BatchSummary) {
    println!();
    println!(
        "{:>10}  {:>10}  {:>8}  File",
        "Old size", "New size", "Sectors"
    );
    println!("{:-<10}  {:-<10}  {:-<8}  {:-<30}", "", "", "", "");

    for file in &summary.files {
        println!(
            "{:>10}  {:>10}  {:>+8}  {}",
            file.old_size, file.new_size, file.sector_delta, file.target
        );
    }

    println!();
    println!(
        "Sectors: {} -> {} ({} bytes each)",
        summary.old_sectors, summary.new_sectors, SECTOR_SIZE
    );
    println!("Image size changed by {:+} bytes.", summary.byte_delta());

    if summary.size_changed() {
        println!("The image size changed: update any accompanying .cue sheet by hand.");
    }
}
