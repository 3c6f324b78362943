use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "umd-replace", version)]
#[command(about = "Replace files inside a PSP/PS2 UMD image", long_about = None)]
pub struct Cli {
    /// Path to the UMD image, rewritten in place
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Pairs of a path inside the image and a replacement file, or a single
    /// batch file listing such pairs one path per line
    #[arg(value_name = "ARGS", required = true, num_args = 1..)]
    pub args: Vec<String>,

    /// Size of each in-memory image segment in MiB
    #[arg(
        long,
        value_name = "MIB",
        default_value_t = 1024,
        value_parser = clap::value_parser!(u32).range(1..=4096)
    )]
    pub segment_mib: u32,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Returns the segment capacity in bytes.
    pub fn segment_capacity(&self) -> usize {
        self.segment_mib as usize * 1024 * 1024
    }
}
