use std::path::Path;

/// Trait for receiving replacement progress updates.
///
/// All methods take `&self` (not `&mut self`) so the progress reporter can be
/// shared across threads while requests are resolved in parallel.
pub trait ReplaceProgress: Send + Sync {
    /// Called before the requested paths are looked up.
    fn resolve_start(&self, _total: usize) {}

    /// Called when a requested path has been found and its new data loaded.
    fn resolved(&self, _target: &str, _source: &Path, _size: u64) {}

    /// Called after a replacement has been applied to the image.
    fn applied(&self, _target: &str, _old_size: u64, _new_size: u64, _sector_delta: i64) {}

    /// Called before the image is written to disk.
    fn write_start(&self, _path: &Path, _size: u64) {}

    /// Called after each chunk of the image has been written.
    fn write_progress(&self, _written: u64) {}

    /// Called when the image has been fully written.
    fn write_completed(&self) {}
}

impl<P: ReplaceProgress + ?Sized> ReplaceProgress for &P {
    fn resolve_start(&self, total: usize) {
        (**self).resolve_start(total);
    }

    fn resolved(&self, target: &str, source: &Path, size: u64) {
        (**self).resolved(target, source, size);
    }

    fn applied(&self, target: &str, old_size: u64, new_size: u64, sector_delta: i64) {
        (**self).applied(target, old_size, new_size, sector_delta);
    }

    fn write_start(&self, path: &Path, size: u64) {
        (**self).write_start(path, size);
    }

    fn write_progress(&self, written: u64) {
        (**self).write_progress(written);
    }

    fn write_completed(&self) {
        (**self).write_completed();
    }
}

/// A no-op progress implementation that discards all updates.
pub struct SilentProgress;

impl ReplaceProgress for SilentProgress {}

/// Console progress reporter using an indicatif progress bar.
///
/// Each resolved request is printed on its own line. Writing the image uses
/// a byte-based progress bar on stderr.
#[cfg(feature = "cli")]
pub struct ConsoleProgress {
    write_bar: indicatif::ProgressBar,
}

#[cfg(feature = "cli")]
impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            write_bar: indicatif::ProgressBar::hidden(),
        }
    }
}

#[cfg(feature = "cli")]
impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "cli")]
impl ReplaceProgress for ConsoleProgress {
    fn resolve_start(&self, total: usize) {
        println!("Resolving {total} file(s)...");
    }

    fn resolved(&self, target: &str, source: &Path, size: u64) {
        println!("  {target} <- {} ({size} bytes)", source.display());
    }

    fn write_start(&self, path: &Path, size: u64) {
        println!("Writing {}...", path.display());

        self.write_bar
            .set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.write_bar.set_length(size);
        self.write_bar.set_position(0);
        self.write_bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("{bar:40.cyan/blue} {bytes}/{total_bytes} [{elapsed_precise}]")
                .unwrap()
                .progress_chars("━╸─"),
        );
        self.write_bar.reset();
    }

    fn write_progress(&self, written: u64) {
        self.write_bar.inc(written);
    }

    fn write_completed(&self) {
        self.write_bar.finish_and_clear();
    }
}
