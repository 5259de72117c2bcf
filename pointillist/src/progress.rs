//! Batch progress reporting.
//!
//! Every bar is registered with one process-wide `MultiProgress` so log lines
//! written while a bar is drawn can suspend it instead of tearing it.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use std::io::{stderr, IsTerminal};
use std::time::Duration;

use crate::color_utils::colors_enabled;

static MULTI: Lazy<MultiProgress> = Lazy::new(MultiProgress::new);

/// Run `f` with all progress bars hidden, so output does not interleave with them.
pub fn suspend_progress<F: FnOnce() -> R, R>(f: F) -> R {
    MULTI.suspend(f)
}

fn batch_style() -> ProgressStyle {
    let (template, chars) = if colors_enabled() {
        (
            "[{elapsed_precise}] [{bar:30.green/black}] {pos}/{len} ({percent}%) {msg}",
            "█▓▒░",
        )
    } else {
        (
            "[{elapsed_precise}] [{bar:30}] {pos}/{len} ({percent}%) {msg}",
            "#> ",
        )
    };

    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(chars)
}

/// Progress bar over the images of a batch.
///
/// Only shown for more than one image and when stderr is a terminal.
pub fn create_batch_progress_bar(total: usize) -> Option<ProgressBar> {
    if total <= 1 || !stderr().is_terminal() {
        return None;
    }

    let pb = MULTI.add(ProgressBar::new(total as u64));
    pb.set_style(batch_style());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Clear a finished bar and drop it from the shared display.
pub fn finish_progress_bar(pb: &ProgressBar) {
    pb.finish_and_clear();
    MULTI.remove(pb);
}
