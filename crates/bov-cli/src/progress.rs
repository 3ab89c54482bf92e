use std::{
    borrow::Cow,
    sync::atomic::{AtomicU64, Ordering},
};

use bov_pre_processing::progress::{ProgressObserver, ProgressUpdate};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};

/// Renders build progress on stderr with the ETA reported by the build.
///
/// Updates from rayon workers can arrive out of order; the bar only moves
/// forward.
pub struct ProgressBarObserver {
    bar: ProgressBar,
    shown: AtomicU64,
}

impl ProgressBarObserver {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self::with_bar(progress_bar_setup(0, message))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            shown: AtomicU64::new(0),
        }
    }
}

impl ProgressObserver for ProgressBarObserver {
    fn on_progress(&self, update: ProgressUpdate) {
        if self.bar.length() != Some(update.total as u64) {
            self.bar.set_length(update.total as u64);
        }
        let completed = update.completed as u64;
        let previous = self.shown.fetch_max(completed, Ordering::Relaxed);
        if completed > previous {
            self.bar.inc(completed - previous);
            self.bar.set_prefix(format!("eta {}", HumanDuration(update.eta)));
        }
    }

    fn on_finish(&self) {
        self.bar.finish_with_message("Documents vectorized");
    }
}

fn progress_bar_setup(len: usize, message: impl Into<Cow<'static, str>>) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({prefix})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(message);
    pb
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn update(completed: usize) -> ProgressUpdate {
        ProgressUpdate {
            completed,
            total: 4,
            eta: Duration::from_secs(90),
        }
    }

    #[test]
    fn test_position_never_moves_backwards() {
        let observer = ProgressBarObserver::with_bar(ProgressBar::hidden());
        observer.on_progress(update(0));
        observer.on_progress(update(2));
        observer.on_progress(update(1));
        assert_eq!(observer.bar.position(), 2);
        assert_eq!(observer.bar.length(), Some(4));

        observer.on_progress(update(4));
        observer.on_progress(update(3));
        assert_eq!(observer.bar.position(), 4);
    }

    #[test]
    fn test_shows_reported_eta() {
        let observer = ProgressBarObserver::with_bar(ProgressBar::hidden());
        observer.on_progress(update(1));
        let expected = format!("eta {}", HumanDuration(Duration::from_secs(90)));
        assert_eq!(observer.bar.prefix(), expected);
    }
}
