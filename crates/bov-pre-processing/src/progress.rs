//! Progress reporting side channel. Observers see counts and an ETA; they
//! have no way to influence a build.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::{Duration, Instant},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub completed: usize,
    pub total: usize,
    pub eta: Duration,
}

pub trait ProgressObserver: Sync {
    fn on_progress(&self, update: ProgressUpdate);

    fn on_finish(&self) {}
}

/// Discards every update.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _update: ProgressUpdate) {}
}

/// Counts finished work items from any thread and forwards updates with a
/// linear ETA to the observer.
pub(crate) struct ProgressTracker<'a> {
    observer: &'a dyn ProgressObserver,
    completed: AtomicUsize,
    total: usize,
    started: Instant,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(observer: &'a dyn ProgressObserver, total: usize) -> Self {
        observer.on_progress(ProgressUpdate {
            completed: 0,
            total,
            eta: Duration::ZERO,
        });
        Self {
            observer,
            completed: AtomicUsize::new(0),
            total,
            started: Instant::now(),
        }
    }

    pub(crate) fn tick(&self) {
        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        self.observer.on_progress(ProgressUpdate {
            completed,
            total: self.total,
            eta: estimate_eta(self.started.elapsed(), completed, self.total),
        });
    }

    pub(crate) fn finish(&self) {
        self.observer.on_finish();
    }
}

fn estimate_eta(elapsed: Duration, completed: usize, total: usize) -> Duration {
    if completed == 0 || completed >= total {
        return Duration::ZERO;
    }
    elapsed.mul_f64((total - completed) as f64 / completed as f64)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ProgressUpdate>>, AtomicUsize);

    impl ProgressObserver for Recorder {
        fn on_progress(&self, update: ProgressUpdate) {
            self.0.lock().unwrap().push(update);
        }

        fn on_finish(&self) {
            self.1.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_tracker_reports_each_tick() {
        let recorder = Recorder::default();
        let tracker = ProgressTracker::new(&recorder, 3);
        for _ in 0..3 {
            tracker.tick();
        }
        tracker.finish();

        let updates = recorder.0.lock().unwrap();
        let completed: Vec<_> = updates.iter().map(|u| u.completed).collect();
        assert_eq!(completed, vec![0, 1, 2, 3]);
        assert!(updates.iter().all(|u| u.total == 3));
        assert_eq!(updates.last().unwrap().eta, Duration::ZERO);
        assert_eq!(recorder.1.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_eta_is_linear() {
        let eta = estimate_eta(Duration::from_secs(10), 1, 3);
        assert_eq!(eta, Duration::from_secs(20));
        assert_eq!(estimate_eta(Duration::from_secs(10), 0, 3), Duration::ZERO);
    }
}
