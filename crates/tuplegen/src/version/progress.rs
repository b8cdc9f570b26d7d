//! Progress callbacks for long-running migrations.

use tracing::info;

/// Receives migration progress.
pub trait ProgressIndicator: Send {
    /// Called once with the number of steps about to run.
    fn initialise(&mut self, total: usize);

    /// Called as each step starts and finishes; `value` counts steps done.
    fn step(&mut self, value: usize, message: &str);
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressIndicator for NoProgress {
    fn initialise(&mut self, _total: usize) {}

    fn step(&mut self, _value: usize, _message: &str) {}
}

/// Logs progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress {
    total: usize,
}

impl ProgressIndicator for LogProgress {
    fn initialise(&mut self, total: usize) {
        self.total = total;
        if total > 0 {
            info!("{} migration steps to apply", total);
        }
    }

    fn step(&mut self, value: usize, message: &str) {
        info!("[{}/{}] {}", value, self.total, message);
    }
}
