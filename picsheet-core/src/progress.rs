//! Progress reporting for long-running sheet operations

/// Receives progress updates as a percentage (0..=100) and a status text
pub trait ProgressReporter {
    fn report(&mut self, percent: u8, status: &str);
}

impl<F> ProgressReporter for F
where
    F: FnMut(u8, &str),
{
    fn report(&mut self, percent: u8, status: &str) {
        self(percent, status)
    }
}

/// Reporter that discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&mut self, _percent: u8, _status: &str) {}
}

/// Percentage of `done` out of `total`, clamped to 100
pub(crate) fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.min(total) * 100 / total) as u8
}
