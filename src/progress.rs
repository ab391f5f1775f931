//! Progress reporting capability.
//!
//! Sources and the assembler receive a `&dyn ProgressReporter` instead of
//! touching the console directly; the handle lives for the duration of one
//! long task and is released on drop on all paths.

use std::io::Write;

/// Factory for scoped progress handles.
pub trait ProgressReporter {
    /// Start a task. `total` is a best-effort hint (content-length, line
    /// count) and may be absent.
    fn task(&self, label: &str, total: Option<u64>) -> Box<dyn ProgressHandle>;
}

pub trait ProgressHandle {
    fn advance(&mut self, delta: u64);
}

/// Reporter for tests and `--quiet` runs.
pub struct NoopProgress;

struct NoopHandle;

impl ProgressReporter for NoopProgress {
    fn task(&self, _label: &str, _total: Option<u64>) -> Box<dyn ProgressHandle> {
        Box::new(NoopHandle)
    }
}

impl ProgressHandle for NoopHandle {
    fn advance(&mut self, _delta: u64) {}
}

/// Single-line console reporter in the `Processed N lines...\r` style.
pub struct ConsoleProgress;

struct ConsoleHandle {
    label: String,
    total: Option<u64>,
    done: u64,
    since_print: u64,
    printed: bool,
}

const PRINT_EVERY: u64 = 1 << 20;

impl ProgressReporter for ConsoleProgress {
    fn task(&self, label: &str, total: Option<u64>) -> Box<dyn ProgressHandle> {
        Box::new(ConsoleHandle {
            label: label.to_string(),
            total,
            done: 0,
            since_print: 0,
            printed: false,
        })
    }
}

impl ProgressHandle for ConsoleHandle {
    fn advance(&mut self, delta: u64) {
        self.done += delta;
        self.since_print += delta;
        if self.since_print < PRINT_EVERY {
            return;
        }
        self.since_print = 0;
        self.printed = true;
        match self.total {
            Some(total) if total > 0 => {
                let pct = (self.done as f64 / total as f64 * 100.0).min(100.0);
                print!("{} {:.1}%...\r", self.label, pct);
            }
            _ => print!("{} {}...\r", self.label, self.done),
        }
        let _ = std::io::stdout().flush();
    }
}

impl Drop for ConsoleHandle {
    fn drop(&mut self) {
        if self.printed {
            println!();
        }
    }
}
