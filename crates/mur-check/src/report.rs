//! Thread-safe run output
//!
//! All user-facing text (progress lines, fault diagnostics, the final
//! summary) goes through one [`Reporter`]. Output is serialised by a
//! reentrant lock so multi-line blocks from different workers never
//! interleave; a holder of the lock may take it again.
//!
//! Writes are best effort: a failing sink is logged once and the run carries
//! on. [`Reporter::flush`] surfaces the failure at the end of the run.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use tracing::warn;

use crate::check::CheckResult;
use crate::error::FaultRecord;

type Sink = RefCell<Box<dyn Write + Send>>;

pub struct Reporter {
    sink: ReentrantMutex<Sink>,
    failed: AtomicBool,
}

/// Exclusive access to the reporter's output
pub struct ReportGuard<'a> {
    guard: ReentrantMutexGuard<'a, Sink>,
    failed: &'a AtomicBool,
}

impl ReportGuard<'_> {
    /// Write one line.
    pub fn line(&self, args: fmt::Arguments<'_>) {
        let mut sink = self.guard.borrow_mut();
        if let Err(e) = sink.write_fmt(args).and_then(|_| sink.write_all(b"\n")) {
            if !self.failed.swap(true, Ordering::Relaxed) {
                warn!(error = %e, "failed to write report output");
            }
        }
    }

    pub fn blank(&self) {
        self.line(format_args!(""));
    }
}

/// An in-memory sink shared with the caller
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Reporter {
    pub fn new<W: Write + Send + 'static>(sink: W) -> Self {
        Reporter {
            sink: ReentrantMutex::new(RefCell::new(Box::new(sink))),
            failed: AtomicBool::new(false),
        }
    }

    pub fn stdout() -> Self {
        Reporter::new(io::stdout())
    }

    /// Discard all output.
    pub fn sink() -> Self {
        Reporter::new(io::sink())
    }

    /// A reporter writing to memory, and a handle to read what it wrote.
    pub fn buffer() -> (Self, SharedBuffer) {
        let buf = SharedBuffer::default();
        (Reporter::new(buf.clone()), buf)
    }

    pub fn lock(&self) -> ReportGuard<'_> {
        ReportGuard {
            guard: self.sink.lock(),
            failed: &self.failed,
        }
    }

    pub fn progress(&self, states: usize, elapsed: Duration, rules_fired: u64, queued: usize) {
        self.lock().line(format_args!(
            "\t {} states explored in {}s, with {} rules fired and {} states in the queue.",
            states,
            elapsed.as_secs(),
            rules_fired,
            queued
        ));
    }

    /// Print one fault with either its path or just the offending state.
    pub fn fault(&self, record: &FaultRecord, trace: Option<&[String]>, state: &[String]) {
        let out = self.lock();
        out.blank();
        out.line(format_args!("Error: {}", record));
        out.blank();
        match trace {
            Some(lines) => {
                out.line(format_args!("The following is the error trace for the error:"));
                out.blank();
                for l in lines {
                    out.line(format_args!("{}", l));
                }
                out.blank();
                out.line(format_args!("End of the error trace."));
            }
            None => {
                out.line(format_args!("State:"));
                for l in state {
                    out.line(format_args!("{}", l));
                }
            }
        }
    }

    pub fn summary(&self, result: &CheckResult) {
        let out = self.lock();
        out.blank();
        out.line(format_args!("{}", "=".repeat(74)));
        out.blank();
        out.line(format_args!("Status:"));
        out.blank();
        match result.errors {
            0 => out.line(format_args!("\tNo error found.")),
            1 => out.line(format_args!("\t1 error found.")),
            n => out.line(format_args!("\t{} errors found.", n)),
        }
        out.blank();
        out.line(format_args!("State Space Explored:"));
        out.blank();
        out.line(format_args!(
            "\t{} states, {} rules fired in {}s.",
            result.states,
            result.rules_fired,
            result.elapsed.as_secs()
        ));
    }

    /// Flush the sink, reporting any write failure seen during the run.
    pub fn flush(&self) -> io::Result<()> {
        let out = self.lock();
        let flushed = out.guard.borrow_mut().flush();
        flushed?;
        if self.failed.load(Ordering::Relaxed) {
            return Err(io::Error::other("report output was incomplete"));
        }
        Ok(())
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("failed", &self.failed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
