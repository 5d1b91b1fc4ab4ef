//! Reporting channel for allocation problems and diagnostics.

use std::fmt;
use std::panic::Location;
use std::sync::Mutex;

use crate::constants::ERR_POISONED_LOCK;

/// Classification of a reported problem.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    /// A recoverable failure the caller must handle (e.g. the system allocator
    /// returned null).
    Error,

    /// A noteworthy condition that does not affect the operation's outcome
    /// (e.g. a leaked allocation reported at dump time).
    Warning,

    /// A violated internal or caller-facing assumption. The default handler
    /// terminates the process.
    Assertion,

    /// An unrecoverable condition. The default handler terminates the process.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Assertion => "ASSERTION",
            Self::Fatal => "FATAL",
        };
        f.write_str(name)
    }
}

/// Receives problem reports from the allocation engine and tracking strategies.
///
/// The handler is given the severity, the name of the operation that observed the
/// problem, the call site it was observed for, and a human-readable message.
///
/// Handlers are plain function pointers so that the reporting path never allocates;
/// a handler that allocates from a reporting path invoked during allocation failure
/// would only make matters worse.
pub type ProblemHandler =
    fn(severity: Severity, operation: &str, site: &'static Location<'static>, message: &str);

/// Writes the report to stderr and terminates the process on
/// [`Severity::Fatal`] and [`Severity::Assertion`].
#[cfg_attr(test, mutants::skip)] // Aborts the process; cannot be exercised in tests.
pub fn default_problem_handler(
    severity: Severity,
    operation: &str,
    site: &'static Location<'static>,
    message: &str,
) {
    eprintln!(
        "[{severity}] {operation} ({}:{}): {message}",
        site.file(),
        site.line()
    );

    if matches!(severity, Severity::Fatal | Severity::Assertion) {
        std::process::abort();
    }
}

static HANDLER: Mutex<ProblemHandler> = Mutex::new(default_problem_handler);

/// Replaces the process-wide problem handler.
///
/// The handler applies to all heaps in the process. It may be swapped at any time;
/// reports in flight on other threads keep using the handler they already read.
pub fn set_problem_handler(handler: ProblemHandler) {
    *HANDLER.lock().expect(ERR_POISONED_LOCK) = handler;
}

/// Returns the currently installed problem handler.
#[must_use]
pub fn problem_handler() -> ProblemHandler {
    *HANDLER.lock().expect(ERR_POISONED_LOCK)
}

/// Routes a report through the currently installed handler.
pub(crate) fn report(
    severity: Severity,
    operation: &str,
    site: &'static Location<'static>,
    message: &str,
) {
    let handler = problem_handler();
    handler(severity, operation, site, message);
}
