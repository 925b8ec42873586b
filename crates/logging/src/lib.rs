#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `logging` is the diagnostic layer shared by the dupluxy crates. The core
//! never terminates the process or prints directly; recoverable failures are
//! reported as a `(category, message)` pair through the [`log_warn!`],
//! [`log_info!`] and [`log_debug!`] macros, which emit [`tracing`] events
//! with a `dupluxy::<category>` target.
//!
//! # Design
//!
//! - [`LogCategory`] enumerates the subsystems and their targets.
//! - [`init`] installs a `tracing-subscriber` formatter filtered by an
//!   [`EnvFilter`](tracing_subscriber::EnvFilter) read from `DUPLUXY_LOG`.
//! - [`CapturedEvents`] and [`capture`] collect categorised events in memory,
//!   which the test suites of the other crates use to assert on diagnostics.
//!
//! # Examples
//!
//! ```
//! use logging::{LogCategory, capture, log_warn};
//!
//! let ((), events) = capture(|| {
//!     log_warn!(Hardlink, "failed to link {}", "b");
//! });
//! assert_eq!(events[0].category, LogCategory::Hardlink);
//! assert_eq!(events[0].message, "failed to link b");
//! ```

mod capture;
mod category;
mod macros;
mod subscriber;

pub use capture::{CaptureLayer, CapturedEvents, DiagnosticEvent, capture};
pub use category::LogCategory;
pub use subscriber::{DEFAULT_DIRECTIVE, DEFAULT_ENV_VAR, LogConfig, init};

#[doc(hidden)]
pub use tracing;
