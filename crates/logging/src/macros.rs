//! crates/logging/src/macros.rs
//! Category-aware wrappers around the tracing macros.
//!
//! The category is given as a bare [`LogCategory`](crate::LogCategory) variant
//! name and resolved to a literal target at compile time.

#[doc(hidden)]
#[macro_export]
macro_rules! __category_target {
    (ListDir) => {
        "dupluxy::list_dir"
    };
    (Attributes) => {
        "dupluxy::attributes"
    };
    (Flags) => {
        "dupluxy::flags"
    };
    (Ownership) => {
        "dupluxy::ownership"
    };
    (Hardlink) => {
        "dupluxy::hardlink"
    };
    (Special) => {
        "dupluxy::special"
    };
    (Exclude) => {
        "dupluxy::exclude"
    };
    (Walk) => {
        "dupluxy::walk"
    };
}

/// Report a recoverable failure.
///
/// # Example
/// ```ignore
/// log_warn!(Ownership, "failed to change owner of {}: {}", path.display(), error);
/// ```
#[macro_export]
macro_rules! log_warn {
    ($category:ident, $($arg:tt)*) => {
        $crate::tracing::warn!(target: $crate::__category_target!($category), $($arg)*)
    };
}

/// Report a noteworthy event.
///
/// # Example
/// ```ignore
/// log_info!(Walk, "listed {} entries", count);
/// ```
#[macro_export]
macro_rules! log_info {
    ($category:ident, $($arg:tt)*) => {
        $crate::tracing::info!(target: $crate::__category_target!($category), $($arg)*)
    };
}

/// Report a detail useful when diagnosing a single subsystem.
///
/// # Example
/// ```ignore
/// log_debug!(Flags, "flags unsupported on {}", path.display());
/// ```
#[macro_export]
macro_rules! log_debug {
    ($category:ident, $($arg:tt)*) => {
        $crate::tracing::debug!(target: $crate::__category_target!($category), $($arg)*)
    };
}
