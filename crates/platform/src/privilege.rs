//! Effective privilege probe.

/// Returns `true` when the effective user id is root.
///
/// The answer is meant to be computed once at startup and handed to the
/// components that depend on it.
#[cfg(unix)]
pub fn is_privileged() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Non-Unix platforms never report elevated privileges.
#[cfg(not(unix))]
pub fn is_privileged() -> bool {
    false
}
