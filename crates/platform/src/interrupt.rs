//! `EINTR` retry helper.

use std::io;

/// Runs `op` until it completes with anything other than
/// [`io::ErrorKind::Interrupted`].
///
/// This is the only retry performed by the workspace; every other failure is
/// returned to the caller unchanged.
pub fn retry_on_interrupt<T, F>(mut op: F) -> io::Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    loop {
        match op() {
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            other => return other,
        }
    }
}
