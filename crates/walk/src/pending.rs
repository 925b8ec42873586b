use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Stack of directories waiting to be listed, shared by the walk workers.
///
/// Workers [`pop`](Self::pop) a directory, list it and hand its
/// subdirectories back through [`complete`](Self::complete). The stack
/// closes once it is empty and no directory is being listed, at which point
/// every blocked worker wakes up and receives `None`.
#[derive(Debug)]
pub struct PendingDirectories {
    state: Mutex<State>,
    ready: Condvar,
}

#[derive(Debug)]
struct State {
    stack: Vec<Vec<u8>>,
    in_flight: usize,
    closed: bool,
}

impl PendingDirectories {
    /// Creates a stack holding `start`, usually the empty root path.
    #[must_use]
    pub fn new(start: Vec<u8>) -> Self {
        Self {
            state: Mutex::new(State {
                stack: vec![start],
                in_flight: 0,
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the next directory, blocking while others are still being listed.
    pub fn pop(&self) -> Option<Vec<u8>> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(directory) = state.stack.pop() {
                state.in_flight += 1;
                return Some(directory);
            }
            if state.in_flight == 0 {
                state.closed = true;
                self.ready.notify_all();
                return None;
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Finishes a popped directory and queues its subdirectories.
    ///
    /// The last element of `subdirectories` is listed next.
    pub fn complete(&self, subdirectories: Vec<Vec<u8>>) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        state.stack.extend(subdirectories);
        self.ready.notify_all();
    }

    /// Closes the stack; every current and future `pop` returns `None`.
    pub fn abort(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.stack.clear();
        self.ready.notify_all();
    }

    /// Whether the stack has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn closes_once_empty_and_idle() {
        let pending = PendingDirectories::new(Vec::new());
        let root = pending.pop().expect("root queued");
        assert!(root.is_empty());
        pending.complete(vec![b"b".to_vec(), b"a".to_vec()]);

        assert_eq!(pending.pop(), Some(b"a".to_vec()));
        pending.complete(Vec::new());
        assert_eq!(pending.pop(), Some(b"b".to_vec()));
        pending.complete(Vec::new());
        assert_eq!(pending.pop(), None);
        assert!(pending.is_closed());
    }

    #[test]
    fn waiting_workers_receive_work_from_a_busy_one() {
        let pending = PendingDirectories::new(Vec::new());
        let root = pending.pop().expect("root queued");
        assert!(root.is_empty());

        let popped = thread::scope(|scope| {
            let waiter = scope.spawn(|| pending.pop());
            pending.complete(vec![b"child".to_vec()]);
            let popped = waiter.join().expect("waiter finished");
            if popped.is_some() {
                pending.complete(Vec::new());
            }
            popped
        });
        assert_eq!(popped, Some(b"child".to_vec()));
        assert_eq!(pending.pop(), None);
    }

    #[test]
    fn abort_releases_blocked_workers() {
        let pending = PendingDirectories::new(Vec::new());
        pending.pop().expect("root queued");
        thread::scope(|scope| {
            let waiter = scope.spawn(|| pending.pop());
            pending.abort();
            assert_eq!(waiter.join().expect("waiter finished"), None);
        });
        pending.complete(vec![b"late".to_vec()]);
        assert_eq!(pending.pop(), None);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeSet;

        /// Children of `path` in a tree whose fan-out depends only on depth.
        fn children(path: &[u8], fanouts: &[u8]) -> Vec<Vec<u8>> {
            let Some(&fanout) = fanouts.get(path.len()) else {
                return Vec::new();
            };
            (0..fanout)
                .map(|index| {
                    let mut child = path.to_vec();
                    child.push(index);
                    child
                })
                .collect()
        }

        fn tree_size(fanouts: &[u8]) -> usize {
            let mut level = 1usize;
            let mut total = 1usize;
            for &fanout in fanouts {
                level *= usize::from(fanout);
                total += level;
            }
            total
        }

        proptest! {
            #[test]
            fn every_directory_is_popped_exactly_once(
                fanouts in proptest::collection::vec(0u8..4, 0..4),
                workers in 1usize..5,
            ) {
                let pending = PendingDirectories::new(Vec::new());
                let seen = Mutex::new(Vec::new());
                thread::scope(|scope| {
                    for _ in 0..workers {
                        scope.spawn(|| {
                            while let Some(directory) = pending.pop() {
                                let subdirectories = children(&directory, &fanouts);
                                seen.lock().expect("seen lock").push(directory);
                                pending.complete(subdirectories);
                            }
                        });
                    }
                });

                let seen = seen.into_inner().expect("seen lock");
                let unique: BTreeSet<_> = seen.iter().cloned().collect();
                prop_assert_eq!(seen.len(), tree_size(&fanouts));
                prop_assert_eq!(unique.len(), seen.len());
                prop_assert!(pending.is_closed());
            }
        }
    }
}
