//! Singleflight Module
//!
//! Collapses concurrent loads of the same key into one execution.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::error::Result;

/// `None` while the call is running.
type Outcome<T> = Option<Result<T>>;
type Calls<T> = Mutex<HashMap<String, watch::Receiver<Outcome<T>>>>;

enum Role<T> {
    Leader(watch::Sender<Outcome<T>>),
    Waiter(watch::Receiver<Outcome<T>>),
}

// == Group ==
/// Tracks in-flight calls by key.
///
/// The table lock is only held to insert, look up or remove a record, never
/// while a call runs.
pub struct Group<T> {
    calls: Calls<T>,
}

impl<T: Clone> Group<T> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }

    // == Work ==
    /// Runs `f` unless a call for `key` is already in flight, in which case
    /// the caller waits for that call and receives its result.
    ///
    /// The record is removed as soon as the call finishes, so a later call
    /// for the same key runs `f` again. If the running call is dropped
    /// before it finishes, its waiters claim the key again and one of them
    /// runs its own `f`.
    pub async fn work<F, Fut>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        loop {
            let rx = match self.claim(key) {
                Role::Leader(tx) => return self.lead(key, tx, f).await,
                Role::Waiter(rx) => rx,
            };
            if let Some(outcome) = Self::wait(rx).await {
                return outcome;
            }
            debug!(key, "in-flight call dropped, retrying");
        }
    }

    /// Number of calls currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    fn claim(&self, key: &str) -> Role<T> {
        let mut calls = self.calls.lock();
        match calls.get(key) {
            Some(rx) => Role::Waiter(rx.clone()),
            None => {
                let (tx, rx) = watch::channel(None);
                calls.insert(key.to_string(), rx);
                Role::Leader(tx)
            }
        }
    }

    async fn lead<F, Fut>(&self, key: &str, tx: watch::Sender<Outcome<T>>, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // `tx` outlives the record, so the record is gone before waiters see
        // the sender close.
        let _record = Record {
            calls: &self.calls,
            key,
        };

        let outcome = f().await;
        tx.send_replace(Some(outcome.clone()));
        outcome
    }

    /// Returns None when the leader went away without a result.
    async fn wait(mut rx: watch::Receiver<Outcome<T>>) -> Option<Result<T>> {
        match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).clone(),
            Err(_) => None,
        }
    }
}

impl<T: Clone> Default for Group<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Group<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("in_flight", &self.calls.lock().len())
            .finish()
    }
}

/// Removes the leader's record when the call finishes or is dropped.
struct Record<'a, T> {
    calls: &'a Calls<T>,
    key: &'a str,
}

impl<T> Drop for Record<'_, T> {
    fn drop(&mut self) {
        self.calls.lock().remove(self.key);
    }
}
