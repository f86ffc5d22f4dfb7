//! Ordered release of resources acquired during bootstrap.
//!
//! Every stage that acquires something closeable registers a closer here.
//! Closers run in reverse registration order, each exactly once, and a
//! failing closer never prevents the ones after it from running.

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt;

type BoxError = Box<dyn StdError + Send + Sync>;
type CloseFn = Box<dyn FnOnce() -> Result<(), BoxError> + Send>;

struct CloserEntry {
    description: String,
    action: CloseFn,
}

/// A closer that failed during [`TeardownRegistry::teardown_all`].
#[derive(Debug)]
pub struct TeardownFailure {
    pub description: String,
    pub error: BoxError,
}

/// Every failure of one teardown pass, in execution order.
#[derive(Debug)]
pub struct TeardownError {
    pub failures: Vec<TeardownFailure>,
}

impl fmt::Display for TeardownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} teardown action(s) failed", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {}: {}", failure.description, failure.error)?;
        }
        Ok(())
    }
}

impl StdError for TeardownError {}

/// LIFO list of closers owned by the bootstrap coordinator.
#[derive(Default)]
pub struct TeardownRegistry {
    closers: VecDeque<CloserEntry>,
}

impl TeardownRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closer. It will run before every closer registered
    /// earlier.
    pub fn register<F, E>(&mut self, description: impl Into<String>, action: F)
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Into<BoxError>,
    {
        self.closers.push_front(CloserEntry {
            description: description.into(),
            action: Box::new(move || action().map_err(Into::into)),
        });
    }

    pub fn len(&self) -> usize {
        self.closers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closers.is_empty()
    }

    /// Descriptions of the pending closers in the order they will run.
    pub fn pending(&self) -> Vec<&str> {
        self.closers.iter().map(|c| c.description.as_str()).collect()
    }

    /// Run and drain every closer, most recent first. Failures are collected
    /// and returned together once all closers have run.
    pub fn teardown_all(&mut self) -> Result<(), TeardownError> {
        let mut failures = Vec::new();
        while let Some(CloserEntry {
            description,
            action,
        }) = self.closers.pop_front()
        {
            tracing::info!(action = %description, "teardown");
            if let Err(error) = action() {
                tracing::error!(action = %description, %error, "teardown action failed");
                failures.push(TeardownFailure { description, error });
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TeardownError { failures })
        }
    }
}

impl Drop for TeardownRegistry {
    fn drop(&mut self) {
        if !self.closers.is_empty() {
            tracing::warn!(
                pending = self.closers.len(),
                "teardown registry dropped with closers that never ran"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(
        log: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
        fail: bool,
    ) -> impl FnOnce() -> Result<(), String> + Send + 'static {
        let log = Arc::clone(log);
        move || {
            log.lock().unwrap().push(name);
            if fail {
                Err(format!("{name} broke"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn closers_run_in_reverse_registration_order() {
        let log = recorder();
        let mut registry = TeardownRegistry::new();
        registry.register("c1", push(&log, "c1", false));
        registry.register("c2", push(&log, "c2", false));
        registry.register("c3", push(&log, "c3", false));
        assert_eq!(registry.pending(), vec!["c3", "c2", "c1"]);

        registry.teardown_all().unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["c3", "c2", "c1"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn failure_does_not_stop_remaining_closers() {
        let log = recorder();
        let mut registry = TeardownRegistry::new();
        registry.register("c1", push(&log, "c1", false));
        registry.register("c2", push(&log, "c2", true));
        registry.register("c3", push(&log, "c3", false));

        let err = registry.teardown_all().unwrap_err();
        assert_eq!(*log.lock().unwrap(), vec!["c3", "c2", "c1"]);
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].description, "c2");
        assert!(err.to_string().contains("c2 broke"));
    }

    #[test]
    fn all_failures_are_joined() {
        let log = recorder();
        let mut registry = TeardownRegistry::new();
        registry.register("first", push(&log, "first", true));
        registry.register("second", push(&log, "second", true));

        let err = registry.teardown_all().unwrap_err();
        let described: Vec<_> = err.failures.iter().map(|f| f.description.as_str()).collect();
        assert_eq!(described, vec!["second", "first"]);
    }

    #[test]
    fn closers_run_exactly_once() {
        let log = recorder();
        let mut registry = TeardownRegistry::new();
        registry.register("only", push(&log, "only", false));
        registry.teardown_all().unwrap();
        registry.teardown_all().unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
