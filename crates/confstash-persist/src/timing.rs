//! Elapsed-time logging guard.
//!
//! ```rust
//! # use confstash_persist::Timer;
//! let timer = Timer::start("loaded 5 items");
//! // ... work ...
//! let elapsed = timer.finish(); // logs "loaded 5 items in 0.0s"
//! # let _ = elapsed;
//! ```
//!
//! A timer that is dropped without [`Timer::finish`] logs on drop.

use std::time::{Duration, Instant};

use tracing::Level;

/// Logs `"{msg} in {secs:.1}s"` through `tracing` when finished or dropped.
#[derive(Debug)]
pub struct Timer {
    msg: String,
    level: Level,
    start: Instant,
    logged: bool,
}

impl Timer {
    /// Start timing; the message is logged at `info`.
    pub fn start(msg: impl Into<String>) -> Self {
        Self::with_level(msg, Level::INFO)
    }

    /// Start timing with an explicit log level.
    pub fn with_level(msg: impl Into<String>, level: Level) -> Self {
        Self {
            msg: msg.into(),
            level,
            start: Instant::now(),
            logged: false,
        }
    }

    /// Time since the timer started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Replace the message, e.g. once a count is known.
    pub fn set_message(&mut self, msg: impl Into<String>) {
        self.msg = msg.into();
    }

    /// Log the elapsed time now and return it.
    pub fn finish(mut self) -> Duration {
        self.log()
    }

    /// Stop without logging, e.g. when the timed work failed.
    pub fn cancel(mut self) -> Duration {
        self.logged = true;
        self.elapsed()
    }

    fn log(&mut self) -> Duration {
        let elapsed = self.elapsed();
        self.logged = true;
        let secs = elapsed.as_secs_f64();
        let msg = &self.msg;
        if self.level == Level::ERROR {
            tracing::error!("{msg} in {secs:.1}s");
        } else if self.level == Level::WARN {
            tracing::warn!("{msg} in {secs:.1}s");
        } else if self.level == Level::INFO {
            tracing::info!("{msg} in {secs:.1}s");
        } else if self.level == Level::DEBUG {
            tracing::debug!("{msg} in {secs:.1}s");
        } else {
            tracing::trace!("{msg} in {secs:.1}s");
        }
        elapsed
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if !self.logged {
            self.log();
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────


/// Collects event messages emitted while a closure runs.
#[cfg(test)]
pub(crate) mod capture {
    use std::fmt;
    use std::sync::{Arc, Mutex};

    use tracing::field::{Field, Visit};
    use tracing::span::{Attributes, Id, Record};
    use tracing::{Event, Metadata, Subscriber};

    struct Messages(Arc<Mutex<Vec<String>>>);

    struct MessageVisitor<'a>(&'a mut Vec<String>);

    impl Visit for MessageVisitor<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "message" {
                self.0.push(format!("{value:?}"));
            }
        }
    }

    impl Subscriber for Messages {
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, _: &Attributes<'_>) -> Id {
            Id::from_u64(1)
        }

        fn record(&self, _: &Id, _: &Record<'_>) {}

        fn record_follows_from(&self, _: &Id, _: &Id) {}

        fn event(&self, event: &Event<'_>) {
            if let Ok(mut messages) = self.0.lock() {
                event.record(&mut MessageVisitor(&mut *messages));
            }
        }

        fn enter(&self, _: &Id) {}

        fn exit(&self, _: &Id) {}
    }

    pub(crate) fn messages<F: FnOnce()>(f: F) -> Vec<String> {
        let store = Arc::new(Mutex::new(Vec::new()));
        tracing::subscriber::with_default(Messages(Arc::clone(&store)), f);
        let messages = store.lock().map(|m| m.clone()).unwrap_or_default();
        messages
    }
}
