// Severity suppressor for noisy recurring failures: the first message for a
// key is logged at `initial`, every repeat at `drop_to`.

use std::collections::BTreeSet;
use std::sync::Mutex;
use tracing::Level;

pub struct LogSuppressor {
    initial: Level,
    drop_to: Level,
    seen: Mutex<BTreeSet<String>>,
}

impl LogSuppressor {
    pub const fn new(initial: Level, drop_to: Level) -> Self {
        Self {
            initial,
            drop_to,
            seen: Mutex::new(BTreeSet::new()),
        }
    }

    /// Severity to use for `key`; marks the key as seen.
    pub fn severity(&self, key: &str) -> Level {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.insert(key.to_string()) {
            self.initial
        } else {
            self.drop_to
        }
    }

    /// True once `key` has been logged.
    pub fn contains(&self, key: &str) -> bool {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).contains(key)
    }

    /// Log `message` under `key` at the suppressed severity. Keys name the
    /// resource or operation, never the formatted message.
    pub fn log(&self, key: &str, message: &str) {
        emit(self.severity(key), key, message);
    }
}

/// Emit an event at a level only known at runtime.
pub fn emit(level: Level, key: &str, message: &str) {
    if level == Level::ERROR {
        tracing::error!(key = %key, "{}", message);
    } else if level == Level::WARN {
        tracing::warn!(key = %key, "{}", message);
    } else if level == Level::INFO {
        tracing::info!(key = %key, "{}", message);
    } else if level == Level::DEBUG {
        tracing::debug!(key = %key, "{}", message);
    } else {
        tracing::trace!(key = %key, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_occurrence_uses_initial_level_then_drops() {
        let s = LogSuppressor::new(Level::WARN, Level::TRACE);
        assert_eq!(s.severity("sda"), Level::WARN);
        assert_eq!(s.severity("sda"), Level::TRACE);
        assert_eq!(s.severity("sdb"), Level::WARN);
    }
}
