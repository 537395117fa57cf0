// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Severity-filtered diagnostics queue with TTL and dedupe.
//!
//! This is the user-facing channel; `tracing` remains the developer log.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::settings::MAX_VERBOSITY;

/// Diagnostic severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational note.
    Info,
    /// Something degraded but the request continued.
    Warning,
    /// The request failed.
    Error,
}

impl Severity {
    /// Least severe level shown at `verbosity` (clamped to `0..=2`).
    pub const fn threshold(verbosity: u8) -> Self {
        let v = if verbosity > MAX_VERBOSITY {
            MAX_VERBOSITY
        } else {
            verbosity
        };
        match v {
            0 => Self::Error,
            1 => Self::Warning,
            _ => Self::Info,
        }
    }
}

/// Identifier for a queued diagnostic.
pub type DiagnosticId = u64;

/// One queued diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Stable identifier.
    pub id: DiagnosticId,
    /// Severity.
    pub severity: Severity,
    /// Message text.
    pub message: String,
    /// Last time the message was pushed.
    pub created: Instant,
    /// Times the message was pushed inside the dedupe window.
    pub repeats: u32,
}

/// Bounded queue of diagnostics.
pub struct Diagnostics {
    queue: VecDeque<Diagnostic>,
    max: usize,
    ttl: Duration,
    dedupe_window: Duration,
    min_severity: Severity,
    next_id: DiagnosticId,
}

impl Diagnostics {
    /// Create a queue holding at most `max` entries, showing warnings and errors.
    pub fn new(max: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            max: max.max(1),
            ttl: Duration::from_secs(5),
            dedupe_window: Duration::from_millis(500),
            min_severity: Severity::Warning,
            next_id: 1,
        }
    }

    /// Set the minimum severity from a verbosity level.
    pub fn set_verbosity(&mut self, verbosity: u8) {
        self.min_severity = Severity::threshold(verbosity);
    }

    /// Current minimum severity.
    pub const fn min_severity(&self) -> Severity {
        self.min_severity
    }

    /// Push a message. Returns `None` when filtered out by severity.
    ///
    /// Identical messages within the dedupe window refresh the existing entry.
    pub fn push(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        now: Instant,
    ) -> Option<DiagnosticId> {
        if severity < self.min_severity {
            return None;
        }
        let message = message.into();
        if let Some(existing) = self.queue.iter_mut().find(|d| {
            d.severity == severity
                && d.message == message
                && now.saturating_duration_since(d.created) <= self.dedupe_window
        }) {
            existing.created = now;
            existing.repeats = existing.repeats.saturating_add(1);
            return Some(existing.id);
        }

        let id = self.next_id;
        self.next_id += 1;
        if self.queue.len() == self.max {
            self.queue.pop_front();
        }
        self.queue.push_back(Diagnostic {
            id,
            severity,
            message,
            created: now,
            repeats: 1,
        });
        Some(id)
    }

    /// Drop entries older than the TTL.
    pub fn retain_visible(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.queue
            .retain(|d| now.saturating_duration_since(d.created) < ttl);
    }

    /// Entries currently queued, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.queue.iter()
    }

    /// Remove and return every queued entry.
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        self.queue.drain(..).collect()
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(64)
    }
}
