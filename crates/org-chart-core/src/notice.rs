// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Status-banner notices with TTL + dedupe.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Informational note (e.g. data recovered).
    Info,
    /// Degraded operation (e.g. storage unavailable).
    Warn,
    /// A command or save failed.
    Error,
}

/// Identifier for a notice entry.
pub type NoticeId = u64;

#[derive(Debug, Clone)]
struct Notice {
    id: NoticeId,
    kind: NoticeKind,
    message: String,
    ttl: Duration,
    created: Instant,
}

/// Rendering-friendly view of a notice.
#[derive(Debug, Clone, PartialEq)]
pub struct NoticeView {
    /// Stable identifier.
    pub id: NoticeId,
    /// Severity.
    pub kind: NoticeKind,
    /// Message line.
    pub message: String,
    /// 1.0 -> just raised, 0.0 -> expired.
    pub progress: f32,
}

/// Bounded notice queue; the oldest entry is dropped when full.
#[derive(Debug, Clone)]
pub struct NoticeQueue {
    queue: VecDeque<Notice>,
    max: usize,
    ttl: Duration,
    dedupe_window: Duration,
    next_id: NoticeId,
}

impl NoticeQueue {
    /// Queue holding at most `max` notices, each living for `ttl`.
    pub fn new(max: usize, ttl: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            max: max.max(1),
            ttl,
            dedupe_window: Duration::from_millis(500),
            next_id: 1,
        }
    }

    /// Raise a notice. An identical notice raised within the dedupe window is
    /// refreshed instead of duplicated.
    pub fn push(&mut self, kind: NoticeKind, message: impl Into<String>, now: Instant) -> NoticeId {
        let message = message.into();
        if let Some(existing) = self.queue.iter_mut().find(|n| {
            n.kind == kind
                && n.message == message
                && now.saturating_duration_since(n.created) <= self.dedupe_window
        }) {
            existing.created = now;
            return existing.id;
        }

        let id = self.next_id;
        self.next_id += 1;
        if self.queue.len() == self.max {
            self.queue.pop_front();
        }
        self.queue.push_back(Notice {
            id,
            kind,
            message,
            ttl: self.ttl,
            created: now,
        });
        id
    }

    /// Drop expired notices (call once per tick).
    pub fn retain_visible(&mut self, now: Instant) {
        self.queue
            .retain(|n| now.saturating_duration_since(n.created) < n.ttl);
    }

    /// Live notices, oldest first, with remaining-life ratios.
    pub fn visible(&self, now: Instant) -> Vec<NoticeView> {
        self.queue
            .iter()
            .filter(|n| now.saturating_duration_since(n.created) < n.ttl)
            .map(|n| NoticeView {
                id: n.id,
                kind: n.kind,
                message: n.message.clone(),
                progress: 1.0
                    - (now.saturating_duration_since(n.created).as_secs_f32()
                        / n.ttl.as_secs_f32()),
            })
            .collect()
    }

    /// Remove every notice.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupes_identical_notices_inside_window() {
        let t0 = Instant::now();
        let mut q = NoticeQueue::new(4, Duration::from_secs(6));
        let a = q.push(NoticeKind::Error, "save failed", t0);
        let b = q.push(NoticeKind::Error, "save failed", t0 + Duration::from_millis(300));
        assert_eq!(a, b);
        let c = q.push(NoticeKind::Error, "save failed", t0 + Duration::from_millis(1_000));
        assert_ne!(a, c);
        assert_eq!(q.visible(t0 + Duration::from_millis(1_000)).len(), 2);
    }

    #[test]
    fn expires_and_bounds_length() {
        let t0 = Instant::now();
        let mut q = NoticeQueue::new(2, Duration::from_secs(1));
        q.push(NoticeKind::Info, "one", t0);
        q.push(NoticeKind::Info, "two", t0);
        q.push(NoticeKind::Warn, "three", t0);
        let live = q.visible(t0);
        assert_eq!(live.len(), 2);
        assert_eq!(live[0].message, "two");
        assert!((live[0].progress - 1.0).abs() < f32::EPSILON);

        q.retain_visible(t0 + Duration::from_secs(2));
        assert!(q.visible(t0 + Duration::from_secs(2)).is_empty());
    }
}
