use std::collections::VecDeque;

use crate::core::NotificationId;
use super::notification::NotificationHandle;

/// Notifications waiting for the screen, head first.
///
/// A notification is held at most once; inserting one that is already queued
/// either leaves it in place (append) or moves it to the front (preempt).
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: VecDeque<NotificationHandle>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: NotificationId) -> bool {
        self.items.iter().any(|n| n.id() == id)
    }

    /// The notification currently entitled to the screen
    pub fn head(&self) -> Option<&NotificationHandle> {
        self.items.front()
    }

    pub fn is_head(&self, id: NotificationId) -> bool {
        self.head().map_or(false, |n| n.id() == id)
    }

    /// Appends unless already queued; returns whether it was added
    pub fn enqueue(&mut self, notification: NotificationHandle) -> bool {
        if self.contains(notification.id()) {
            return false;
        }
        self.items.push_back(notification);
        true
    }

    /// Makes `notification` the head, moving it if already queued
    pub fn preempt(&mut self, notification: NotificationHandle) {
        self.remove_all(notification.id());
        self.items.push_front(notification);
    }

    /// Removes and returns the head
    pub fn dequeue(&mut self) -> Option<NotificationHandle> {
        self.items.pop_front()
    }

    /// Removes every occurrence of `id`; returns whether any was found
    pub fn remove_all(&mut self, id: NotificationId) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id() != id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Queued identities, head first
    pub fn ids(&self) -> Vec<NotificationId> {
        self.items.iter().map(|n| n.id()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NotificationKind;
    use crate::server::notification::{BasicNotification, NotificationSink};
    use chrono::Utc;

    fn make(kind: NotificationKind) -> NotificationHandle {
        let (sink, _rx) = NotificationSink::channel();
        BasicNotification::new(sink, kind, Utc::now(), "t", "b")
    }

    #[test]
    fn test_fifo_without_duplicates() {
        let mut queue = PendingQueue::new();
        let a = make(NotificationKind::Sms);
        let b = make(NotificationKind::Email);

        assert!(queue.enqueue(a.clone()));
        assert!(queue.enqueue(b.clone()));
        assert!(!queue.enqueue(a.clone()));
        assert_eq!(queue.ids(), vec![a.id(), b.id()]);

        assert_eq!(queue.dequeue().map(|n| n.id()), Some(a.id()));
        assert!(queue.is_head(b.id()));
    }

    #[test]
    fn test_preempt_moves_to_front() {
        let mut queue = PendingQueue::new();
        let a = make(NotificationKind::Sms);
        let call = make(NotificationKind::Call);

        queue.enqueue(a.clone());
        queue.enqueue(call.clone());
        queue.preempt(call.clone());
        assert_eq!(queue.ids(), vec![call.id(), a.id()]);
    }

    #[test]
    fn test_remove_all() {
        let mut queue = PendingQueue::new();
        let a = make(NotificationKind::Generic);
        queue.enqueue(a.clone());
        assert!(queue.remove_all(a.id()));
        assert!(!queue.remove_all(a.id()));
        assert!(queue.is_empty());
        assert!(queue.head().is_none());
    }
}
