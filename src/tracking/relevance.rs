use std::sync::Arc;

use tokio::sync::watch;

use crate::models::{ComparisonResult, RecommendationResult, Subject};

/// Anything that was computed for a particular subject
pub trait Relevant {
    fn subject(&self) -> Subject;
}

impl Relevant for RecommendationResult {
    fn subject(&self) -> Subject {
        self.subject
    }
}

impl Relevant for ComparisonResult {
    fn subject(&self) -> Subject {
        self.subject
    }
}

/// Tracks the subject currently on screen and filters out stale results
///
/// Results are never mutated on arrival; the consumer asks the tracker whether
/// a finished result still matches the subject it was built for.
#[derive(Clone)]
pub struct SubjectTracker {
    current: Arc<watch::Sender<Subject>>,
}

impl SubjectTracker {
    pub fn new(initial: Subject) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            current: Arc::new(tx),
        }
    }

    /// Switches to a new subject. Returns whether it actually changed.
    pub fn set(&self, subject: Subject) -> bool {
        let changed = self.current.send_if_modified(|current| {
            if *current == subject {
                false
            } else {
                *current = subject;
                true
            }
        });
        if changed {
            tracing::debug!(
                user_id = ?subject.user_id,
                movie_id = ?subject.movie_id,
                "Subject changed"
            );
        }
        changed
    }

    pub fn current(&self) -> Subject {
        *self.current.borrow()
    }

    pub fn is_current(&self, subject: &Subject) -> bool {
        *self.current.borrow() == *subject
    }

    /// Returns the value only if it was built for the current subject
    pub fn accept<T: Relevant>(&self, value: T) -> Option<T> {
        let subject = value.subject();
        if self.is_current(&subject) {
            Some(value)
        } else {
            tracing::debug!(
                user_id = ?subject.user_id,
                movie_id = ?subject.movie_id,
                "Discarding stale result"
            );
            None
        }
    }

    /// Receiver notified whenever the subject changes
    pub fn subscribe(&self) -> watch::Receiver<Subject> {
        self.current.subscribe()
    }
}

impl Default for SubjectTracker {
    fn default() -> Self {
        Self::new(Subject::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::RequestId;
    use chrono::Utc;

    fn result_for(subject: Subject) -> RecommendationResult {
        RecommendationResult {
            strategy: "content".to_string(),
            items: vec![],
            skipped: 0,
            fetched_at: Utc::now(),
            subject,
            request_id: RequestId::new(),
        }
    }

    #[test]
    fn test_accepts_result_for_current_subject() {
        let tracker = SubjectTracker::new(Subject::movie(1));
        assert!(tracker.accept(result_for(Subject::movie(1))).is_some());
    }

    #[test]
    fn test_discards_result_after_subject_change() {
        let tracker = SubjectTracker::new(Subject::movie(1));
        let pending = result_for(Subject::movie(1));

        assert!(tracker.set(Subject::movie(2)));
        assert!(tracker.accept(pending).is_none());
        assert_eq!(tracker.current(), Subject::movie(2));
    }

    #[test]
    fn test_setting_same_subject_is_not_a_change() {
        let tracker = SubjectTracker::new(Subject::user(7));
        assert!(!tracker.set(Subject::user(7)));
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let tracker = SubjectTracker::default();
        let mut rx = tracker.subscribe();

        let clone = tracker.clone();
        clone.set(Subject::user(3));

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Subject::user(3));
    }
}
