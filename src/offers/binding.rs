//! Thread binding — which chat thread a session ends up on.

use serde::Serialize;

use crate::routing::JobDetail;

/// Where the bound thread id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingSource {
    /// A thread id the session already carried (previous session, link).
    ExistingSession,
    /// The job's channel reference.
    JobChannel,
}

/// The chat thread resolved for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadBinding {
    pub thread_id: String,
    pub source: BindingSource,
}

/// Reconcile an existing thread id with the job's channel reference.
///
/// An existing session thread always wins so that a continuing session is
/// never moved to a newly assigned thread.
pub fn resolve_binding(existing_thread: Option<&str>, detail: &JobDetail) -> Option<ThreadBinding> {
    if let Some(thread_id) = existing_thread.map(str::trim).filter(|s| !s.is_empty()) {
        return Some(ThreadBinding {
            thread_id: thread_id.to_string(),
            source: BindingSource::ExistingSession,
        });
    }
    detail.thread_reference().map(|thread_id| ThreadBinding {
        thread_id: thread_id.to_string(),
        source: BindingSource::JobChannel,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::testing::detail;

    #[test]
    fn job_channel_used_without_existing_thread() {
        let binding = resolve_binding(None, &detail("j1", Some("thread-123"))).unwrap();
        assert_eq!(binding.thread_id, "thread-123");
        assert_eq!(binding.source, BindingSource::JobChannel);
    }

    #[test]
    fn existing_thread_takes_precedence() {
        let binding =
            resolve_binding(Some("thread-abc"), &detail("j1", Some("thread-999"))).unwrap();
        assert_eq!(binding.thread_id, "thread-abc");
        assert_eq!(binding.source, BindingSource::ExistingSession);
    }

    #[test]
    fn existing_thread_covers_missing_reference() {
        let binding = resolve_binding(Some("thread-abc"), &detail("j1", None)).unwrap();
        assert_eq!(binding.thread_id, "thread-abc");
    }

    #[test]
    fn nothing_to_bind() {
        assert!(resolve_binding(None, &detail("j1", None)).is_none());
        assert!(resolve_binding(Some(""), &detail("j1", Some(""))).is_none());
    }
}
