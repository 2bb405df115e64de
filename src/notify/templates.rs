//! Subject lines and priorities per notification kind.

use super::{NotificationKind, Priority};
use crate::risk::ReviewPriority;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    /// Subject with `{id}` and `{detail}` placeholders.
    pub subject: &'static str,
    pub priority: Priority,
}

impl Template {
    pub fn render_subject(&self, id: &str, detail: &str) -> String {
        self.subject.replace("{id}", id).replace("{detail}", detail)
    }
}

pub fn template_for(kind: NotificationKind) -> Template {
    match kind {
        NotificationKind::ReviewRequest => Template {
            subject: "[Review Requested] {id}: {detail}",
            priority: Priority::Normal,
        },
        NotificationKind::Blocking => Template {
            subject: "[Blocked] Change set stopped at {detail}",
            priority: Priority::High,
        },
        NotificationKind::Completion => Template {
            subject: "[Review Complete] {id}: {detail}",
            priority: Priority::Low,
        },
        NotificationKind::Reminder => Template {
            subject: "[Reminder] Review {id} expires {detail}",
            priority: Priority::Normal,
        },
    }
}

/// P0 reviews are escalated to high priority regardless of kind.
pub fn priority_for_review(base: Priority, review: ReviewPriority) -> Priority {
    match review {
        ReviewPriority::P0 => Priority::High,
        _ => base,
    }
}
