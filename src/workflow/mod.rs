//! Letter approval workflow
//!
//! Letters travel a strictly linear route of role-gated steps. Only the role
//! whose turn it is may approve or reject; any non-submitter may comment.

pub mod engine;
pub mod notify;
pub mod role;
pub mod views;

pub use engine::Workflow;
pub use notify::{NoopNotifier, NotificationHub, Notifier, RejectionNotice, WebhookClient};
pub use role::{Role, Route};
pub use views::{CurrentStepInfo, HistoryEntry, LetterSummary, LetterView, PendingStep};
