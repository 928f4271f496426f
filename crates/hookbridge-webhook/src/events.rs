//! Webhook event catalog
//!
//! The hosting server identifies webhook events by fixed strings. Only the six
//! events below are ever managed here; anything else a webhook listens to is
//! left alone.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Set of events a webhook should subscribe to
pub type EventSet = BTreeSet<EventId>;

/// Remote webhook event identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventId {
    /// A read-only mirror finished synchronizing from upstream
    #[serde(rename = "mirror:repo_synchronized")]
    MirrorSynchronized,

    /// A branch or tag was updated
    #[serde(rename = "repo:refs_changed")]
    RepoRefsChanged,

    // Pull request lifecycle
    #[serde(rename = "pr:opened")]
    PullRequestOpened,
    #[serde(rename = "pr:declined")]
    PullRequestDeclined,
    #[serde(rename = "pr:deleted")]
    PullRequestDeleted,
    #[serde(rename = "pr:merged")]
    PullRequestMerged,
}

/// Logical grouping of events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    MirrorSync,
    RefChange,
    PullRequest,
}

impl EventId {
    /// Every managed event, used as the list filter
    pub const ALL: [EventId; 6] = [
        EventId::MirrorSynchronized,
        EventId::RepoRefsChanged,
        EventId::PullRequestOpened,
        EventId::PullRequestDeclined,
        EventId::PullRequestDeleted,
        EventId::PullRequestMerged,
    ];

    /// The four pull request events
    pub const PULL_REQUEST: [EventId; 4] = [
        EventId::PullRequestOpened,
        EventId::PullRequestDeclined,
        EventId::PullRequestDeleted,
        EventId::PullRequestMerged,
    ];

    /// Wire representation sent to and compared against the server
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MirrorSynchronized => "mirror:repo_synchronized",
            Self::RepoRefsChanged => "repo:refs_changed",
            Self::PullRequestOpened => "pr:opened",
            Self::PullRequestDeclined => "pr:declined",
            Self::PullRequestDeleted => "pr:deleted",
            Self::PullRequestMerged => "pr:merged",
        }
    }

    /// Parse a wire identifier; unknown identifiers yield `None`
    pub fn from_wire(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == value)
    }

    pub fn category(&self) -> EventCategory {
        match self {
            Self::MirrorSynchronized => EventCategory::MirrorSync,
            Self::RepoRefsChanged => EventCategory::RefChange,
            Self::PullRequestOpened
            | Self::PullRequestDeclined
            | Self::PullRequestDeleted
            | Self::PullRequestMerged => EventCategory::PullRequest,
        }
    }

    pub fn is_mirror_sync(&self) -> bool {
        self.category() == EventCategory::MirrorSync
    }

    pub fn is_ref_change(&self) -> bool {
        self.category() == EventCategory::RefChange
    }

    pub fn is_pull_request(&self) -> bool {
        self.category() == EventCategory::PullRequest
    }

    /// Ref-change and pull request events together
    pub fn is_ref_or_pull_request(&self) -> bool {
        !self.is_mirror_sync()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{REF_CHANGE}`
pub fn ref_change_events() -> EventSet {
    EventSet::from([EventId::RepoRefsChanged])
}

/// All four pull request events
pub fn pull_request_events() -> EventSet {
    EventSet::from(EventId::PULL_REQUEST)
}

/// `{REF_CHANGE}` plus all pull request events
pub fn ref_and_pull_request_events() -> EventSet {
    EventId::ALL
        .into_iter()
        .filter(EventId::is_ref_or_pull_request)
        .collect()
}

/// `{MIRROR_SYNC}`
pub fn mirror_sync_events() -> EventSet {
    EventSet::from([EventId::MirrorSynchronized])
}

/// Wire strings for an event set, in the form webhooks report them
pub fn to_wire(events: &EventSet) -> BTreeSet<String> {
    events.iter().map(|event| event.as_str().to_string()).collect()
}
