//! Document state and its reducer.
//!
//! [`DocsState`] is the single canonical client-side copy of everything the
//! viewer shows. It only changes through [`reduce`], which applies one
//! [`DocsAction`] (an operation starting, settling, or a synchronous clear).
//!
//! Each resource slot has exactly one write function (`write_docs_list`,
//! `write_current_doc`, `write_changelog_entry`, `write_stats`). Those are
//! where the [`ResponsePolicy`] is enforced, so call sites never need to know
//! whether stale responses are accepted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

use crate::models::{ChangelogEntry, Document, DocumentStats};

/// Per-slot request lifecycle. `Idle` also means "last request succeeded".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum RequestState {
    #[default]
    Idle,
    Pending,
    Failed(String),
}

impl RequestState {
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestState::Pending)
    }
}

/// The resource slots tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Slot {
    DocsList,
    CurrentDoc,
    Changelog,
    Stats,
}

impl Slot {
    fn index(self) -> usize {
        match self {
            Slot::DocsList => 0,
            Slot::CurrentDoc => 1,
            Slot::Changelog => 2,
            Slot::Stats => 3,
        }
    }
}

/// Generation number issued to a request when it is dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RequestToken(pub u64);

/// What to do with a response that settles after a newer request for the
/// same slot was dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponsePolicy {
    /// Accept it: whichever response settles last wins.
    #[default]
    LastSettled,
    /// Discard it: only the most recently dispatched request may write.
    LatestDispatched,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocsState {
    pub docs: Vec<Document>,
    pub current_doc: Option<Document>,
    /// Newest chunk time first, at most one entry per chunk time.
    pub changelog: Vec<ChangelogEntry>,
    pub stats: Option<DocumentStats>,
    /// Last failure message from any slot.
    pub error: Option<String>,
    /// Result of the last health check, if any ran.
    pub backend_available: Option<bool>,
    requests: [RequestState; 4],
    dispatched: [RequestToken; 4],
}

impl DocsState {
    pub fn request(&self, slot: Slot) -> &RequestState {
        &self.requests[slot.index()]
    }

    pub fn is_loading(&self, slot: Slot) -> bool {
        self.request(slot).is_pending()
    }

    /// Token of the latest request dispatched for `slot`.
    pub fn latest_token(&self, slot: Slot) -> RequestToken {
        self.dispatched[slot.index()]
    }

    pub fn changelog_entry(&self, chunk_time: &str) -> Option<&ChangelogEntry> {
        self.changelog.iter().find(|e| e.chunk_time == chunk_time)
    }

    fn set_request(&mut self, slot: Slot, state: RequestState) {
        self.requests[slot.index()] = state;
    }

    /// Issue the next token for `slot`.
    pub fn next_token(&mut self, slot: Slot) -> RequestToken {
        let next = RequestToken(self.dispatched[slot.index()].0 + 1);
        self.dispatched[slot.index()] = next;
        next
    }

    fn accepts(&self, slot: Slot, token: RequestToken, policy: ResponsePolicy) -> bool {
        match policy {
            ResponsePolicy::LastSettled => true,
            ResponsePolicy::LatestDispatched => token >= self.latest_token(slot),
        }
    }
}

/// Every event the store can apply.
#[derive(Debug, Clone)]
pub enum DocsAction {
    Started {
        slot: Slot,
    },
    DocsListLoaded {
        token: RequestToken,
        docs: Vec<Document>,
    },
    CurrentDocLoaded {
        token: RequestToken,
        doc: Document,
    },
    DocUpdated {
        token: RequestToken,
        doc: Document,
    },
    StatsLoaded {
        token: RequestToken,
        stats: DocumentStats,
    },
    ChangelogEntryLoaded {
        token: RequestToken,
        entry: ChangelogEntry,
    },
    Failed {
        slot: Slot,
        message: String,
    },
    HealthChecked {
        available: bool,
        message: Option<String>,
    },
    HealthCheckStarted,
    ClearError,
    ClearCurrentDoc,
    ClearChangelog,
    Reset,
}

/// Apply one action. Returns `false` when a settled response was discarded
/// by the response policy.
pub fn reduce(state: &mut DocsState, action: DocsAction, policy: ResponsePolicy) -> bool {
    match action {
        DocsAction::Started { slot } => {
            state.set_request(slot, RequestState::Pending);
            state.error = None;
            true
        }
        DocsAction::DocsListLoaded { token, docs } => write_docs_list(state, token, docs, policy),
        DocsAction::CurrentDocLoaded { token, doc } => {
            write_current_doc(state, token, doc, policy)
        }
        DocsAction::DocUpdated { token, doc } => {
            if !state.accepts(Slot::CurrentDoc, token, policy) {
                return false;
            }
            if let Some(existing) = state.docs.iter_mut().find(|d| d.id == doc.id) {
                *existing = doc.clone();
            }
            let is_open = state
                .current_doc
                .as_ref()
                .is_some_and(|current| current.id == doc.id);
            if is_open {
                state.current_doc = Some(doc);
            }
            settle(state, Slot::CurrentDoc);
            true
        }
        DocsAction::StatsLoaded { token, stats } => write_stats(state, token, stats, policy),
        DocsAction::ChangelogEntryLoaded { token, entry } => {
            write_changelog_entry(state, token, entry, policy)
        }
        DocsAction::Failed { slot, message } => {
            state.set_request(slot, RequestState::Failed(message.clone()));
            state.error = Some(message);
            true
        }
        DocsAction::HealthCheckStarted => {
            state.error = None;
            true
        }
        DocsAction::HealthChecked { available, message } => {
            state.backend_available = Some(available);
            if let Some(message) = message {
                state.error = Some(message);
            }
            true
        }
        DocsAction::ClearError => {
            state.error = None;
            true
        }
        DocsAction::ClearCurrentDoc => {
            state.current_doc = None;
            true
        }
        DocsAction::ClearChangelog => {
            state.changelog.clear();
            true
        }
        DocsAction::Reset => {
            // Token counters survive so issued tokens stay unique.
            let dispatched = state.dispatched;
            *state = DocsState {
                dispatched,
                ..Default::default()
            };
            true
        }
    }
}

fn settle(state: &mut DocsState, slot: Slot) {
    state.set_request(slot, RequestState::Idle);
    state.error = None;
}

fn write_docs_list(
    state: &mut DocsState,
    token: RequestToken,
    docs: Vec<Document>,
    policy: ResponsePolicy,
) -> bool {
    if !state.accepts(Slot::DocsList, token, policy) {
        return false;
    }
    state.docs = docs;
    settle(state, Slot::DocsList);
    true
}

fn write_current_doc(
    state: &mut DocsState,
    token: RequestToken,
    doc: Document,
    policy: ResponsePolicy,
) -> bool {
    if !state.accepts(Slot::CurrentDoc, token, policy) {
        return false;
    }
    state.current_doc = Some(doc);
    settle(state, Slot::CurrentDoc);
    true
}

fn write_stats(
    state: &mut DocsState,
    token: RequestToken,
    stats: DocumentStats,
    policy: ResponsePolicy,
) -> bool {
    if !state.accepts(Slot::Stats, token, policy) {
        return false;
    }
    state.stats = Some(stats);
    settle(state, Slot::Stats);
    true
}

fn write_changelog_entry(
    state: &mut DocsState,
    token: RequestToken,
    entry: ChangelogEntry,
    policy: ResponsePolicy,
) -> bool {
    if !state.accepts(Slot::Changelog, token, policy) {
        return false;
    }
    match state
        .changelog
        .iter_mut()
        .find(|e| e.chunk_time == entry.chunk_time)
    {
        Some(existing) => *existing = entry,
        None => state.changelog.push(entry),
    }
    state
        .changelog
        .sort_by(|a, b| compare_chunk_times_desc(&a.chunk_time, &b.chunk_time));
    settle(state, Slot::Changelog);
    true
}

pub fn parse_chunk_time(chunk_time: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(chunk_time)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Newest first. Parsable timestamps come before unparsable keys, which
/// are ordered by descending string value.
pub fn compare_chunk_times_desc(a: &str, b: &str) -> Ordering {
    match (parse_chunk_time(a), parse_chunk_time(b)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.cmp(a),
    }
}
