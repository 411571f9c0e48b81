//! Resource request store.
//!
//! [`DocsStore`] owns the [`DocsState`] and runs every remote operation
//! against a [`DocsBackend`]. Each operation follows the same lifecycle:
//!
//! ```text
//!   start(slot) ──▶ backend call ──▶ fulfilled(token, value) ──▶ Idle
//!                                └─▶ failed(message) ──────────▶ Failed
//! ```
//!
//! State lives in a `tokio::sync::watch` channel. Transitions are applied
//! synchronously with `send_modify`, never across an `.await`, and hosts
//! either take a [`snapshot`](DocsStore::snapshot) or
//! [`subscribe`](DocsStore::subscribe) to changes.
//!
//! There is no de-duplication or cancellation. Overlapping requests for the
//! same slot race; under [`ResponsePolicy::LastSettled`] (the default) the
//! response that settles last is the one left in the slot.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::api::{ApiError, DocsBackend};
use crate::models::{ChangelogEntry, Document, DocumentPatch, DocumentStats};
use crate::state::{reduce, DocsAction, DocsState, RequestToken, Slot};

pub use crate::state::ResponsePolicy;

pub const DOCS_LIST_FAILED: &str = "Failed to fetch documents list.";
pub const DOC_FAILED: &str = "Failed to fetch document.";
pub const DOC_UPDATE_FAILED: &str = "Failed to update document.";
pub const STATS_FAILED: &str = "Failed to fetch document stats.";
pub const CHUNK_FAILED: &str = "Failed to fetch documents by chunk time.";
pub const RUN_FAILED: &str = "Failed to fetch documents by run ID.";
pub const BACKEND_UNAVAILABLE: &str = "Backend is not available";
pub const ID_REQUIRED: &str = "Document ID is required.";

/// Which documents "list documents" fetches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListingMode {
    /// Documents of the newest chunk time.
    #[default]
    LatestChunk,
    /// The `limit` most recent documents.
    Recent { limit: usize },
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub listing: ListingMode,
    /// Also fetch the newest chunk's documents as part of stats.
    pub include_latest_in_stats: bool,
    pub response_policy: ResponsePolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            listing: ListingMode::default(),
            include_latest_in_stats: true,
            response_policy: ResponsePolicy::default(),
        }
    }
}

/// A failed operation. `message` is exactly what was stored in the error slot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct OperationError {
    pub message: String,
}

impl OperationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub struct DocsStore {
    backend: Arc<dyn DocsBackend>,
    options: StoreOptions,
    state: watch::Sender<DocsState>,
}

impl DocsStore {
    pub fn new(backend: Arc<dyn DocsBackend>, options: StoreOptions) -> Self {
        let (state, _) = watch::channel(DocsState::default());
        Self {
            backend,
            options,
            state,
        }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> DocsState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DocsState> {
        self.state.subscribe()
    }

    /// Apply one action. Returns `false` if the response policy discarded it.
    fn dispatch(&self, action: DocsAction) -> bool {
        let policy = self.options.response_policy;
        let mut applied = true;
        self.state.send_modify(|s| applied = reduce(s, action, policy));
        applied
    }

    /// Mark `slot` pending and issue the token its response will carry.
    fn start(&self, slot: Slot) -> RequestToken {
        let policy = self.options.response_policy;
        let mut token = RequestToken::default();
        self.state.send_modify(|s| {
            token = s.next_token(slot);
            reduce(s, DocsAction::Started { slot }, policy);
        });
        tracing::debug!(?slot, token = token.0, "operation started");
        token
    }

    fn fulfil(&self, slot: Slot, action: DocsAction) {
        if !self.dispatch(action) {
            tracing::debug!(?slot, "discarded response from superseded request");
        }
    }

    fn fail(&self, slot: Slot, err: &ApiError, fallback: &str) -> OperationError {
        let message = err.message_or(fallback);
        tracing::debug!(?slot, error = %err, %message, "operation failed");
        self.reject(slot, message)
    }

    fn reject(&self, slot: Slot, message: impl Into<String>) -> OperationError {
        let message = message.into();
        self.dispatch(DocsAction::Failed {
            slot,
            message: message.clone(),
        });
        OperationError { message }
    }

    // ============ Operations ============

    /// Fetch the document listing per [`StoreOptions::listing`] and replace
    /// the local list with it.
    pub async fn fetch_docs_list(&self) -> Result<Vec<Document>, OperationError> {
        let token = self.start(Slot::DocsList);
        let result = match self.options.listing {
            ListingMode::LatestChunk => self.latest_chunk_documents().await,
            ListingMode::Recent { limit } => self.backend.latest_documents(limit).await,
        };
        match result {
            Ok(docs) => {
                self.fulfil(
                    Slot::DocsList,
                    DocsAction::DocsListLoaded {
                        token,
                        docs: docs.clone(),
                    },
                );
                Ok(docs)
            }
            Err(e) => Err(self.fail(Slot::DocsList, &e, DOCS_LIST_FAILED)),
        }
    }

    async fn latest_chunk_documents(&self) -> Result<Vec<Document>, ApiError> {
        let chunk_times = self.backend.chunk_times().await?;
        match chunk_times.last() {
            Some(latest) => self.backend.documents_by_chunk(latest).await,
            None => {
                tracing::debug!("no chunk times available");
                Ok(Vec::new())
            }
        }
    }

    /// Fetch one document into the current-document slot. On failure the
    /// slot keeps its previous value.
    pub async fn fetch_doc_by_id(&self, id: &str) -> Result<Document, OperationError> {
        if id.trim().is_empty() {
            return Err(self.reject(Slot::CurrentDoc, ID_REQUIRED));
        }
        let token = self.start(Slot::CurrentDoc);
        match self.backend.document(id).await {
            Ok(doc) => {
                self.fulfil(
                    Slot::CurrentDoc,
                    DocsAction::CurrentDocLoaded {
                        token,
                        doc: doc.clone(),
                    },
                );
                Ok(doc)
            }
            Err(e) => Err(self.fail(Slot::CurrentDoc, &e, DOC_FAILED)),
        }
    }

    /// Submit a partial update. The returned document is spliced into the
    /// list and, when it is the open document, the current-document slot.
    pub async fn update_doc(
        &self,
        id: &str,
        patch: &DocumentPatch,
    ) -> Result<Document, OperationError> {
        if id.trim().is_empty() {
            return Err(self.reject(Slot::CurrentDoc, ID_REQUIRED));
        }
        let token = self.start(Slot::CurrentDoc);
        match self.backend.update_document(id, patch).await {
            Ok(doc) => {
                self.fulfil(
                    Slot::CurrentDoc,
                    DocsAction::DocUpdated {
                        token,
                        doc: doc.clone(),
                    },
                );
                Ok(doc)
            }
            Err(e) => Err(self.fail(Slot::CurrentDoc, &e, DOC_UPDATE_FAILED)),
        }
    }

    /// Fetch count and chunk times concurrently (plus the newest chunk's
    /// documents when configured). Any failure fails the whole operation.
    pub async fn fetch_stats(&self) -> Result<DocumentStats, OperationError> {
        let token = self.start(Slot::Stats);
        match self.load_stats().await {
            Ok(stats) => {
                self.fulfil(
                    Slot::Stats,
                    DocsAction::StatsLoaded {
                        token,
                        stats: stats.clone(),
                    },
                );
                Ok(stats)
            }
            Err(e) => Err(self.fail(Slot::Stats, &e, STATS_FAILED)),
        }
    }

    async fn load_stats(&self) -> Result<DocumentStats, ApiError> {
        let (total_count, chunk_times) =
            tokio::try_join!(self.backend.count(), self.backend.chunk_times())?;

        let latest_documents = match (self.options.include_latest_in_stats, chunk_times.last()) {
            (true, Some(latest)) => self.backend.documents_by_chunk(latest).await?,
            _ => Vec::new(),
        };

        Ok(DocumentStats {
            total_count,
            chunk_times,
            latest_documents,
        })
    }

    /// Fetch one chunk's documents into the changelog.
    pub async fn fetch_docs_by_chunk_time(
        &self,
        chunk_time: &str,
    ) -> Result<ChangelogEntry, OperationError> {
        let token = self.start(Slot::Changelog);
        match self.backend.documents_by_chunk(chunk_time).await {
            Ok(docs) => {
                let entry = ChangelogEntry::new(chunk_time, docs);
                self.fulfil(
                    Slot::Changelog,
                    DocsAction::ChangelogEntryLoaded {
                        token,
                        entry: entry.clone(),
                    },
                );
                Ok(entry)
            }
            Err(e) => Err(self.fail(Slot::Changelog, &e, CHUNK_FAILED)),
        }
    }

    /// Fetch the documents of one generation run, replacing the list.
    pub async fn fetch_docs_by_run_id(&self, run_id: &str) -> Result<Vec<Document>, OperationError> {
        let token = self.start(Slot::DocsList);
        match self.backend.documents_by_run(run_id).await {
            Ok(docs) => {
                self.fulfil(
                    Slot::DocsList,
                    DocsAction::DocsListLoaded {
                        token,
                        docs: docs.clone(),
                    },
                );
                Ok(docs)
            }
            Err(e) => Err(self.fail(Slot::DocsList, &e, RUN_FAILED)),
        }
    }

    /// Probe the backend. Never fails; the outcome is the return value.
    pub async fn check_health(&self) -> bool {
        self.dispatch(DocsAction::HealthCheckStarted);
        match self.backend.health().await {
            Ok(()) => {
                self.dispatch(DocsAction::HealthChecked {
                    available: true,
                    message: None,
                });
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "health check failed");
                self.dispatch(DocsAction::HealthChecked {
                    available: false,
                    message: Some(BACKEND_UNAVAILABLE.to_string()),
                });
                false
            }
        }
    }

    // ============ Clears ============

    pub fn clear_error(&self) {
        self.dispatch(DocsAction::ClearError);
    }

    pub fn clear_current_doc(&self) {
        self.dispatch(DocsAction::ClearCurrentDoc);
    }

    pub fn clear_changelog(&self) {
        self.dispatch(DocsAction::ClearChangelog);
    }

    pub fn reset(&self) {
        self.dispatch(DocsAction::Reset);
    }
}
