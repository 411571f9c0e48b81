//! Core data models used throughout AutoDoc Viewer.
//!
//! These types are the canonical shapes the rest of the crate works with.
//! Backend responses are converted into them by [`crate::normalize`] and
//! never travel further in their raw form.

use serde::{Deserialize, Serialize};

/// A single generated document as the viewer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// `None` when the backend did not send content, distinct from empty.
    pub content: Option<String>,
    pub title: String,
    pub source: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub framework: Option<String>,
    pub module_name: Option<String>,
    pub run_id: Option<String>,
    pub project_path: Option<String>,
    pub timestamp: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    /// Ingestion batch this document belongs to.
    pub chunk_time: Option<String>,
    pub metadata: serde_json::Value,
}

impl Document {
    /// A document with only an id and content, everything else unset.
    pub fn bare(id: impl Into<String>, content: Option<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            content,
            source: None,
            provider: None,
            model: None,
            framework: None,
            module_name: None,
            run_id: None,
            project_path: None,
            timestamp: None,
            created_at: None,
            updated_at: None,
            chunk_time: None,
            metadata: serde_json::json!({}),
        }
    }

    /// One-line "provider • model" description used by list and edit views.
    pub fn description(&self) -> String {
        match (&self.provider, &self.model) {
            (Some(p), Some(m)) => format!("{} • {}", p, m),
            (Some(p), None) => p.clone(),
            (None, Some(m)) => m.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Partial update submitted for one document. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl DocumentPatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            metadata: None,
        }
    }
}

/// Documents grouped under one chunk time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangelogEntry {
    pub chunk_time: String,
    pub document_count: usize,
    pub documents: Vec<Document>,
}

impl ChangelogEntry {
    pub fn new(chunk_time: impl Into<String>, documents: Vec<Document>) -> Self {
        Self {
            chunk_time: chunk_time.into(),
            document_count: documents.len(),
            documents,
        }
    }
}

/// Aggregate snapshot of the backend's document collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentStats {
    pub total_count: u64,
    /// Chunk times in the order the backend returned them (oldest first).
    pub chunk_times: Vec<String>,
    pub latest_documents: Vec<Document>,
}
