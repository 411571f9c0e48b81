//! Normalization of backend responses into canonical models.
//!
//! The backend has shipped several response shapes over time (documents keyed
//! by database id or by timestamp, counts as bare numbers or wrapped objects).
//! Everything that inspects raw JSON lives here so the rest of the crate only
//! ever sees [`Document`], [`DocumentStats`] and friends.
//!
//! # Decision tables
//!
//! Document id, first present string wins:
//!
//! | Source | Notes |
//! |--------|-------|
//! | `_id` | database identifier |
//! | `id` | |
//! | `timestamp` | timestamp-keyed revisions |
//! | caller fallback | e.g. the id that was requested |
//!
//! Total count:
//!
//! | Body | Result |
//! |------|--------|
//! | non-negative integer | that value |
//! | object with integer `count` | that value |
//! | string of digits | parsed value |
//! | anything else | [`NormalizeError::Count`] |
//!
//! Lists and chunk times degrade to empty when the body is not an array.

use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

use crate::models::Document;

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("document has no usable id")]
    MissingId,
    #[error("unexpected document shape: {0}")]
    Document(String),
    #[error("unexpected count response: {0}")]
    Count(String),
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn owned(value: &Value, key: &str) -> Option<String> {
    str_field(value, key).map(str::to_string)
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

/// Normalize one JSON document object.
///
/// `fallback_id` is used only when the body carries none of `_id`, `id`
/// or `timestamp`.
pub fn normalize_document(
    value: &Value,
    fallback_id: Option<&str>,
) -> Result<Document, NormalizeError> {
    if !value.is_object() {
        return Err(NormalizeError::Document(type_name(value).to_string()));
    }

    let id = non_empty(str_field(value, "_id"))
        .or_else(|| non_empty(str_field(value, "id")))
        .or_else(|| non_empty(str_field(value, "timestamp")))
        .or_else(|| non_empty(fallback_id))
        .ok_or(NormalizeError::MissingId)?
        .to_string();

    let metadata = value
        .get("metadata")
        .filter(|m| m.is_object())
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));

    let module_name = owned(&metadata, "moduleName");
    let source = owned(value, "source").or_else(|| owned(&metadata, "source"));

    let title = non_empty(module_name.as_deref())
        .or_else(|| non_empty(source.as_deref()))
        .or_else(|| non_empty(str_field(value, "title")))
        .unwrap_or(&id)
        .to_string();

    let chunk_time = owned(&metadata, "chunkTimestamp").or_else(|| owned(value, "chunkTime"));

    Ok(Document {
        content: owned(value, "content"),
        title,
        source,
        provider: owned(value, "provider"),
        model: owned(value, "model"),
        framework: owned(&metadata, "framework"),
        module_name,
        run_id: owned(&metadata, "runId").or_else(|| owned(value, "runId")),
        project_path: owned(&metadata, "projectPath"),
        timestamp: owned(value, "timestamp"),
        created_at: owned(value, "createdAt"),
        updated_at: owned(value, "updatedAt"),
        chunk_time,
        metadata,
        id,
    })
}

/// Normalize a listing. Non-array bodies yield an empty list; non-object
/// items are skipped and later duplicates of an id are dropped.
pub fn normalize_documents(value: &Value) -> Vec<Document> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut docs = Vec::with_capacity(items.len());
    for item in items {
        match normalize_document(item, None) {
            Ok(doc) => {
                if seen.insert(doc.id.clone()) {
                    docs.push(doc);
                } else {
                    tracing::warn!(id = %doc.id, "dropping duplicate document in listing");
                }
            }
            Err(e) => tracing::debug!(error = %e, "skipping listing item"),
        }
    }
    docs
}

/// Normalize a single-document response body.
///
/// JSON objects are normalized; anything else is treated as raw MDX text
/// belonging to `requested_id`.
pub fn normalize_document_body(body: &str, requested_id: &str) -> Result<Document, NormalizeError> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) if value.is_object() => normalize_document(&value, Some(requested_id)),
        _ => Ok(Document::bare(requested_id, Some(body.to_string()))),
    }
}

/// Normalize the total-count response (see the module-level table).
pub fn normalize_count(value: &Value) -> Result<u64, NormalizeError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| NormalizeError::Count(n.to_string())),
        Value::Object(map) => match map.get("count") {
            Some(inner @ Value::Number(_)) => normalize_count(inner),
            _ => Err(NormalizeError::Count(value.to_string())),
        },
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| NormalizeError::Count(s.clone())),
        other => Err(NormalizeError::Count(other.to_string())),
    }
}

/// Normalize the chunk-times response. String items are kept, numeric
/// items are stringified, everything else is ignored.
pub fn normalize_chunk_times(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Pull the `message` field out of an error body, if there is one.
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    non_empty(str_field(&value, "message")).map(str::to_string)
}

/// Pull the API key out of an auth response (`{ "apiKey": ... }` or a bare string).
pub fn api_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(_) => non_empty(str_field(value, "apiKey")).map(str::to_string),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
