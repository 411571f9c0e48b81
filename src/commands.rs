//! CLI entry points.
//!
//! Each `run_*` function builds a [`DocsStore`] (or [`AuthStore`]) over the
//! configured backend, runs one operation and prints the result to stdout.
//! Operation failures become `anyhow` errors carrying the store's message.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;

use crate::api::{DocsBackend, HttpBackend};
use crate::auth::{AuthStore, FormError, RegisterForm, SigninForm};
use crate::config::Config;
use crate::models::{Document, DocumentPatch};
use crate::render;
use crate::store::DocsStore;
use crate::views::{relative_age, sorted_chunk_times};

fn backend(config: &Config) -> Result<Arc<dyn DocsBackend>> {
    let backend = HttpBackend::new(&config.api)
        .with_context(|| format!("Invalid backend URL: {}", config.api.base_url))?;
    Ok(Arc::new(backend))
}

pub fn docs_store(config: &Config) -> Result<DocsStore> {
    Ok(DocsStore::new(backend(config)?, config.store_options()))
}

fn print_listing(docs: &[Document]) {
    if docs.is_empty() {
        println!("No documents available.");
        return;
    }
    println!("{:<28} {:<36} DESCRIPTION", "ID", "TITLE");
    for doc in docs {
        println!("{:<28} {:<36} {}", doc.id, doc.title, doc.description());
    }
    println!();
    println!("{} document(s)", docs.len());
}

pub async fn run_list(config: &Config) -> Result<()> {
    let store = docs_store(config)?;
    let docs = store.fetch_docs_list().await?;
    print_listing(&docs);
    Ok(())
}

pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let store = docs_store(config)?;
    let doc = store.fetch_doc_by_id(id).await?;

    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("title:        {}", doc.title);
    if let Some(ref source) = doc.source {
        println!("source:       {}", source);
    }
    let description = doc.description();
    if !description.is_empty() {
        println!("generated by: {}", description);
    }
    if let Some(ref framework) = doc.framework {
        println!("framework:    {}", framework);
    }
    if let Some(ref run_id) = doc.run_id {
        println!("run_id:       {}", run_id);
    }
    if let Some(ref chunk_time) = doc.chunk_time {
        println!("chunk_time:   {}", chunk_time);
    }
    if let Some(ref updated_at) = doc.updated_at {
        println!("updated_at:   {}", updated_at);
    }
    println!();

    println!("--- Content ---");
    println!("{}", doc.content.as_deref().unwrap_or("(no content)"));
    Ok(())
}

/// Render a document, or a local file when `file` is given, to HTML on stdout.
pub async fn run_render(config: &Config, id: Option<&str>, file: Option<&Path>) -> Result<()> {
    let text = match (file, id) {
        (Some(path), _) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, Some(id)) => {
            let store = docs_store(config)?;
            store.fetch_doc_by_id(id).await?.content.unwrap_or_default()
        }
        (None, None) => bail!("render needs a document id or --file"),
    };

    let html = render::render(&text)?;
    println!("{}", html);
    Ok(())
}

pub async fn run_edit(config: &Config, id: &str, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let store = docs_store(config)?;
    let doc = store.update_doc(id, &DocumentPatch::content(content)).await?;
    println!(
        "Updated {} ({} bytes)",
        doc.id,
        doc.content.as_deref().map(str::len).unwrap_or(0)
    );
    Ok(())
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let store = docs_store(config)?;
    let stats = store.fetch_stats().await?;

    println!("AutoDoc — Document Stats");
    println!("========================");
    println!();
    println!("  Backend:     {}", config.api.base_url);
    println!("  Documents:   {}", stats.total_count);
    println!("  Versions:    {}", stats.chunk_times.len());
    if let Some(latest) = stats.chunk_times.last() {
        println!("  Latest:      {}", latest);
    }

    if !stats.latest_documents.is_empty() {
        println!();
        println!("  Latest version:");
        for doc in &stats.latest_documents {
            println!("    {:<36} {}", doc.title, doc.description());
        }
    }
    Ok(())
}

/// List versions newest first, then the documents of each requested chunk.
pub async fn run_changelog(config: &Config, chunk_times: &[String]) -> Result<()> {
    let store = docs_store(config)?;
    let stats = store.fetch_stats().await?;
    let now = Utc::now();

    if stats.chunk_times.is_empty() {
        println!("No versions available.");
    } else {
        println!("Available versions ({}):", stats.chunk_times.len());
        for chunk_time in sorted_chunk_times(&stats.chunk_times) {
            match relative_age(chunk_time, now) {
                Some(age) => println!("  {:<32} {}", chunk_time, age),
                None => println!("  {}", chunk_time),
            }
        }
    }

    for chunk_time in chunk_times {
        let entry = store.fetch_docs_by_chunk_time(chunk_time).await?;
        println!();
        println!("--- {} ({} documents) ---", entry.chunk_time, entry.document_count);
        for doc in &entry.documents {
            println!("  {:<28} {:<36} {}", doc.id, doc.title, doc.description());
        }
    }
    Ok(())
}

pub async fn run_run(config: &Config, run_id: &str) -> Result<()> {
    let store = docs_store(config)?;
    let docs = store.fetch_docs_by_run_id(run_id).await?;
    print_listing(&docs);
    Ok(())
}

/// Exits non-zero when the backend is unreachable.
pub async fn run_health(config: &Config) -> Result<()> {
    let store = docs_store(config)?;
    if store.check_health().await {
        println!("Backend {} is available", config.api.base_url);
        Ok(())
    } else {
        let message = store.snapshot().error.unwrap_or_default();
        bail!("{} ({})", message, config.api.base_url)
    }
}

pub async fn run_register(config: &Config, form: RegisterForm) -> Result<()> {
    let request = match form.validate() {
        Ok(request) => request,
        Err(FormError::WeakPassword(unmet)) => {
            eprintln!("Password requirements not met:");
            for rule in &unmet {
                eprintln!("  - {}", rule);
            }
            return Err(FormError::WeakPassword(unmet).into());
        }
        Err(e) => return Err(e.into()),
    };
    let auth = AuthStore::new(backend(config)?);
    let api_key = auth.register(&request).await?;
    println!("Registered {}.", request.email);
    println!("API key: {}", api_key);
    Ok(())
}

pub async fn run_signin(config: &Config, form: SigninForm) -> Result<()> {
    let request = form.validate()?;
    let auth = AuthStore::new(backend(config)?);
    let api_key = auth.signin(&request).await?;
    println!("API key: {}", api_key);
    Ok(())
}
