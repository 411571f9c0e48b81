//! HTML pages served by `autodoc serve`.
//!
//! Every function here is pure: it takes state snapshots and returns a full
//! page or fragment. Viewer chrome (titles, descriptions, error banners, form
//! values) is escaped with [`escape_html`]. Document content goes through
//! [`render_or_error_panel`] and is inserted as produced.

use chrono::{DateTime, Utc};
use reqwest::Url;

use crate::auth::{AuthState, PasswordRule, SPECIAL_CHARACTERS};
use crate::models::{ChangelogEntry, Document, DocumentStats};
use crate::render::{escape_html, render_or_error_panel};
use crate::state::{compare_chunk_times_desc, parse_chunk_time, DocsState};

/// Compact age of `chunk_time` relative to `now`, e.g. `"3h ago"`. `None`
/// when the key is not an RFC 3339 timestamp.
pub fn relative_age(chunk_time: &str, now: DateTime<Utc>) -> Option<String> {
    let then = parse_chunk_time(chunk_time)?;
    let secs = (now - then).num_seconds().max(0);
    Some(if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3_600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3_600)
    } else {
        format!("{}d ago", secs / 86_400)
    })
}

/// Chunk times newest first.
pub fn sorted_chunk_times(chunk_times: &[String]) -> Vec<&str> {
    let mut sorted: Vec<&str> = chunk_times.iter().map(String::as_str).collect();
    sorted.sort_by(|a, b| compare_chunk_times_desc(a, b));
    sorted
}

/// Site-relative path with each segment percent-encoded.
pub fn href(segments: &[&str]) -> String {
    let mut url = match Url::parse("http://viewer.invalid/") {
        Ok(url) => url,
        Err(_) => return "/".to_string(),
    };
    if let Ok(mut path) = url.path_segments_mut() {
        path.clear().extend(segments);
    }
    url.path().to_string()
}

fn changelog_href(chunk_time: &str) -> String {
    let mut url = match Url::parse("http://viewer.invalid/changelog") {
        Ok(url) => url,
        Err(_) => return "/changelog".to_string(),
    };
    url.query_pairs_mut().append_pair("chunk", chunk_time);
    format!("{}?{}", url.path(), url.query().unwrap_or_default())
}

// ============ Layout ============

pub fn layout(title: &str, auth: &AuthState, body: &str) -> String {
    let account = if auth.is_signed_in() {
        concat!(
            "<form method=\"post\" action=\"/signout\" class=\"inline\">",
            "<button type=\"submit\" class=\"text-sm text-gray-600\">Sign out</button>",
            "</form>"
        )
        .to_string()
    } else {
        "<a href=\"/signin\" class=\"text-sm\">Sign in</a> <a href=\"/signup\" class=\"text-sm\">Sign up</a>"
            .to_string()
    };

    format!(
        concat!(
            "<!DOCTYPE html>\n",
            "<html lang=\"en\">\n",
            "<head><meta charset=\"utf-8\"><title>{title} · AutoDoc</title></head>\n",
            "<body>\n",
            "<header class=\"flex items-center justify-between p-4 border-b\">",
            "<nav><a href=\"/docs\" class=\"font-bold\">AutoDoc</a> ",
            "<a href=\"/changelog\">Changelog</a></nav>",
            "<div>{account}</div>",
            "</header>\n",
            "<main class=\"p-4\">\n{body}\n</main>\n",
            "</body>\n",
            "</html>\n"
        ),
        title = escape_html(title),
        account = account,
        body = body,
    )
}

pub fn error_banner(error: Option<&str>) -> String {
    match error {
        Some(message) => format!(
            "<div class=\"p-4 text-red-600\" role=\"alert\"><p class=\"text-sm\">{}</p></div>",
            escape_html(message)
        ),
        None => String::new(),
    }
}

// ============ Documents ============

fn doc_link(doc: &Document, selected: Option<&str>) -> String {
    let class = if selected == Some(doc.id.as_str()) {
        "block p-3 rounded-lg bg-blue-100 text-blue-700"
    } else {
        "block p-3 rounded-lg text-gray-700"
    };
    format!(
        concat!(
            "<li><a href=\"{href}\" class=\"{class}\">",
            "<div class=\"text-sm font-medium truncate\">{title}</div>",
            "<div class=\"text-xs text-gray-500 truncate\">{description}</div>",
            "</a></li>"
        ),
        href = escape_html(&href(&["docs", &doc.id])),
        class = class,
        title = escape_html(&doc.title),
        description = escape_html(&doc.description()),
    )
}

/// The document sidebar, highlighting `selected` when given.
pub fn sidebar(docs: &[Document], selected: Option<&str>) -> String {
    let mut out = String::from(
        "<aside class=\"w-80 border-r\"><h2 class=\"text-lg font-semibold\">Documents</h2>\n",
    );
    if docs.is_empty() {
        out.push_str("<p class=\"text-sm text-gray-500\">No documents available</p>\n");
    } else {
        out.push_str("<ul class=\"space-y-1\">\n");
        for doc in docs {
            out.push_str(&doc_link(doc, selected));
            out.push('\n');
        }
        out.push_str("</ul>\n");
    }
    out.push_str("</aside>");
    out
}

pub fn docs_list_page(state: &DocsState, auth: &AuthState) -> String {
    let body = format!(
        "{}\n{}\n<section class=\"flex-1\"><p>Select a document from the sidebar.</p></section>",
        error_banner(state.error.as_deref()),
        sidebar(&state.docs, None),
    );
    layout("Documents", auth, &body)
}

/// Rendered document with the sidebar. Falls back to the error banner alone
/// when no document is loaded.
pub fn document_page(state: &DocsState, auth: &AuthState) -> String {
    let selected = state.current_doc.as_ref().map(|d| d.id.as_str());
    let article = match &state.current_doc {
        Some(doc) => document_article(doc),
        None => String::new(),
    };
    let title = state
        .current_doc
        .as_ref()
        .map(|d| d.title.as_str())
        .unwrap_or("Document");
    let body = format!(
        "{}\n{}\n{}",
        error_banner(state.error.as_deref()),
        sidebar(&state.docs, selected),
        article
    );
    layout(title, auth, &body)
}

fn document_article(doc: &Document) -> String {
    let content = match doc.content.as_deref() {
        Some(text) if !text.trim().is_empty() => render_or_error_panel(text),
        _ => "<div class=\"p-8 text-center text-gray-500\"><p>No content to display</p></div>"
            .to_string(),
    };
    format!(
        concat!(
            "<article class=\"flex-1\">",
            "<header class=\"mb-4\"><h1 class=\"text-3xl font-bold\">{title}</h1>",
            "<p class=\"text-sm text-gray-500\">{description}</p>",
            "<a href=\"{edit}\" class=\"text-sm\">Edit</a></header>\n",
            "{content}\n",
            "</article>"
        ),
        title = escape_html(&doc.title),
        description = escape_html(&doc.description()),
        edit = escape_html(&href(&["docs", "edit", &doc.id])),
        content = content,
    )
}

/// Edit form for one document. `content` is what the textarea shows, which
/// after a failed save is the submitted text rather than the stored one.
pub fn edit_page(
    id: &str,
    doc: Option<&Document>,
    content: &str,
    error: Option<&str>,
    auth: &AuthState,
) -> String {
    let title = doc.map(|d| d.title.as_str()).unwrap_or(id);
    let description = doc.map(Document::description).unwrap_or_default();
    let body = format!(
        concat!(
            "{banner}\n",
            "<h1 class=\"text-2xl font-bold\">Edit {title}</h1>\n",
            "<p class=\"text-sm text-gray-500\">{description}</p>\n",
            "<form method=\"post\" action=\"{action}\">\n",
            "<textarea name=\"content\" rows=\"30\" class=\"w-full font-mono\">{content}</textarea>\n",
            "<button type=\"submit\">Save</button> <a href=\"{back}\">Cancel</a>\n",
            "</form>"
        ),
        banner = error_banner(error),
        title = escape_html(title),
        description = escape_html(&description),
        action = escape_html(&href(&["docs", "edit", id])),
        content = escape_html(content),
        back = escape_html(&href(&["docs", id])),
    );
    layout(&format!("Edit {}", title), auth, &body)
}

// ============ Changelog ============

fn stats_summary(stats: &DocumentStats) -> String {
    format!(
        concat!(
            "<div class=\"mt-3 text-sm text-gray-600\">",
            "<p>Total Documents: <span class=\"font-semibold\">{}</span></p>",
            "<p>Available Versions: <span class=\"font-semibold\">{}</span></p>",
            "</div>"
        ),
        stats.total_count,
        stats.chunk_times.len()
    )
}

fn chunk_entry(
    chunk_time: &str,
    entry: Option<&ChangelogEntry>,
    selected: bool,
    now: DateTime<Utc>,
) -> String {
    let class = if selected {
        "block p-3 rounded-lg bg-blue-100 text-blue-700 border border-blue-200"
    } else {
        "block p-3 rounded-lg text-gray-700"
    };
    let age = relative_age(chunk_time, now)
        .map(|age| format!("<div class=\"text-xs text-gray-500\">{}</div>", age))
        .unwrap_or_default();
    let count = entry
        .map(|e| {
            format!(
                "<div class=\"text-xs text-gray-500 mt-1\">{} documents</div>",
                e.document_count
            )
        })
        .unwrap_or_default();

    let mut out = format!(
        "<li><a href=\"{}\" class=\"{}\"><div class=\"text-sm font-medium\">{}</div>{}{}</a>",
        escape_html(&changelog_href(chunk_time)),
        class,
        escape_html(chunk_time),
        age,
        count
    );
    if let (true, Some(entry)) = (selected, entry) {
        out.push_str("<ul class=\"ml-4 mt-2 space-y-1\">");
        for doc in &entry.documents {
            out.push_str(&doc_link(doc, None));
        }
        out.push_str("</ul>");
    }
    out.push_str("</li>");
    out
}

/// Available versions newest first, with the selected chunk expanded.
pub fn changelog_page(
    state: &DocsState,
    selected: Option<&str>,
    auth: &AuthState,
    now: DateTime<Utc>,
) -> String {
    let mut body = String::from(concat!(
        "<div class=\"flex items-center justify-between\">",
        "<h2 class=\"text-lg font-semibold\">Changelog</h2>",
        "<form method=\"post\" action=\"/changelog/refresh\">",
        "<button type=\"submit\" title=\"Refresh changelog\">Refresh</button></form>",
        "</div>\n"
    ));
    body.push_str(&error_banner(state.error.as_deref()));

    match &state.stats {
        None => {}
        Some(stats) if stats.chunk_times.is_empty() => {
            body.push_str(&stats_summary(stats));
            body.push_str("<p class=\"text-sm text-gray-500\">No versions available</p>");
        }
        Some(stats) => {
            body.push_str(&stats_summary(stats));
            body.push_str("<h3 class=\"text-sm font-medium\">Available Versions</h3>\n<ul>\n");
            for chunk_time in sorted_chunk_times(&stats.chunk_times) {
                body.push_str(&chunk_entry(
                    chunk_time,
                    state.changelog_entry(chunk_time),
                    selected == Some(chunk_time),
                    now,
                ));
                body.push('\n');
            }
            body.push_str("</ul>");
        }
    }

    layout("Changelog", auth, &body)
}

// ============ Auth ============

pub fn signin_page(error: Option<&str>, auth: &AuthState) -> String {
    let body = format!(
        concat!(
            "<h1 class=\"text-3xl font-bold\">AutoDoc</h1>\n",
            "<h2 class=\"text-xl font-semibold mb-2\">Welcome Back</h2>\n",
            "{banner}\n",
            "<form method=\"post\" action=\"/signin\">\n",
            "<label>Email <input type=\"email\" name=\"email\"></label>\n",
            "<label>Password <input type=\"password\" name=\"password\"></label>\n",
            "<p>or</p>\n",
            "<label>API key <input type=\"text\" name=\"api_key\"></label>\n",
            "<button type=\"submit\">Sign in</button>\n",
            "</form>"
        ),
        banner = error_banner(error.or(auth.error.as_deref())),
    );
    layout("Sign in", auth, &body)
}

/// Registration form. `unmet` lists the password rules still failing and
/// `error` any other problem with the last submission.
pub fn signup_page(
    email: &str,
    project_name: &str,
    unmet: &[PasswordRule],
    error: Option<&str>,
    auth: &AuthState,
) -> String {
    let rules = if unmet.is_empty() {
        String::new()
    } else {
        let items: String = unmet
            .iter()
            .map(|rule| format!("<li class=\"text-red-600\">{}</li>", rule))
            .collect();
        format!(
            "<ul class=\"text-sm\">{}</ul><p class=\"text-xs\">Special characters: {}</p>",
            items,
            escape_html(SPECIAL_CHARACTERS)
        )
    };
    let body = format!(
        concat!(
            "<h1 class=\"text-3xl font-bold\">AutoDoc</h1>\n",
            "<p class=\"text-fd-muted-foreground\">Sign up for API access</p>\n",
            "{banner}\n",
            "<form method=\"post\" action=\"/signup\">\n",
            "<label>Email <input type=\"email\" name=\"email\" value=\"{email}\"></label>\n",
            "<label>Project name <input type=\"text\" name=\"project_name\" value=\"{project}\"></label>\n",
            "<label>Password <input type=\"password\" name=\"password\"></label>\n",
            "{rules}\n",
            "<label>Confirm password <input type=\"password\" name=\"confirm_password\"></label>\n",
            "<button type=\"submit\">Create account</button>\n",
            "</form>"
        ),
        banner = error_banner(error.or(auth.error.as_deref())),
        email = escape_html(email),
        project = escape_html(project_name),
        rules = rules,
    );
    layout("Sign up", auth, &body)
}

/// Shown once after a successful registration or sign-in.
pub fn api_key_page(api_key: &str, auth: &AuthState) -> String {
    let body = format!(
        concat!(
            "<h2 class=\"text-xl font-semibold\">Your API key</h2>\n",
            "<pre class=\"p-4 bg-gray-100\">{}</pre>\n",
            "<p><a href=\"/docs\">Continue to documents</a></p>"
        ),
        escape_html(api_key)
    );
    layout("API key", auth, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn relative_age_buckets() {
        assert_eq!(relative_age("2024-05-02T11:59:30Z", now()).unwrap(), "30s ago");
        assert_eq!(relative_age("2024-05-02T11:15:00Z", now()).unwrap(), "45m ago");
        assert_eq!(relative_age("2024-05-02T07:00:00Z", now()).unwrap(), "5h ago");
        assert_eq!(relative_age("2024-04-29T12:00:00Z", now()).unwrap(), "3d ago");
        assert_eq!(relative_age("2024-05-03T12:00:00Z", now()).unwrap(), "0s ago");
        assert!(relative_age("batch-7", now()).is_none());
    }

    #[test]
    fn href_encodes_segments() {
        assert_eq!(href(&["docs", "a/b c"]), "/docs/a%2Fb%20c");
        assert_eq!(href(&["docs", "edit", "doc-1"]), "/docs/edit/doc-1");
    }

    #[test]
    fn chunk_times_listed_newest_first() {
        let times = vec![
            "2024-05-01T10:00:00Z".to_string(),
            "2024-05-02T10:00:00Z".to_string(),
        ];
        assert_eq!(
            sorted_chunk_times(&times),
            vec!["2024-05-02T10:00:00Z", "2024-05-01T10:00:00Z"]
        );
    }

    #[test]
    fn chrome_is_escaped_content_is_rendered() {
        let mut doc = Document::bare("d1", Some("# Hi".to_string()));
        doc.title = "<script>".to_string();
        let mut state = DocsState::default();
        state.current_doc = Some(doc.clone());
        state.docs = vec![doc];
        let page = document_page(&state, &AuthState::default());
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
        assert!(page.contains("<h1 class=\"text-3xl font-bold mb-4\">Hi</h1>"));
    }

    #[test]
    fn empty_content_shows_placeholder() {
        let mut state = DocsState::default();
        state.current_doc = Some(Document::bare("d1", None));
        let page = document_page(&state, &AuthState::default());
        assert!(page.contains("No content to display"));
    }

    #[test]
    fn edit_page_keeps_submitted_text() {
        let page = edit_page(
            "d1",
            None,
            "draft <b>",
            Some("Failed to update document."),
            &AuthState::default(),
        );
        assert!(page.contains("draft &lt;b&gt;"));
        assert!(page.contains("Failed to update document."));
    }

    #[test]
    fn changelog_without_versions() {
        let mut state = DocsState::default();
        state.stats = Some(DocumentStats {
            total_count: 0,
            chunk_times: vec![],
            latest_documents: vec![],
        });
        let page = changelog_page(&state, None, &AuthState::default(), now());
        assert!(page.contains("No versions available"));
        assert!(page.contains("Total Documents: <span class=\"font-semibold\">0</span>"));
    }

    #[test]
    fn selected_chunk_expands_documents() {
        let chunk = "2024-05-02T10:00:00Z";
        let mut state = DocsState::default();
        state.stats = Some(DocumentStats {
            total_count: 1,
            chunk_times: vec![chunk.to_string()],
            latest_documents: vec![],
        });
        state
            .changelog
            .push(ChangelogEntry::new(chunk, vec![Document::bare("doc-9", None)]));
        let page = changelog_page(&state, Some(chunk), &AuthState::default(), now());
        assert!(page.contains("1 documents"));
        assert!(page.contains("href=\"/docs/doc-9\""));
        assert!(page.contains("2h ago"));
    }
}
