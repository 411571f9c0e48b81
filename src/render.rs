//! Markdown-subset renderer.
//!
//! Turns the MDX-like text produced by the documentation generator into an
//! HTML fragment. This is deliberately not a CommonMark implementation: it is
//! an ordered pipeline of independent text rewrites, and the order is part of
//! the contract because later steps see the output of earlier ones.
//!
//! | # | Step | Match condition |
//! |---|------|-----------------|
//! | 1 | [`Headings`] | `^#{1,6} .+$`, marker at column zero |
//! | 2 | [`Emphasis`] | `**x**`, then `*x*`, then `~~x~~`, within one line |
//! | 3 | [`InlineCode`] | `` `x` ``, no backtick or newline inside |
//! | 4 | [`FencedCode`] | ```` ```lang ```` … ```` ``` ```` |
//! | 5 | [`Blockquotes`] | line starting with `>` |
//! | 6 | [`Lists`] | line starting with `* `, `- ` or `N. `, then runs wrapped |
//! | 7 | [`Links`] | `[text](url)` |
//! | 8 | [`Paragraphs`] | any other line |
//! | 9 | [`Cleanup`] | empty `<p>` elements |
//!
//! Line-level block steps (5, 6, 8) leave the lines of an already-emitted
//! fenced code block alone. Inline steps do not.
//!
//! Output is **not** sanitized. Content comes from the trusted generation
//! pipeline and is injected as-is.

use regex::{Captures, Regex};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("invalid pattern in {step} step: {message}")]
    Pattern { step: &'static str, message: String },
}

/// One rewrite of the pipeline.
pub trait RewriteStep: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, input: &str) -> String;
}

fn compile(step: &'static str, pattern: &str) -> Result<Regex, RenderError> {
    Regex::new(pattern).map_err(|e| RenderError::Pattern {
        step,
        message: e.to_string(),
    })
}

const LI_UNORDERED: &str = r#"<li class="ml-4 list-disc">"#;
const LI_ORDERED: &str = r#"<li class="ml-4 list-decimal">"#;
const PARAGRAPH_OPEN: &str = r#"<p class="mb-4">"#;
/// Exact markers emitted by [`FencedCode`]; nothing else counts as a code block.
const CODE_BLOCK_OPEN: &str = r#"<pre class="bg-gray-100 p-4 rounded-lg overflow-x-auto my-4""#;
const CODE_BLOCK_CLOSE: &str = "</code></pre>";

fn heading_class(level: usize) -> &'static str {
    match level {
        1 => "text-3xl font-bold mb-4",
        2 => "text-2xl font-semibold mb-3",
        3 => "text-xl font-semibold mb-2",
        4 => "text-lg font-semibold mb-2",
        5 => "text-base font-semibold mb-2",
        _ => "text-sm font-semibold mb-2",
    }
}

/// Apply `f` to each line that is not part of a fenced code block, keeping
/// every other line verbatim. Text that merely mentions `<pre>` is prose.
fn map_lines_outside_code<F>(input: &str, mut f: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut out = String::with_capacity(input.len());
    let mut in_code = false;
    for (i, line) in input.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let opens = line.rfind(CODE_BLOCK_OPEN);
        let closes = line.rfind(CODE_BLOCK_CLOSE);
        let touches_code = in_code || opens.is_some();
        in_code = match (opens, closes) {
            (Some(o), Some(c)) => o > c,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => in_code,
        };
        if touches_code {
            out.push_str(line);
        } else {
            out.push_str(&f(line));
        }
    }
    out
}

// ============ 1. Headings ============

pub struct Headings {
    re: Regex,
}

impl Headings {
    pub fn new() -> Result<Self, RenderError> {
        Ok(Self {
            re: compile("headings", r"(?m)^(#{1,6}) (.+)$")?,
        })
    }
}

impl RewriteStep for Headings {
    fn name(&self) -> &'static str {
        "headings"
    }

    fn apply(&self, input: &str) -> String {
        self.re
            .replace_all(input, |c: &Captures| {
                let level = c[1].len();
                format!(
                    "<h{level} class=\"{}\">{}</h{level}>",
                    heading_class(level),
                    &c[2]
                )
            })
            .into_owned()
    }
}

// ============ 2. Emphasis ============

/// Bold, then italic, then strikethrough. Overlapping markers do not nest.
pub struct Emphasis {
    bold: Regex,
    italic: Regex,
    strike: Regex,
}

impl Emphasis {
    pub fn new() -> Result<Self, RenderError> {
        Ok(Self {
            bold: compile("emphasis", r"\*\*(\S(?:[^\n]*?\S)?)\*\*")?,
            // Content may not start or end with whitespace, so `* item`
            // list markers are left for the list step.
            italic: compile("emphasis", r"\*([^\s*](?:[^*\n]*[^\s*])?)\*")?,
            strike: compile("emphasis", r"~~([^~\n]+)~~")?,
        })
    }
}

impl RewriteStep for Emphasis {
    fn name(&self) -> &'static str {
        "emphasis"
    }

    fn apply(&self, input: &str) -> String {
        let text = self
            .bold
            .replace_all(input, r#"<strong class="font-semibold">${1}</strong>"#);
        let text = self
            .italic
            .replace_all(&text, r#"<em class="italic">${1}</em>"#);
        self.strike
            .replace_all(&text, r#"<del class="line-through">${1}</del>"#)
            .into_owned()
    }
}

// ============ 3. Inline code ============

pub struct InlineCode {
    re: Regex,
}

impl InlineCode {
    pub fn new() -> Result<Self, RenderError> {
        Ok(Self {
            re: compile("inline_code", r"`([^`\n]+)`")?,
        })
    }
}

impl RewriteStep for InlineCode {
    fn name(&self) -> &'static str {
        "inline_code"
    }

    fn apply(&self, input: &str) -> String {
        self.re
            .replace_all(
                input,
                r#"<code class="bg-gray-100 px-1 py-0.5 rounded text-sm font-mono">${1}</code>"#,
            )
            .into_owned()
    }
}

// ============ 4. Fenced code ============

/// Fenced blocks. The language tag is recorded as `data-language` and a
/// `language-*` class; highlighting is left to the page.
pub struct FencedCode {
    re: Regex,
}

impl FencedCode {
    pub fn new() -> Result<Self, RenderError> {
        Ok(Self {
            re: compile("fenced_code", r"(?s)```([A-Za-z0-9_+#.-]*)[^\n]*\n(.*?)```")?,
        })
    }
}

impl RewriteStep for FencedCode {
    fn name(&self) -> &'static str {
        "fenced_code"
    }

    fn apply(&self, input: &str) -> String {
        self.re
            .replace_all(input, |c: &Captures| {
                let lang = &c[1];
                let body = c[2].strip_suffix('\n').unwrap_or(&c[2]);
                let (attr, class) = if lang.is_empty() {
                    (String::new(), String::new())
                } else {
                    (
                        format!(" data-language=\"{}\"", lang),
                        format!(" language-{}", lang),
                    )
                };
                format!(
                    "{}{}><code class=\"text-sm{}\">{}{}",
                    CODE_BLOCK_OPEN, attr, class, body, CODE_BLOCK_CLOSE
                )
            })
            .into_owned()
    }
}

// ============ 5. Blockquotes ============

/// One `<blockquote>` per quoted line; consecutive lines are not merged.
pub struct Blockquotes;

impl RewriteStep for Blockquotes {
    fn name(&self) -> &'static str {
        "blockquotes"
    }

    fn apply(&self, input: &str) -> String {
        map_lines_outside_code(input, |line| match line.strip_prefix('>') {
            Some(rest) => {
                let rest = rest.strip_prefix(' ').unwrap_or(rest);
                format!(
                    "<blockquote class=\"border-l-4 border-gray-300 pl-4 italic my-4\">{}</blockquote>",
                    rest
                )
            }
            None => line.to_string(),
        })
    }
}

// ============ 6. Lists ============

/// List items, then a single wrapping pass over runs of consecutive items.
/// A run becomes `<ol>` when its first item was numeric, `<ul>` otherwise.
pub struct Lists {
    item: Regex,
    run: Regex,
}

impl Lists {
    pub fn new() -> Result<Self, RenderError> {
        Ok(Self {
            item: compile("lists", r"^(?:([*-])|(\d+)\.) (.+)$")?,
            run: compile(
                "lists",
                r#"(?m)^<li class="ml-4 list-(?:disc|decimal)">.*</li>(?:\n<li class="ml-4 list-(?:disc|decimal)">.*</li>)*"#,
            )?,
        })
    }
}

impl RewriteStep for Lists {
    fn name(&self) -> &'static str {
        "lists"
    }

    fn apply(&self, input: &str) -> String {
        let items = map_lines_outside_code(input, |line| match self.item.captures(line) {
            Some(c) => {
                let open = if c.get(2).is_some() {
                    LI_ORDERED
                } else {
                    LI_UNORDERED
                };
                format!("{}{}</li>", open, &c[3])
            }
            None => line.to_string(),
        });

        self.run
            .replace_all(&items, |c: &Captures| {
                let run = &c[0];
                if run.starts_with(LI_ORDERED) {
                    format!("<ol class=\"list-decimal pl-6 my-4\">\n{}\n</ol>", run)
                } else {
                    format!("<ul class=\"list-disc pl-6 my-4\">\n{}\n</ul>", run)
                }
            })
            .into_owned()
    }
}

// ============ 7. Links ============

pub struct Links {
    re: Regex,
}

impl Links {
    pub fn new() -> Result<Self, RenderError> {
        Ok(Self {
            re: compile("links", r"\[([^\]\n]+)\]\(([^)\s]+)\)")?,
        })
    }
}

impl RewriteStep for Links {
    fn name(&self) -> &'static str {
        "links"
    }

    fn apply(&self, input: &str) -> String {
        self.re
            .replace_all(
                input,
                r#"<a href="${2}" class="text-blue-600 hover:underline">${1}</a>"#,
            )
            .into_owned()
    }
}

// ============ 8. Paragraphs ============

/// Wraps every line that is not already a block element. Blank lines act as
/// separators: they become empty paragraphs, which [`Cleanup`] removes.
pub struct Paragraphs;

fn is_block_line(line: &str) -> bool {
    const BLOCK_PREFIXES: [&str; 7] = ["<pre", "<blockquote", "<ul", "</ul>", "<ol", "</ol>", "<li"];
    if BLOCK_PREFIXES.iter().any(|p| line.starts_with(p)) {
        return true;
    }
    let bytes = line.as_bytes();
    bytes.len() >= 3 && bytes[0] == b'<' && bytes[1] == b'h' && (b'1'..=b'6').contains(&bytes[2])
}

impl RewriteStep for Paragraphs {
    fn name(&self) -> &'static str {
        "paragraphs"
    }

    fn apply(&self, input: &str) -> String {
        map_lines_outside_code(input, |line| {
            if is_block_line(line) {
                line.to_string()
            } else {
                format!("{}{}</p>", PARAGRAPH_OPEN, line)
            }
        })
    }
}

// ============ 9. Cleanup ============

/// Removes whitespace-only paragraphs, repeating until nothing changes.
pub struct Cleanup {
    re: Regex,
}

impl Cleanup {
    pub fn new() -> Result<Self, RenderError> {
        Ok(Self {
            re: compile("cleanup", r"<p(?:\s[^>]*)?>\s*</p>\n?")?,
        })
    }
}

impl RewriteStep for Cleanup {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn apply(&self, input: &str) -> String {
        let mut current = input.to_string();
        loop {
            let next = self.re.replace_all(&current, "").into_owned();
            if next == current {
                return current;
            }
            current = next;
        }
    }
}

// ============ Pipeline ============

/// The ordered set of steps.
pub struct Pipeline {
    steps: Vec<Box<dyn RewriteStep>>,
}

impl Pipeline {
    pub fn new() -> Result<Self, RenderError> {
        let steps: Vec<Box<dyn RewriteStep>> = vec![
            Box::new(Headings::new()?),
            Box::new(Emphasis::new()?),
            Box::new(InlineCode::new()?),
            Box::new(FencedCode::new()?),
            Box::new(Blockquotes),
            Box::new(Lists::new()?),
            Box::new(Links::new()?),
            Box::new(Paragraphs),
            Box::new(Cleanup::new()?),
        ];
        Ok(Self { steps })
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, input: &str) -> String {
        let normalized = input.replace("\r\n", "\n");
        let html = self
            .steps
            .iter()
            .fold(normalized, |text, step| step.apply(&text));
        html.trim_end().to_string()
    }
}

fn shared_pipeline() -> Result<&'static Pipeline, RenderError> {
    static PIPELINE: OnceLock<Result<Pipeline, RenderError>> = OnceLock::new();
    PIPELINE
        .get_or_init(Pipeline::new)
        .as_ref()
        .map_err(Clone::clone)
}

/// Render document text to an HTML fragment.
pub fn render(input: &str) -> Result<String, RenderError> {
    Ok(shared_pipeline()?.run(input))
}

/// Render for display. On failure, returns an error panel carrying the raw
/// error message instead of partial output.
pub fn render_or_error_panel(input: &str) -> String {
    match render(input) {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!(error = %e, "document rendering failed");
            error_panel(&e)
        }
    }
}

pub fn error_panel(err: &RenderError) -> String {
    format!(
        concat!(
            "<div class=\"p-8 text-center\">",
            "<h3 class=\"text-lg font-semibold text-red-600\">Error Rendering Document</h3>",
            "<p class=\"text-gray-600 mb-4\">There was an error processing the content.</p>",
            "<details><summary>Show error details</summary><pre>{}</pre></details>",
            "</div>"
        ),
        escape_html(&err.to_string())
    )
}

/// Escape text for inclusion in viewer chrome. Never applied to rendered
/// document content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(input: &str) -> String {
        render(input).unwrap()
    }

    #[test]
    fn pipeline_order() {
        let pipeline = Pipeline::new().unwrap();
        assert_eq!(
            pipeline.step_names(),
            vec![
                "headings",
                "emphasis",
                "inline_code",
                "fenced_code",
                "blockquotes",
                "lists",
                "links",
                "paragraphs",
                "cleanup"
            ]
        );
    }

    #[test]
    fn heading_levels_one_through_six() {
        for level in 1..=6 {
            let input = format!("{} Title {}", "#".repeat(level), level);
            let out = html(&input);
            assert_eq!(
                out,
                format!(
                    "<h{l} class=\"{}\">Title {l}</h{l}>",
                    heading_class(level),
                    l = level
                )
            );
        }
    }

    #[test]
    fn heading_requires_space_and_column_zero() {
        assert_eq!(html("#NoSpace"), "<p class=\"mb-4\">#NoSpace</p>");
        assert_eq!(html(" # Indented"), "<p class=\"mb-4\"> # Indented</p>");
        assert_eq!(html("####### Seven"), "<p class=\"mb-4\">####### Seven</p>");
    }

    #[test]
    fn emphasis_does_not_nest() {
        let out = html("**a *b* c**");
        assert_eq!(out.matches("<strong").count(), 1);
        assert_eq!(
            out,
            "<p class=\"mb-4\"><strong class=\"font-semibold\">a <em class=\"italic\">b</em> c</strong></p>"
        );
    }

    #[test]
    fn strikethrough_and_inline_code() {
        assert_eq!(
            html("~~old~~ and `new`"),
            "<p class=\"mb-4\"><del class=\"line-through\">old</del> and <code class=\"bg-gray-100 px-1 py-0.5 rounded text-sm font-mono\">new</code></p>"
        );
    }

    #[test]
    fn fenced_code_records_language() {
        let out = html("```rust\nlet x = 1;\n```");
        assert_eq!(
            out,
            "<pre class=\"bg-gray-100 p-4 rounded-lg overflow-x-auto my-4\" data-language=\"rust\"><code class=\"text-sm language-rust\">let x = 1;</code></pre>"
        );

        let out = html("```\nplain\n```");
        assert!(out.contains("<code class=\"text-sm\">plain</code>"));
        assert!(!out.contains("data-language"));
    }

    #[test]
    fn code_block_lines_are_not_wrapped() {
        let out = html("```sh\n> npm install\n\n- not a list\n```\nafter");
        assert!(out.contains("> npm install\n\n- not a list</code></pre>"));
        assert!(!out.contains("<blockquote"));
        assert!(!out.contains("<li"));
        assert!(out.ends_with("<p class=\"mb-4\">after</p>"));
    }

    #[test]
    fn prose_mentioning_pre_tag_keeps_block_rules() {
        let out = html("Wrap output in `<pre>` tags.\n\nNext paragraph\n- item one\n> quote");
        assert!(out.starts_with(PARAGRAPH_OPEN));
        assert!(out.contains("<p class=\"mb-4\">Next paragraph</p>"));
        assert!(out.contains("<li class=\"ml-4 list-disc\">item one</li>"));
        assert!(out.contains(">quote</blockquote>"));
    }

    #[test]
    fn blockquotes_are_one_per_line() {
        let out = html("> first\n> second");
        assert_eq!(out.matches("<blockquote").count(), 2);
        assert!(out.contains(">first</blockquote>"));
        assert!(out.contains(">second</blockquote>"));
    }

    #[test]
    fn numeric_first_item_makes_ordered_list() {
        assert_eq!(
            html("1. one\n2. two"),
            "<ol class=\"list-decimal pl-6 my-4\">\n<li class=\"ml-4 list-decimal\">one</li>\n<li class=\"ml-4 list-decimal\">two</li>\n</ol>"
        );

        let mixed = html("3. first\n- second");
        assert!(mixed.starts_with("<ol"));
        assert!(!mixed.contains("<ul"));
    }

    #[test]
    fn bullet_first_item_makes_unordered_list() {
        let out = html("- a\n* b");
        assert!(out.starts_with("<ul class=\"list-disc pl-6 my-4\">"));
        assert_eq!(out.matches("<li").count(), 2);
        assert!(!out.contains("<ol"));
        assert!(!out.contains("<em"));
    }

    #[test]
    fn separated_runs_get_separate_containers() {
        let out = html("- a\n\n1. b");
        assert_eq!(out.matches("<ul").count(), 1);
        assert_eq!(out.matches("<ol").count(), 1);
    }

    #[test]
    fn links() {
        assert_eq!(
            html("[Docs](https://example.com/docs)"),
            "<p class=\"mb-4\"><a href=\"https://example.com/docs\" class=\"text-blue-600 hover:underline\">Docs</a></p>"
        );
    }

    #[test]
    fn blank_lines_separate_paragraphs() {
        assert_eq!(
            html("first\n\n\nsecond\r\n"),
            "<p class=\"mb-4\">first</p>\n<p class=\"mb-4\">second</p>"
        );
    }

    #[test]
    fn cleanup_is_idempotent() {
        let cleanup = Cleanup::new().unwrap();
        let inputs = [
            "<p class=\"mb-4\"></p>\n<p class=\"mb-4\">x</p>",
            "<p class=\"mb-4\"><p class=\"mb-4\">  </p></p>",
            "<p></p><p>\n</p>text",
            "no paragraphs at all",
        ];
        for input in inputs {
            let once = cleanup.apply(input);
            assert_eq!(cleanup.apply(&once), once, "input: {:?}", input);
        }
        assert_eq!(cleanup.apply(inputs[1]), "");
    }

    #[test]
    fn input_is_not_escaped() {
        assert_eq!(html("<div>raw</div>"), "<p class=\"mb-4\"><div>raw</div></p>");
    }

    #[test]
    fn mixed_document() {
        let doc = "# API\n\nThe **router** exposes `GET /users`.\n\n## Routes\n\n- list\n- create\n\n> Generated";
        let out = html(doc);
        assert!(out.starts_with("<h1 class=\"text-3xl font-bold mb-4\">API</h1>"));
        assert!(out.contains("<h2 class=\"text-2xl font-semibold mb-3\">Routes</h2>"));
        assert!(out.contains("<strong class=\"font-semibold\">router</strong>"));
        assert!(out.contains("<ul class=\"list-disc pl-6 my-4\">"));
        assert!(out.ends_with("Generated</blockquote>"));
        assert!(!out.contains("<p class=\"mb-4\"></p>"));
    }

    #[test]
    fn error_panel_escapes_message() {
        let err = RenderError::Pattern {
            step: "links",
            message: "bad <pattern>".to_string(),
        };
        let panel = error_panel(&err);
        assert!(panel.contains("Error Rendering Document"));
        assert!(panel.contains("bad &lt;pattern&gt;"));
    }

    #[test]
    fn render_or_error_panel_passes_through() {
        assert_eq!(render_or_error_panel("# Hi"), html("# Hi"));
    }
}
