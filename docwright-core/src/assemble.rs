//! Document assembly: narratives in, Markdown and HTML out.

use futures::stream::{self, StreamExt, TryStreamExt};
use pulldown_cmark::{html, Event, Parser};
use tracing::{debug, info};

use crate::config::OutputConfig;
use crate::contract::{ClassMetadata, Document, Entity, EntityNarrative, FunctionSignature};
use crate::error::CompletionError;
use crate::narrate::Narrator;

/// Narrate every entity and assemble the combined document.
///
/// Entities are narrated concurrently, at most `narrator.max_concurrency()` at
/// a time, and collected in extraction order. The first failed narration fails
/// the whole assembly.
pub async fn assemble(
    functions: &[FunctionSignature],
    classes: &[ClassMetadata],
    narrator: &Narrator,
) -> Result<Document, CompletionError> {
    let entities: Vec<Entity> = functions
        .iter()
        .cloned()
        .map(Entity::Function)
        .chain(classes.iter().cloned().map(Entity::Class))
        .collect();
    info!(entities = entities.len(), "[DOCS] Narrating entities");

    let pending: Vec<_> = entities
        .iter()
        .map(|e| narrator.narrate_entity(e))
        .collect();
    let narratives: Vec<EntityNarrative> = stream::iter(pending)
        .buffered(narrator.max_concurrency())
        .try_collect()
        .await?;

    let markdown = render_markdown(&narratives);
    Ok(Document::from_markdown(markdown))
}

impl Document {
    pub fn from_markdown(markdown: String) -> Self {
        let html = markdown_to_html(&markdown);
        Self { markdown, html }
    }
}

/// Render narratives under the fixed headings. Functions and classes keep the
/// relative order they have in `narratives`.
pub fn render_markdown(narratives: &[EntityNarrative]) -> String {
    let mut docs = String::from("# API Documentation\n\n");

    docs.push_str("## Functions\n\n");
    for narrative in narratives {
        if let Entity::Function(f) = &narrative.entity {
            docs.push_str(&format!("### `{}`\n", f.name));
            docs.push_str(&format!("**Arguments:** `{}`\n\n", f.parameters.join(", ")));
            docs.push_str(&format!(
                "**Returns:** `{}`\n\n",
                f.return_annotation.as_deref().unwrap_or("None")
            ));
            push_narrative(&mut docs, narrative);
        }
    }

    docs.push_str("## Classes\n\n");
    for narrative in narratives {
        if let Entity::Class(c) = &narrative.entity {
            docs.push_str(&format!("### `{}`\n", c.name));
            docs.push_str(&format!("**Methods:** `{}`\n\n", c.methods.join(", ")));
            docs.push_str(&format!(
                "**Docstring:** {}\n\n",
                c.docstring.as_deref().unwrap_or("None")
            ));
            push_narrative(&mut docs, narrative);
        }
    }

    docs
}

fn push_narrative(docs: &mut String, narrative: &EntityNarrative) {
    docs.push_str(&format!("**Explanation:** {}\n\n", narrative.explanation));
    let fence = code_fence(&narrative.example);
    docs.push_str(&format!(
        "**Example Usage:**\n{fence}python\n{}\n{fence}\n\n",
        narrative.example
    ));
}

/// A backtick fence longer than any backtick run inside `code`, at least three.
fn code_fence(code: &str) -> String {
    let longest = code
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat((longest + 1).max(3))
}

/// CommonMark to HTML. Malformed input still renders. Raw HTML in the input
/// is emitted as escaped text.
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new(markdown).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

/// Write both renderings into the output directory, creating it if needed and
/// overwriting earlier output.
pub async fn save_document(document: &Document, output: &OutputConfig) -> std::io::Result<()> {
    tokio::fs::create_dir_all(&output.dir).await?;

    let markdown_path = output.markdown_path();
    tokio::fs::write(&markdown_path, &document.markdown).await?;
    debug!(path = %markdown_path.display(), bytes = document.markdown.len(), "Wrote markdown");

    let html_path = output.html_path();
    tokio::fs::write(&html_path, &document.html).await?;
    debug!(path = %html_path.display(), bytes = document.html.len(), "Wrote html");

    info!(dir = %output.dir.display(), "[DOCS] Documentation saved");
    Ok(())
}
