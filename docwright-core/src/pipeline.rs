//! High-level pipeline: orchestrates extract → narrate → assemble → save.
//!
//! This module provides the top-level flows the HTTP routes and the CLI call:
//!   - [`generate_docs`]: document one snippet and persist it
//!   - [`check_docs`]: regenerate documentation and compare it with what exists
//!   - [`document_repository`]: locate every source file of a repository,
//!     document each one and persist one Markdown/HTML pair per file
//!
//! # Error Handling
//! Each step returns immediately on failure with a [`DocError`] that keeps the
//! failing component's kind. Documents are only written after assembly
//! succeeded, so a failed narration never leaves partial output behind.

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::assemble::{assemble, save_document};
use crate::config::OutputConfig;
use crate::contract::{Document, RepoRef, SourceFile, SourceLocator};
use crate::error::DocError;
use crate::extract::extract;
use crate::narrate::Narrator;

const MAX_FLAT_NAME_LEN: usize = 180;

/// Outcome of comparing existing documentation with a fresh rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocsStatus {
    UpToDate,
    Outdated,
}

impl DocsStatus {
    pub fn message(&self) -> &'static str {
        match self {
            DocsStatus::UpToDate => "Documentation is up-to-date.",
            DocsStatus::Outdated => "Documentation is outdated. Please regenerate.",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RepositoryReport {
    pub repo: RepoRef,
    pub files: Vec<FileReport>,
}

#[derive(Debug, Serialize)]
pub struct FileReport {
    pub path: String,
    pub markdown_path: PathBuf,
    pub html_path: PathBuf,
    pub functions: usize,
    pub classes: usize,
}

/// Render documentation for `code` without persisting it.
pub async fn render_docs(code: &str, narrator: &Narrator) -> Result<Document, DocError> {
    let entities = extract(code)?;
    let document = assemble(&entities.functions, &entities.classes, narrator).await?;
    Ok(document)
}

/// Document `code` and write both renderings to `output`.
pub async fn generate_docs(
    code: &str,
    narrator: &Narrator,
    output: &OutputConfig,
) -> Result<Document, DocError> {
    info!(code_len = code.len(), "[DOCS] Generating documentation");
    let document = render_docs(code, narrator).await?;
    if let Err(e) = save_document(&document, output).await {
        error!(error = ?e, dir = %output.dir.display(), "[DOCS][ERROR] Failed to save documentation");
        return Err(e.into());
    }
    Ok(document)
}

/// Regenerate documentation for `code` and compare it with `existing`.
pub async fn check_docs(
    code: &str,
    existing: &str,
    narrator: &Narrator,
) -> Result<DocsStatus, DocError> {
    let current = render_docs(code, narrator).await?;
    let status = if current.markdown == existing {
        DocsStatus::UpToDate
    } else {
        DocsStatus::Outdated
    };
    info!(?status, "[DOCS] Checked documentation");
    Ok(status)
}

/// Fetch every source file of `repo`, in listing order.
pub async fn fetch_sources<L>(locator: &L, repo: &RepoRef) -> Result<Vec<SourceFile>, DocError>
where
    L: SourceLocator + ?Sized,
{
    let refs = locator.list_source_files(repo).await?;
    info!(owner = %repo.owner, repo = %repo.repo, files = refs.len(), "[DOCS] Listed source files");

    let mut sources = Vec::with_capacity(refs.len());
    for file in refs {
        let content = locator.fetch(&file.download_url).await?;
        sources.push(SourceFile {
            path: file.path,
            content,
        });
    }
    Ok(sources)
}

/// Document every source file of `repo` into `output_dir`, one Markdown/HTML
/// pair per file named after its flattened path. Paths that flatten to a stem
/// already used in this run get a `__2`, `__3`, ... suffix.
pub async fn document_repository<L>(
    locator: &L,
    narrator: &Narrator,
    repo: &RepoRef,
    output_dir: &Path,
) -> Result<RepositoryReport, DocError>
where
    L: SourceLocator + ?Sized,
{
    let sources = fetch_sources(locator, repo).await?;

    let mut files = Vec::with_capacity(sources.len());
    let mut stems = HashSet::new();
    for source in sources {
        info!(path = %source.path, "[DOCS] Documenting file");
        let entities = match extract(&source.content) {
            Ok(entities) => entities,
            Err(e) => {
                error!(path = %source.path, error = %e, "[DOCS][ERROR] Failed to parse file");
                return Err(e.into());
            }
        };
        let document = assemble(&entities.functions, &entities.classes, narrator).await?;

        let stem = unique_stem(flat_name(&source.path), &mut stems);
        let output = OutputConfig {
            dir: output_dir.to_path_buf(),
            markdown_name: format!("{stem}.md"),
            html_name: format!("{stem}.html"),
        };
        save_document(&document, &output).await?;

        files.push(FileReport {
            path: source.path,
            markdown_path: output.markdown_path(),
            html_path: output.html_path(),
            functions: entities.functions.len(),
            classes: entities.classes.len(),
        });
    }

    info!(files = files.len(), "[DOCS] Repository documented");
    Ok(RepositoryReport {
        repo: repo.clone(),
        files,
    })
}

fn unique_stem(stem: String, used: &mut HashSet<String>) -> String {
    if used.insert(stem.clone()) {
        return stem;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{stem}__{n}");
        if used.insert(candidate.clone()) {
            warn!(stem = %stem, renamed = %candidate, "[DOCS] Output name already used, renaming");
            return candidate;
        }
        n += 1;
    }
}

/// Flatten a repository path into a file stem with `__` as the directory
/// separator, dropping leading directories while the name is too long.
pub fn flat_name(path: &str) -> String {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let basename = segments.pop().unwrap_or("index");
    let basename = basename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(basename);

    let mut from = 0;
    loop {
        let joined = if segments.len() > from {
            format!("{}__{}", segments[from..].join("__"), basename)
        } else {
            basename.to_string()
        };
        if joined.len() <= MAX_FLAT_NAME_LEN || from >= segments.len() {
            return joined;
        }
        from += 1;
    }
}
