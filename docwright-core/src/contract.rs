//! # contract: data model and external seams
//!
//! This module defines the plain data that flows through the documentation
//! pipeline and the two traits standing in for the outside world:
//!
//! - [`Completer`]: the external text-completion capability (an LLM endpoint).
//! - [`SourceLocator`]: a repository content service that can list source files
//!   and fetch their raw text.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`; `MockCompleter` and
//!   `MockSourceLocator` are exported when the `test-export-mocks` feature is
//!   enabled (the default), so the binary crate can drive its HTTP routes
//!   without network access.
//!
//! ## Lifecycle
//! Everything here is request-scoped. Parsed entities are dropped after the
//! document is assembled; only the final [`Document`] text is persisted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::{CompletionError, FetchError};

/// A source file fetched from a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

/// Reference to a repository on the content service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

/// One file entry of a repository listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub path: String,
    pub download_url: String,
}

/// Signature of a function definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionSignature {
    pub name: String,
    pub parameters: Vec<String>,
    pub return_annotation: Option<String>,
    /// Source text of the whole definition, embedded in narration prompts.
    #[serde(skip)]
    pub source: String,
}

/// Metadata of a class definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassMetadata {
    pub name: String,
    /// Names of the methods defined directly in the class body.
    pub methods: Vec<String>,
    pub docstring: Option<String>,
    #[serde(skip)]
    pub source: String,
}

/// Output of the structural extractor, in pre-order traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedEntities {
    pub functions: Vec<FunctionSignature>,
    pub classes: Vec<ClassMetadata>,
}

/// A function or class extracted from source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Function(FunctionSignature),
    Class(ClassMetadata),
}

impl Entity {
    pub fn name(&self) -> &str {
        match self {
            Entity::Function(f) => &f.name,
            Entity::Class(c) => &c.name,
        }
    }

    /// Word used for the entity in prompts and questions.
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Function(_) => "function",
            Entity::Class(_) => "class",
        }
    }

    pub fn source(&self) -> &str {
        match self {
            Entity::Function(f) => &f.source,
            Entity::Class(c) => &c.source,
        }
    }
}

/// Generated explanation and example for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityNarrative {
    pub entity: Entity,
    pub explanation: String,
    pub example: String,
}

/// Assembled documentation in both output formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub markdown: String,
    pub html: String,
}

/// The external text-completion capability.
///
/// Implementors send `prompt` as a single completion request and return the
/// text of the first choice as received. Trimming is the caller's concern.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// Repository content service used to locate and fetch source files.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SourceLocator: Send + Sync {
    /// Recursively list the repository and return the source files of interest,
    /// depth-first, as one flat sequence.
    async fn list_source_files(&self, repo: &RepoRef) -> Result<Vec<FileRef>, FetchError>;

    /// Fetch the raw text behind a download URL.
    async fn fetch(&self, download_url: &str) -> Result<String, FetchError>;
}
