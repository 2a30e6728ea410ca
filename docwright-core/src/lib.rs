#![doc = "docwright-core: core logic library for docwright."]

//! This crate contains the documentation pipeline: Python structure
//! extraction, LLM narration, document assembly and orchestration.
//! Network clients for the completion API and the repository content service
//! live in the `docwright` binary crate and plug in through [`contract`].
//!
//! # Usage
//! Build a [`narrate::Narrator`] around a [`contract::Completer`], then call
//! the flows in [`pipeline`].

pub mod assemble;
pub mod config;
pub mod contract;
pub mod error;
pub mod extract;
pub mod narrate;
pub mod pipeline;
