//! LLM-backed collaborator implementations.
//!
//! An OpenAI-compatible chat client plus prompt-driven implementations
//! of the pipeline's collaborator traits: research, drafting, scoring,
//! refinement and metadata generation all ride on chat completions, and
//! image sourcing queries the Openverse search API.
//!
//! ```rust,ignore
//! use contentforge::llm::{ChatClient, LlmCollaborators};
//! use contentforge::collaborators::Researcher;
//! use std::sync::Arc;
//!
//! let client = Arc::new(ChatClient::from_env()?);
//! let collaborators = LlmCollaborators::new(client);
//! let research = collaborators.research("rust async patterns", "informative").await?;
//! ```

mod client;
mod collab;

pub use client::{ChatClient, LlmError, Message};
pub use collab::{extract_json, LlmCollaborators, OpenverseImageFinder};
