//! # Switchboard: Expert-Routed Infrastructure Q&A
//!
//! Switchboard answers operator questions about a datacenter estate by
//! routing each question to the specialist best placed to answer it: live
//! inventory and fabric-controller APIs, a vector index over hardware
//! documentation, or a plain chat model for everything else.
//!
//! ## Core Concepts
//!
//! - **Router**: Deterministic keyword scoring that picks an expert per turn
//! - **Experts**: Answering strategies behind a common trait (live API,
//!   retrieval-augmented, model-only)
//! - **Docstore**: SQLite-backed vector index with atomic rebuilds
//! - **Orchestrator**: Per-turn pipeline with timeouts, one-hop fallback,
//!   and session memory
//! - **Event bus**: Progress and diagnostic events streamed to pluggable sinks
//!
//! ## Quick Start
//!
//! ### Routing a Question
//!
//! The router is pure and synchronous; it can be used on its own:
//!
//! ```
//! use switchboard::router::{RouteTarget, Router};
//! use switchboard::types::ExpertKind;
//!
//! let router = Router::new();
//! let decision = router.route("which servers need a firmware upgrade?");
//!
//! assert_eq!(decision.target, RouteTarget::Expert(ExpertKind::Inventory));
//! assert!(decision.confidence > 0.0);
//! ```
//!
//! ### Working with Messages
//!
//! Conversation history uses role-tagged messages with convenience
//! constructors:
//!
//! ```
//! use switchboard::message::Message;
//!
//! let question = Message::user("how many fabrics are healthy?");
//! let reply = Message::assistant("All three fabrics report healthy.");
//!
//! assert!(question.has_role(Message::USER));
//! assert!(!reply.has_role(Message::USER));
//! ```
//!
//! ### Running the Pipeline
//!
//! Wire experts into a registry, hand it to the orchestrator, and feed it
//! turns. [`Orchestrator::handle_query`](orchestrator::Orchestrator::handle_query)
//! never fails; broken experts degrade into fallback answers plus fault
//! events on the report.
//!
//! ```
//! use std::sync::Arc;
//!
//! use switchboard::event_bus::EventBus;
//! use switchboard::experts::{ExpertRegistry, GeneralExpert};
//! use switchboard::model::ScriptedChatModel;
//! use switchboard::orchestrator::{Orchestrator, PipelineConfig, QueryRequest};
//!
//! # async fn run() {
//! let model = Arc::new(ScriptedChatModel::new().with_default_reply("Retry with doubling delays."));
//! let experts = ExpertRegistry::new().register(Arc::new(GeneralExpert::new(model)));
//!
//! let bus = EventBus::default();
//! let orchestrator = Orchestrator::new(experts, PipelineConfig::default(), bus.get_sender());
//!
//! let report = orchestrator
//!     .handle_query(QueryRequest::new("ops-chat", "what is exponential backoff?"))
//!     .await;
//!
//! assert_eq!(report.response.text, "Retry with doubling delays.");
//! assert!(!report.used_fallback);
//! # }
//! ```
//!
//! ### Building the Document Index
//!
//! The docstore turns documentation sources into an embedded, searchable
//! SQLite file. Rebuilds happen on a scratch file and replace the live
//! index atomically:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use switchboard::docstore::{DocStoreBuilder, DocumentSource};
//! use switchboard::embedding::MockEmbeddingProvider;
//!
//! # async fn run() -> Result<(), switchboard::docstore::StoreError> {
//! let provider = Arc::new(MockEmbeddingProvider::new());
//! let builder = DocStoreBuilder::new(provider, "docs.db");
//!
//! let sources = vec![DocumentSource::new(
//!     "gb300-overview",
//!     "GB300 NVL72 Overview",
//!     "The GB300 NVL72 rack links 72 GPUs over NVLink...",
//! )];
//! let report = builder.build(sources).await?;
//! assert_eq!(report.indexed_sources, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Fallible paths return typed errors carrying [`miette`] diagnostic codes
//! (`switchboard::docstore::*`, `switchboard::tools::*`, and so on), so
//! failures render with source chains and help text. Inside a turn the
//! orchestrator converts expert failures into [`faults::FaultEvent`]s rather
//! than propagating them.
//!
//! ## Module Guide
//!
//! - [`router`] - Keyword lexicon, scoring policies, and route decisions
//! - [`experts`] - The expert trait, registry, and the four built-in experts
//! - [`orchestrator`] - Turn pipeline, sessions, and pipeline configuration
//! - [`docstore`] - Chunking, embedding, and the SQLite vector index
//! - [`tools`] - REST clients for the inventory and fabric controller APIs
//! - [`model`] - Chat-model trait, HTTP implementation, and scripted test double
//! - [`embedding`] - Embedding provider trait and implementations
//! - [`event_bus`] - Event types, bus, and output sinks
//! - [`faults`] - Structured fault events and error ladders
//! - [`message`] - Role-tagged messages and conversation turns
//! - [`answer`] - Answer payloads and citations
//! - [`telemetry`] - Event formatting for terminals and logs
//! - [`types`] - Expert kinds and capabilities

pub mod answer;
pub mod docstore;
pub mod embedding;
pub mod event_bus;
pub mod experts;
pub mod faults;
pub mod message;
pub mod model;
pub mod orchestrator;
pub mod router;
pub mod telemetry;
pub mod tools;
pub mod types;
