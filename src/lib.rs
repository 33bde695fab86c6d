//! # Course RAG
//!
//! A retrieval-augmented chatbot that answers questions about course
//! materials.
//!
//! Course documents are parsed into lessons, split into overlapping chunks
//! and embedded into two collections: a course catalog and the lesson
//! content. A question goes to a hosted chat model together with two tools
//! (content search and course outline); the model may call them once before
//! answering, and the answer comes back with the sources it relied on.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Course docs  │──▶│ Parse+Chunk  │──▶│   SQLite     │
//! │  (.txt/.md)  │   │   +Embed     │   │ catalog+text │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │
//!                    ┌─────────────────────────┤
//!                    ▼                         ▼
//!              ┌──────────┐  tool calls  ┌──────────┐
//!              │ RagSystem│◀────────────▶│  Tools   │
//!              │ +Sessions│              └──────────┘
//!              └────┬─────┘
//!          ┌────────┴────────┐
//!          ▼                 ▼
//!     ┌──────────┐     ┌──────────┐
//!     │   CLI    │     │   HTTP   │
//!     └──────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! course-rag init                         # create database
//! course-rag ingest --folder ./docs       # index course documents
//! course-rag query "What is lesson 2 of the MCP course about?"
//! course-rag serve                        # start HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`models`] | Core data types |
//! | [`document`] | Course document parsing |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`store`] | Storage backends (SQLite, in-memory) |
//! | [`vector_store`] | Embedding-aware search over both collections |
//! | [`tools`] | Model-callable tools and registry |
//! | [`llm`] | Chat-completion client |
//! | [`generator`] | Two-step tool-calling answer generation |
//! | [`session`] | Bounded per-session history |
//! | [`ingest`] | Folder and document ingestion |
//! | [`rag`] | Query orchestrator |
//! | [`server`] | HTTP API |

pub mod chunk;
pub mod config;
pub mod db;
pub mod document;
pub mod embedding;
pub mod generator;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod rag;
pub mod server;
pub mod session;
pub mod store;
pub mod tools;
pub mod vector_store;
