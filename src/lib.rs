//! # Operius
//!
//! A local-first knowledge-ingestion and semantic-search tool for engineering
//! teams. Operius pulls source files and commits from a GitHub repository and
//! live resource manifests from a Kubernetes cluster, normalizes them into a
//! single document schema, embeds them into a SQLite-backed vector store, and
//! answers questions over the collection through a keyword-intent search agent
//! with an optional LLM gateway.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌───────────┐
//! │  Connectors  │──▶│   Pipeline     │──▶│  SQLite    │
//! │  GitHub/K8s  │   │ Normalize+Embed│   │ vectors    │
//! └──────────────┘   └───────────────┘   └────┬──────┘
//!                                             │
//!                          ┌──────────────────┤
//!                          ▼                  ▼
//!                    ┌──────────┐       ┌──────────┐
//!                    │ Search    │──────▶│  Chat    │
//!                    │ Agent     │  LLM  │  REPL    │
//!                    └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! operius init                        # create database
//! operius sync all                    # ingest repo + cluster
//! operius search "failing pods"       # one-shot semantic search
//! operius chat                        # interactive session
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`connector_github`] | GitHub repository connector |
//! | [`connector_kubernetes`] | Kubernetes cluster connector |
//! | [`transform`] | Raw-record normalization |
//! | [`pipeline`] | Fetch → normalize → upsert orchestration |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | SQLite vector store |
//! | [`gateway`] | LLM chat-completions client |
//! | [`agent`] | Keyword-intent search agent |
//! | [`chat`] | Interactive REPL |
//! | [`stats`] | Collection statistics |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod agent;
pub mod chat;
pub mod config;
pub mod connector;
pub mod connector_github;
pub mod connector_kubernetes;
pub mod db;
pub mod embedding;
pub mod error;
pub mod gateway;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod sources;
pub mod stats;
pub mod store;
pub mod transform;
