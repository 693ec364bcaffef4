//! # hekim-rag
//!
//! Retrieval-augmented question answering over two medical vector
//! collections, with reciprocal-rank fusion and grounded LLM generation.
//!
//! ## Architecture
//!
//! One request flows through the pipeline as a straight line, except for the
//! two collection searches, which run concurrently:
//!
//! ```text
//!                      ┌──────────────┐
//!                      │   Question    │
//!                      └──────┬───────┘
//!                             │ trim / validate
//!                             ▼
//!                      ┌──────────────┐
//!                      │ Cache lookup  │──hit──▶ cached RagResponse
//!                      └──────┬───────┘
//!                             │ miss
//!                             ▼
//!                      ┌──────────────┐
//!                      │  Embedding    │
//!                      └──────┬───────┘
//!                             │ query vector
//!                ┌────────────┴────────────┐
//!                ▼                         ▼
//!       ┌─────────────────┐      ┌─────────────────┐
//!       │ internal search  │      │ external search  │
//!       └────────┬────────┘      └────────┬────────┘
//!                └────────────┬────────────┘
//!                             ▼
//!                  ┌─────────────────────┐
//!                  │  RRF fusion (k=60)  │
//!                  └──────────┬──────────┘
//!                             │ top-K context chunks
//!                             ▼
//!                  ┌─────────────────────┐
//!                  │  Answer generation  │
//!                  │  retry ×3, backoff  │
//!                  │  disclaimer check   │
//!                  └──────────┬──────────┘
//!                             ▼
//!                  RagResponse (+ cache write)
//! ```
//!
//! Every failure mode still produces a well-formed [`models::RagResponse`]
//! with the medical disclaimer; `error` / `metadata.error_type` distinguish
//! degraded responses. Degraded responses are never cached.
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, Qdrant, LLM and cache settings
//! - [`models`] - Shared data types: `ScoredPoint`, `FusedResult`, `RagResponse` and friends
//! - [`error`] - Tagged error taxonomy matched by the orchestrator
//! - [`fusion`] - Reciprocal Rank Fusion over the two collection rankings
//! - [`cache`] - Bounded TTL response cache with hit/miss/expired/evicted counters
//! - [`qdrant`] - Qdrant REST client (search, collection info)
//! - [`llm::embeddings`] - OpenAI embeddings client (single + batch)
//! - [`llm::generate`] - Grounded answer generation with retry and disclaimer enforcement
//! - [`pipeline`] - The `RagPipeline` orchestrator and its provider traits
//! - [`api`] - Axum HTTP handlers for query, health/readiness and cache ops
//! - [`state`] - Shared application state wiring clients into the pipeline

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fusion;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod qdrant;
pub mod state;
