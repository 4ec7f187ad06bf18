//! # Endpoint Hub
//!
//! Semantic search over a catalog of HTTP API endpoints.
//!
//! Endpoints are imported from Postman collections into a document store,
//! turned into a normalized text corpus, embedded and published as an
//! exact L2 index. Free-text queries (English or Spanish) are embedded the
//! same way and re-ranked by the HTTP verb the query implies: asking to
//! "eliminar" something pushes `DELETE` endpoints ahead of the rest.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────────┐
//! │ Postman  │──▶│  SQLite  │──▶│  Corpus  │──▶│   Trainer    │
//! │ importer │   │  store   │   │ builder  │   │ embed + L2   │
//! └──────────┘   └──────────┘   └──────────┘   └──────┬───────┘
//!                                                     │ publish
//!                                                     ▼
//!                  ┌──────────┐   ┌──────────┐   ┌──────────────┐
//!                  │ CLI/HTTP │◀──│  Query   │◀──│  Artifacts   │
//!                  │          │   │  engine  │   │ (generations)│
//!                  └──────────┘   └──────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ephub init                                   # create database
//! ephub import users.postman.json --module accounts --created-by me
//! ephub train                                  # build and publish the index
//! ephub search "eliminar usuario"
//! ephub serve                                  # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Text normalizer |
//! | [`stopwords`] | Language and domain stopword sets |
//! | [`intent`] | Verb intent resolution |
//! | [`corpus`] | Store records → corpus rows |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Exact L2 vector index |
//! | [`artifacts`] | Generation publishing and loading |
//! | [`train`] | Index trainer |
//! | [`search`] | Query engine |
//! | [`store`] | Document store backends |
//! | [`postman`] | Postman collection parsing |
//! | [`import`] / [`export`] | Collection import and item export |
//! | [`hub`] | Process-wide wiring |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod artifacts;
pub mod config;
pub mod corpus;
pub mod db;
pub mod embedding;
pub mod error;
pub mod export;
pub mod hub;
pub mod import;
pub mod index;
pub mod intent;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod postman;
pub mod search;
pub mod server;
pub mod stopwords;
pub mod store;
pub mod train;
