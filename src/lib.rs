//! # snaptext
//!
//! Extract text from images with a vision model and keep a searchable local
//! history of the results.
//!
//! An uploaded image is sent to an OpenAI-compatible chat completion endpoint
//! with a transcription prompt. The returned text can be saved into SQLite,
//! browsed, searched by keyword and creation date, edited, deleted, and
//! exported to CSV or XLSX.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Images  │──▶│ Extraction  │──▶│ RecordStore  │
//! │ CLI/HTTP │   │ (vision API)│   │   (SQLite)   │
//! └──────────┘   └─────────────┘   └──────┬───────┘
//!                                         │
//!                     ┌───────────────────┤
//!                     ▼                   ▼
//!                ┌──────────┐       ┌──────────┐
//!                │   CLI    │       │   HTTP   │
//!                │(snaptext)│       │  (axum)  │
//!                └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! snaptext init
//! snaptext extract receipt.png --save
//! snaptext search --keyword total --from 2024-01-01
//! snaptext export --format xlsx
//! snaptext serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment secrets |
//! | [`error`] | Typed errors per layer |
//! | [`models`] | Record and filter types |
//! | [`store`] | Record persistence (SQLite and in-memory) |
//! | [`extraction`] | Vision model client |
//! | [`batch`] | Multi-image extraction and bulk save |
//! | [`export`] | CSV and XLSX rendering |
//! | [`stats`] | Aggregate counts |
//! | [`server`] | HTTP JSON API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod extract_cmd;
pub mod extraction;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod records;
pub mod server;
pub mod stats;
pub mod store;
