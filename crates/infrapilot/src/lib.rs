//! # InfraPilot
//!
//! **A conversational agent that turns multi-turn chat into
//! infrastructure-as-code.**
//!
//! InfraPilot detects what the user wants to deploy, asks one question
//! per missing parameter ("slot"), and generates the infrastructure code
//! once every slot is filled.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────┐
//! │   HTTP    │──▶│ ChatService  │──▶│  Dialogue    │
//! │  /chat    │   │ (boundary)   │   │  Engine      │
//! └──────────┘   └──────┬───────┘   └──────┬──────┘
//!      ▲                │                  │
//! ┌────┴─────┐    ┌─────▼─────┐   ┌───────▼────────┐
//! │   CLI     │    │  SQLite   │   │ Gemini          │
//! │  (pilot)  │    │  store    │   │ classify + gen  │
//! └──────────┘    └───────────┘   └────────────────┘
//! ```
//!
//! ## Turn Flow
//!
//! 1. The boundary ([`chat::ChatService`]) resolves a conversation id
//!    (minting a UUID when absent) and loads state from the store.
//! 2. The dialogue engine (`infrapilot_core::engine`) advances one turn:
//!    classify on the first turn, collect one slot per later turn,
//!    generate once all slots are filled.
//! 3. The updated state is persisted and the reply returned.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |
//! | [`sqlite_store`] | SQLite-backed conversation store |
//! | [`providers`] | Gemini-backed intent classifier and code generator |
//! | [`chat`] | Request boundary shared by the HTTP server and the REPL |
//! | [`server`] | JSON HTTP server (Axum) with CORS |
//!
//! ## Configuration
//!
//! InfraPilot is configured via a TOML file (default:
//! `config/pilot.toml`). See [`config`] for all available options and
//! [`config::load_config`] for validation rules.

pub mod chat;
pub mod config;
pub mod db;
pub mod migrate;
pub mod providers;
pub mod server;
pub mod sqlite_store;

pub use chat::{ChatReply, ChatRequest, ChatService};
pub use infrapilot_core::engine::DialogueEngine;
