//! # AutoDoc Viewer
//!
//! A client and viewer for a generated-documentation backend.
//!
//! AutoDoc Viewer fetches generated documents from the backend's
//! `/documents` API, keeps one canonical client-side state for them, and
//! renders their markdown-subset content to styled HTML. The same store
//! drives a CLI and a small HTTP viewer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Backend    │──▶│  normalize  │──▶│  DocsStore   │
//! │ /documents  │   │  (api.rs)   │   │ watch+reduce │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │
//!                        ┌───────────────────┤
//!                        ▼                   ▼
//!                   ┌──────────┐       ┌──────────┐
//!                   │   CLI    │       │   HTTP   │
//!                   │(autodoc) │       │ (viewer) │
//!                   └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! autodoc list                        # documents of the newest version
//! autodoc render my-module            # document content as HTML
//! autodoc changelog 2024-05-01T10:00:00Z
//! autodoc serve                       # start the viewer
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Canonical document types |
//! | [`normalize`] | Backend payloads to canonical types |
//! | [`api`] | Backend trait and HTTP client |
//! | [`state`] | Document state and its reducer |
//! | [`store`] | Async operations over the state |
//! | [`auth`] | Registration, sign-in, API key state |
//! | [`render`] | Markdown-subset to HTML pipeline |
//! | [`views`] | Viewer pages |
//! | [`server`] | Viewer HTTP server |
//! | [`commands`] | CLI commands |
//! | [`logging`] | Tracing setup |

pub mod api;
pub mod auth;
pub mod commands;
pub mod config;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod render;
pub mod server;
pub mod state;
pub mod store;
pub mod views;
