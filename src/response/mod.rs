//! The external reply generator: notes in, notes out.
//!
//! This module provides:
//! * [`ResponseService`]: async trait implemented by every backend.
//! * [`HttpResponseService`]: REST client for the note-generation service.
//! * [`ResponseError`]: transport, status, parse and validation failures.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use jam_session::config::AppConfig;
//! use jam_session::midi::NoteList;
//! use jam_session::response::{HttpResponseService, ResponseService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let service = HttpResponseService::from_config(&config.response);
//!
//!     if service.health().await.is_ok() {
//!         let reply = service.respond(120, &NoteList::new()).await;
//!         println!("{reply:?}");
//!     }
//! }
//! ```

pub mod client;
pub mod wire;

pub use client::{HttpResponseService, ResponseError, ResponseService};
pub use wire::{ResponseBody, ResponseRequest, WireNote};
