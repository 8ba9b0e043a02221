//! Chatrelay is the client half of a resumable streaming chat backend.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`api`] defines the wire payloads, the transport error type, and the
//!   request/response control calls (content recovery, server-side cancel,
//!   search engines, direct-chat check).
//! - [`core`] owns the streaming session: the line parser, the
//!   header-then-body state machine, local cancellation, offset-based resume,
//!   the offset-aware transcript, and configuration.
//! - [`cli`] drives the library from the command line.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
