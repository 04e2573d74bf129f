//! # freeipa-core
//!
//! Core types and utilities for talking to a FreeIPA server over its JSON-RPC interface.
//!
//! This crate provides the shared error taxonomy, client configuration, HTTP client
//! construction and the decoders for FreeIPA's wire encodings.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and server error-code sentinels
//! - [`config`] - Configuration structures for FreeIPA clients
//! - [`client`] - HTTP client tuning and construction
//! - [`rpc`] - JSON-RPC request/response envelopes
//! - [`value`] - Decoders for array-wrapped scalars, tagged datetimes and records

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod rpc;
pub mod value;

// Re-export commonly used types
pub use error::{Error, ErrorCategory, Result, RpcError, ServerErrorKind};
pub use rpc::{Options, RpcRequest, RpcResponse, RpcResult, IPA_CLIENT_VERSION};
pub use value::{IpaDateTime, IpaRecord, Scalar};
