//! Tool bridge kernel.
//!
//! This crate wires the catalog, transports, variables, and post-processing
//! into the operations a host exposes: manual registration, search, direct
//! tool calls, and script execution over the whole catalog.

#![warn(missing_docs, clippy::pedantic)]

mod chain;
mod client;
mod invoker;
pub mod namespace;
mod operations;
mod registrar;

#[cfg(test)]
mod testing;

pub use chain::{CodeExecutionBridge, ExecutionOutput, ExecutionRequest, TRUNCATION_MARKER};
pub use client::{BridgeClient, BridgeClientBuilder, LazyBridge};
pub use invoker::DirectInvoker;
pub use operations::{HostOperations, HostRequest};
pub use registrar::ManualRegistrar;
