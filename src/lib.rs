//! Purpose: Client library for the bag storage service, plus the `bagsdk` CLI's shared code.
//! Exports: `core` (transport, errors, bodies, logging), `config`, `api` (resource surface).
//! Role: `api::BagClient` is the entry point; `core::transport::Transport` is the single HTTP choke point.
//! Invariants: Every resource call goes through one shared `Transport` per client.
pub mod api;
pub mod config;
pub mod core;
