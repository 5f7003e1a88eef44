//! Service layer for keyfold.
//!
//! Exposes the request surface as typed async handlers on [`Server`]; the
//! outward transport (HTTP or otherwise) is a thin adapter the service knows
//! nothing about. Entities persist through the [`Storage`] trait as
//! self-describing marshaled records.
//!
//! The server holds verifiers, wrapped keys and sealed payloads only - at no
//! point does a handler see a password, a private key or a container
//! plaintext.

pub mod config;
pub mod rate_limit;
pub mod server;
pub mod storage;
pub mod types;

pub use config::ServerConfig;
pub use server::Server;
pub use storage::{BatchEntry, MemoryStorage, Storage};
