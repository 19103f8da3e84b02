//! # Alitas Core - Application Gateway Contracts
//!
//! Types and traits shared by the Alitas consensus engine and the
//! applications it orders transactions for.
//!
//! ## Components
//!
//! - **ProxyHandler**: callbacks an application implements to receive
//!   committed blocks and serve snapshots
//! - **AppGateway**: the engine's view of the application, implemented by
//!   every transport
//! - **Block / CommitResponse / LifecycleState**: values crossing the boundary
//! - **Submit queue**: FIFO hand-off of submitted transactions to the engine
//! - **Root**: serialisable base of a participant's event history
//! - **GatewayConfig**: addresses, timeouts and limits for socket transports
//! - **GatewayError**: error type for all of the above
//!
//! Transports live in the `alitas-proxy` crate.

pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod handler;
pub mod queue;
pub mod root;
pub mod types;

pub use config::*;
pub use encoding::{Base64Bytes, Base64Slice};
pub use error::*;
pub use handler::*;
pub use queue::{submit_queue, SubmitReceiver, SubmitSender};
pub use root::*;
pub use types::*;

/// Version of the gateway crates.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
