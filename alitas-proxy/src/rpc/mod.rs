//! Request/response RPC over TCP.
//!
//! Both directions of the socket gateway run on this substrate. A direction
//! is just a service name plus a method table: [`RpcService`] on the server
//! side and typed wrappers around [`RpcClient::call`] on the client side.

pub mod client;
pub mod frame;
pub mod server;

pub use client::RpcClient;
pub use frame::{RpcRequest, RpcResponse};
pub use server::{RpcServer, RpcService, ServerHandle};
