//! Transports for the Alitas application gateway.
//!
//! - [`InmemProxy`]: engine and application in one process, direct calls.
//! - [`SocketGateway`] / [`SocketAppProxy`]: the engine and application ends
//!   of a TCP deployment, built on the [`rpc`] substrate with one service per
//!   direction ([`submission`] and [`delivery`]).

pub mod delivery;
pub mod inmem;
pub mod rpc;
pub mod socket;
pub mod submission;

pub use delivery::{DeliveryClient, StateService};
pub use inmem::InmemProxy;
pub use socket::{SocketAppProxy, SocketGateway};
pub use submission::{SubmitClient, SubmitService};
