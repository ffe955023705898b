//! Gateway between external clients and the bus
//!
//! Each accepted connection gets its own adapter: inbound newline-delimited
//! JSON messages are validated, stamped and published; envelopes from the
//! configured outbound topics are pushed back to the client. Subscriptions
//! are connection-scoped and removed on disconnect.

pub mod config;
pub mod connection;
pub mod server;

pub use config::GatewayConfig;
pub use connection::{Connection, ConnectionState};
pub use server::GatewayServer;
