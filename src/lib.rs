//! Client-side transport and value layer for SurrealDB-compatible servers.
//!
//! One logical [`Connection`] multiplexes many concurrent remote calls over
//! a single duplex channel, correlates responses to requests, and carries a
//! rich scalar type system (arbitrary-precision decimals, high-resolution
//! timestamps, table/record references, file references) through a tagged
//! CBOR wire format.
//!
//! Concrete socket transports are external: anything implementing
//! [`Channel`] can back a connection. The crate ships an in-memory
//! [`MemoryChannel`] for tests and in-process engines.
//!
//! # Example
//!
//! ```rust,no_run
//! use surreal_driver::{CallOptions, Config, Connection, MemoryChannel, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), surreal_driver::DriverError> {
//!     // In production the channel comes from a real transport
//!     let (channel, _server_side) = MemoryChannel::pair();
//!     let conn = Connection::open(channel, Config::default());
//!
//!     let alive = conn.ping().await?;
//!     assert!(alive);
//!
//!     let result = conn
//!         .call("query", vec![Value::from("SELECT * FROM users")], CallOptions::default())
//!         .await?;
//!     println!("{}", result);
//!
//!     conn.close().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod value;

pub use connection::{
    CallOptions, Channel, Config, Connection, ConnectionStatus, IdStrategy, MemoryChannel,
};
pub use error::{DriverError, DriverResult};
pub use value::{Datetime, Decimal, Duration, File, RecordId, RecordIdKey, Table, Value};
