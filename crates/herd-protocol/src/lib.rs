//! herd-protocol: the envelope wire protocol.
//!
//! Every interaction with a cluster coordinator is a JSON request
//! envelope answered by exactly one reply envelope. This crate owns the
//! wire shape of both and the parsing of requests into a closed,
//! typed [`Command`] enum, so the coordinator never switches on raw
//! strings.
//!
//! # quick start
//!
//! ```
//! use herd_protocol::{Command, DataKind, DataOp, Envelope, MapOp};
//! use serde_json::json;
//!
//! let env = Envelope::data(DataKind::Map, "put", "users")
//!     .key(json!("alice"))
//!     .value(json!({"age": 31}));
//!
//! match Command::from_envelope(env).unwrap() {
//!     Command::Data { name, op: DataOp::Map(MapOp::Put { .. }) } => assert_eq!(name, "users"),
//!     other => panic!("unexpected command {other:?}"),
//! }
//! ```

pub mod command;
pub mod envelope;
pub mod error;

pub use command::{
    Command, CounterOp, DataKind, DataOp, DeployRequest, KeyOp, ListOp, Listing, LockOp, Lookup,
    MapOp, MultiMapOp, QueueOp, Selection, SetOp, Target, Unit, UnitKind,
};
pub use envelope::{Envelope, Reply, Status};
pub use error::{Field, ProtocolError};
