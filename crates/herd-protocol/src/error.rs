//! Validation errors raised while parsing request envelopes.
//!
//! The `Display` text of each variant is exactly the `message` the
//! coordinator puts in its `status=error` reply.

use thiserror::Error;

/// A request field the coordinator may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Key,
    Value,
    Index,
    Group,
    Node,
    Module,
    Main,
    Id,
    Owner,
}

impl Field {
    /// The wire name of the field.
    pub fn wire_name(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Key => "key",
            Field::Value => "value",
            Field::Index => "index",
            Field::Group => "group",
            Field::Node => "node",
            Field::Module => "module",
            Field::Main => "main",
            Field::Id | Field::Owner => "id",
        }
    }

    fn missing_message(self) -> &'static str {
        match self {
            Field::Name => "No name specified.",
            Field::Key => "No key specified.",
            Field::Value => "No value specified.",
            Field::Index => "No index specified.",
            Field::Group => "Invalid group name.",
            Field::Node => "Invalid node address.",
            Field::Module => "No module name specified.",
            Field::Main => "No verticle main specified.",
            Field::Id => "No deployment ID specified.",
            Field::Owner => "No lock owner specified.",
        }
    }
}

/// Errors produced when an envelope cannot be turned into a command.
///
/// These are always detected before any coordinator state is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The envelope has no `action`.
    #[error("Must specify an action")]
    MissingAction,

    /// A membership verb (`find`, `list`, `select`) without a `type`.
    #[error("No type specified.")]
    MissingType,

    /// A membership verb with a `type` other than `group` or `node`.
    #[error("Invalid type specified.")]
    InvalidType(String),

    /// A data verb without a `type`.
    #[error("No data type specified.")]
    MissingDataType,

    #[error("Invalid data type {0}.")]
    InvalidDataType(String),

    #[error("No deployment type specified.")]
    MissingDeploymentType,

    #[error("Invalid deployment type.")]
    InvalidDeploymentType(String),

    /// The action is not supported by the requested data type.
    #[error("Invalid action {0}")]
    InvalidAction(String),

    /// A field the action requires is absent (or JSON null).
    #[error("{}", .0.missing_message())]
    MissingField(Field),

    /// A multimap `contains` with neither `key` nor `value`.
    #[error("No key or value specified.")]
    MissingKeyOrValue,

    #[error("Invalid instance count {0}.")]
    InvalidInstances(u64),

    /// The body could not be decoded as an envelope at all.
    #[error("Malformed envelope: {0}")]
    Malformed(String),
}
