//! Error type shared by every fallible simulation operation.
//!
//! Structural errors raised while loading a model, body or attachment are
//! fatal to that load call. Per-item errors inside child loops (a single
//! joint or controller) are caught by the loop, logged, and the loop moves
//! on to the next sibling.

use std::panic::Location;

use thiserror::Error;

/// Errors produced by the simulation core.
#[derive(Debug, Error)]
pub enum SimError {
    /// A model with the same scoped name is already registered.
    #[error("duplicate model name [{0}]")]
    DuplicateName(String),

    /// A parameter flagged as required was absent from the config node.
    #[error("missing required parameter [{param}] in <{element}>")]
    MissingRequiredParameter {
        /// The parameter that was looked up.
        param: String,
        /// Tag of the node it was looked up on.
        element: String,
    },

    /// A parameter was present but could not be parsed as its declared type.
    #[error("invalid value [{value}] for parameter [{param}], expected {expected}")]
    InvalidParameter {
        /// Parameter name.
        param: String,
        /// Raw text that failed to parse.
        value: String,
        /// Human readable name of the declared type.
        expected: &'static str,
    },

    /// A runtime parameter update named a parameter the owner does not declare.
    #[error("unknown parameter [{0}]")]
    UnknownParameter(String),

    /// A model node tag other than `physical` or `empty`.
    #[error("invalid model type [{0}]")]
    InvalidModelType(String),

    /// A joint node tag outside the supported joint set.
    #[error("unknown joint type [{0}]")]
    UnknownJointType(String),

    /// A model already owns a joint with this name.
    #[error("can't have two joints with the same name [{0}]")]
    DuplicateJointName(String),

    /// A body needed for an attachment could not be resolved.
    #[error("missing canonical body: {0}")]
    MissingCanonicalBody(String),

    /// A controller node could not be turned into a controller.
    #[error("malformed controller config: {0}")]
    MalformedControllerConfig(String),

    /// A config node that had to be present was not.
    #[error("config node <{0}> is missing")]
    NullConfigNode(&'static str),

    /// No model with this scoped name is registered.
    #[error("unknown model [{0}]")]
    UnknownModel(String),

    /// A body reference did not resolve.
    #[error("unknown body [{0}]")]
    UnknownBody(String),

    /// Out-of-range index access. Carries the caller's source location.
    #[error("invalid {what} index [{index}] ({file}:{line})")]
    InvalidIndex {
        /// What kind of collection was indexed.
        what: &'static str,
        /// The offending index.
        index: i64,
        /// Source file of the caller.
        file: &'static str,
        /// Source line of the caller.
        line: u32,
    },

    /// The XML scene text could not be parsed.
    #[error("XML error: {0}")]
    Xml(String),

    /// The runtime configuration could not be loaded or applied.
    #[error("config error: {0}")]
    Config(String),

    /// Filesystem failure while reading or writing scenes.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// Build an [`SimError::InvalidIndex`] stamped with the caller's location.
    #[track_caller]
    pub fn invalid_index(what: &'static str, index: i64) -> Self {
        let location = Location::caller();
        SimError::InvalidIndex {
            what,
            index,
            file: location.file(),
            line: location.line(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimError>;
