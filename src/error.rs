//! Error type shared by the compartment model, its persistence layer and the CLI.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompartmentError {
    /// Rejected constructor or edit input (non-positive lengths, empty names, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown compartment block: {0}")]
    UnknownBlock(String),

    #[error("Row {row} out of range for block {block}")]
    RowOutOfRange { block: String, row: usize },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    /// Structurally valid XML that does not describe a compartment container
    #[error("Malformed compartment XML: {0}")]
    MalformedXml(String),

    #[error("Unsupported compartment container version: {0}")]
    UnsupportedVersion(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binary encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

impl CompartmentError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CompartmentError::InvalidArgument(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        CompartmentError::MalformedXml(message.into())
    }
}

pub type Result<T> = std::result::Result<T, CompartmentError>;
