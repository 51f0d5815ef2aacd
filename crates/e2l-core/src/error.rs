//! Error types for the Engine2Learn bridge

use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Bridge error types
///
/// Every command-level variant is reported to the client as
/// `{status: "error", message}`; none of them stop the server.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No world is currently playing
    #[error("No playing world!")]
    NoActiveWorld,

    /// Required field missing, wrong type, or path grammar violation
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// A property's runtime type has no wire representation
    #[error("Observed property {property} has an unsupported type ({type_name})")]
    UnsupportedPropertyType { property: String, type_name: String },

    /// Screen-capture observer attached to something that cannot capture
    #[error(
        "Observer {0} has screen capture enabled, but is not a child of either a camera or a scene capture"
    )]
    UnsupportedObserverAttachment(String),

    /// `cmd` not in the recognized set
    #[error("Unknown method ({0}) to call!")]
    UnknownCommand(String),

    /// Engine collaborator reported a failure
    #[error("Engine error: {0}")]
    Engine(String),

    /// MessagePack encode/decode failure
    #[error("Codec error: {0}")]
    Codec(String),

    /// Length prefix missing, non-numeric, or out of range
    #[error("Frame length error: {0}")]
    FrameLength(String),

    /// Error response received from a bridge server
    #[error("Server error: {0}")]
    Server(String),

    /// Socket I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Shorthand for a [`BridgeError::MalformedRequest`]
    pub fn malformed(message: impl Into<String>) -> Self {
        BridgeError::MalformedRequest(message.into())
    }

    /// Whether this error should terminate the connection it occurred on
    pub fn is_transport(&self) -> bool {
        matches!(self, BridgeError::Io(_) | BridgeError::FrameLength(_))
    }
}

impl From<rmp_serde::encode::Error> for BridgeError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        BridgeError::Codec(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for BridgeError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        BridgeError::Codec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_wire_wording() {
        assert_eq!(BridgeError::NoActiveWorld.to_string(), "No playing world!");
        assert_eq!(
            BridgeError::UnknownCommand("jump".into()).to_string(),
            "Unknown method (jump) to call!"
        );
        let err = BridgeError::UnsupportedPropertyType {
            property: "Mesh".into(),
            type_name: "StaticMesh".into(),
        };
        assert!(err.to_string().contains("Mesh"));
        assert!(err.to_string().contains("StaticMesh"));
    }

    #[test]
    fn test_transport_classification() {
        let io = BridgeError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));
        assert!(io.is_transport());
        assert!(BridgeError::FrameLength("abc".into()).is_transport());
        assert!(!BridgeError::malformed("x").is_transport());
        assert!(!BridgeError::Codec("x".into()).is_transport());
    }
}
