//! # Error Handling
//!
//! Error types for Umbra Vault.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR CATEGORIES                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  100-199  Lifecycle       Store not started / started twice             │
//! │  200-299  Configuration   Bad key length, unknown collection or channel │
//! │  300-399  Crypto          Encryption or key derivation failures         │
//! │  400-499  Documents       Reserved field, $inc type guard, size limit   │
//! │  500-599  Cache           Push hooks used without live sync             │
//! │  600-699  Transport       Remote channel failures                       │
//! │  900-999  Internal        Serialization                                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## What is NOT an error
//!
//! A message that cannot be decoded into a document (foreign payload,
//! malformed envelope, wrong key, failed authentication tag) is never
//! reported through this type. Reads treat such messages as absent data so
//! a single corrupted message cannot break a scan over a whole collection.

use thiserror::Error;

/// Result type alias for Umbra Vault operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Umbra Vault
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Lifecycle Errors (100-199)
    // ========================================================================
    /// A collection was used before its store finished starting
    #[error("Store has not been started. Call Store::start() first.")]
    NotReady,

    /// `Store::start()` was called twice
    #[error("Store has already been started.")]
    AlreadyStarted,

    // ========================================================================
    // Configuration Errors (200-299)
    // ========================================================================
    /// The store configuration is inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No collection with this name is configured
    #[error("Collection {0} not found")]
    CollectionNotFound(String),

    /// No collection is routed to this channel id
    #[error("Collection with channel id {0} not found")]
    ChannelNotRouted(String),

    // ========================================================================
    // Crypto Errors (300-399)
    // ========================================================================
    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Invalid key format or length
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Passphrase key derivation failed
    #[error("Failed to derive key: {0}")]
    KeyDerivationFailed(String),

    // ========================================================================
    // Document Errors (400-499)
    // ========================================================================
    /// An update operator targeted the `id` field
    #[error("Cannot update reserved field \"{0}\"")]
    ReservedField(String),

    /// `$inc` hit a present, non-numeric value
    #[error("Cannot $inc non-number field \"{0}\"")]
    NotNumeric(String),

    /// Data is not a JSON object, or a filter pattern is malformed
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// The encrypted payload exceeds the configured message size
    #[error("Message too large ({length} > {max})")]
    ContentTooLarge {
        /// Length of the encoded message content
        length: usize,
        /// Configured maximum
        max: usize,
    },

    // ========================================================================
    // Cache Errors (500-599)
    // ========================================================================
    /// A cache hook was invoked on a collection that is not caching
    #[error("Cache mode is not enabled for collection {0}")]
    CacheDisabled(String),

    /// Push-feed events were delivered to a store without live sync
    #[error("Live sync is not enabled")]
    LiveSyncDisabled,

    // ========================================================================
    // Transport Errors (600-699)
    // ========================================================================
    /// The remote channel call failed
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The remote channel has no message with this id
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================
    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Lifecycle
    /// - 200-299: Configuration
    /// - 300-399: Crypto
    /// - 400-499: Documents
    /// - 500-599: Cache
    /// - 600-699: Transport
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Lifecycle (100-199)
            Error::NotReady => 100,
            Error::AlreadyStarted => 101,

            // Configuration (200-299)
            Error::InvalidConfig(_) => 200,
            Error::CollectionNotFound(_) => 201,
            Error::ChannelNotRouted(_) => 202,

            // Crypto (300-399)
            Error::EncryptionFailed(_) => 300,
            Error::InvalidKey(_) => 301,
            Error::KeyDerivationFailed(_) => 302,

            // Documents (400-499)
            Error::ReservedField(_) => 400,
            Error::NotNumeric(_) => 401,
            Error::InvalidDocument(_) => 402,
            Error::ContentTooLarge { .. } => 403,

            // Cache (500-599)
            Error::CacheDisabled(_) => 500,
            Error::LiveSyncDisabled => 501,

            // Transport (600-699)
            Error::TransportError(_) => 600,
            Error::MessageNotFound(_) => 601,

            // Internal (900-999)
            Error::SerializationError(_) => 900,
            Error::DeserializationError(_) => 901,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors can potentially be resolved by retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TransportError(_) | Error::NotReady)
    }

    /// Check if this error is a caller bug rather than environmental noise
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::ReservedField(_) | Error::NotNumeric(_) | Error::InvalidDocument(_)
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::NotReady.code(), 100);
        assert_eq!(Error::InvalidConfig("test".into()).code(), 200);
        assert_eq!(Error::EncryptionFailed("test".into()).code(), 300);
        assert_eq!(Error::ReservedField("id".into()).code(), 400);
        assert_eq!(Error::CacheDisabled("users".into()).code(), 500);
        assert_eq!(Error::TransportError("test".into()).code(), 600);
        assert_eq!(Error::SerializationError("test".into()).code(), 900);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::TransportError("timeout".into()).is_recoverable());
        assert!(!Error::ReservedField("id".into()).is_recoverable());
        assert!(!Error::InvalidKey("short".into()).is_recoverable());
    }

    #[test]
    fn test_contract_violations() {
        assert!(Error::NotNumeric("coins".into()).is_contract_violation());
        assert!(Error::ReservedField("id.x".into()).is_contract_violation());
        assert!(!Error::TransportError("down".into()).is_contract_violation());
    }

    #[test]
    fn test_messages_name_the_field() {
        let err = Error::ReservedField("id".into());
        assert_eq!(err.to_string(), "Cannot update reserved field \"id\"");

        let err = Error::ContentTooLarge {
            length: 2100,
            max: 2000,
        };
        assert_eq!(err.to_string(), "Message too large (2100 > 2000)");
    }
}
