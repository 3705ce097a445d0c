//! Error types for declaring, synthesizing and deploying a site.

use thiserror::Error;

/// Errors surfaced while building the declaration graph or talking to AWS.
///
/// Everything except `Provider` is a declaration-time error: it is returned
/// before any template is submitted and is never retried.
#[derive(Debug, Error)]
pub enum SiteError {
    /// Invalid or missing configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Domain name that can not be used for a zone, certificate or record
    #[error("Invalid domain name {domain:?}\n{reason}")]
    InvalidDomain { domain: String, reason: String },

    /// Hosted zone lookup had no answer in the context
    #[error("Hosted zone for {domain:?} not found. Missing context key {key:?}, run the lookup command first")]
    MissingContext { domain: String, key: String },

    /// Route 53 returned no public zone matching the domain
    #[error("No public hosted zone named {0:?} exists in this account")]
    ZoneNotFound(String),

    /// Two children of the same scope share an identifier
    #[error("There is already a construct with id {0:?} in this stack")]
    DuplicateConstruct(String),

    /// Two resources share a logical id
    #[error("Duplicate logical id {0:?}")]
    DuplicateResource(String),

    /// Two outputs share an id
    #[error("Duplicate output id {0:?}")]
    DuplicateOutput(String),

    /// A resource references something that was not declared before it
    #[error("Resource {from:?} references {to:?}, which has not been declared")]
    DanglingReference { from: String, to: String },

    /// A resource failed its own property validation
    #[error("Validation failed on resource {resource:?}\n{reason}")]
    Validation { resource: String, reason: String },

    /// Problem reading the local site contents
    #[error("Asset error: {0}")]
    Asset(String),

    /// Error returned by an AWS API or reported by CloudFormation
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for site operations
pub type SiteResult<T> = Result<T, SiteError>;

impl SiteError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SiteError::Configuration(msg.into())
    }

    pub fn invalid_domain<S: Into<String>, R: Into<String>>(domain: S, reason: R) -> Self {
        SiteError::InvalidDomain { domain: domain.into(), reason: reason.into() }
    }

    /// Wraps an AWS SDK error, keeping the debug form since it carries the
    /// service error code.
    pub fn provider<E: std::fmt::Debug>(err: E) -> Self {
        SiteError::Provider(format!("{:#?}", err))
    }
}
