//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the binlift core
///
/// Every raised condition in the system maps to one of these variants; the
/// boundary translates [`Error::code`] strings to its own responses and never
/// sees driver- or provider-specific error types.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (simple form)
    #[error("I/O error: {source}")]
    IoSimple {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// JSON parsing or serialization error
    #[error("JSON parsing error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Submission-time validation failure (bad owner, bad spec, unsupported
    /// format, oversized file). Never enqueued.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what failed validation
        message: String,
    },

    /// Resource not found error
    #[error("Not found: {resource}")]
    NotFound {
        /// The resource that was not found
        resource: String,
    },

    /// A result row exists but its blob payload has passed its TTL
    #[error("Result expired: {resource}")]
    Expired {
        /// The resource whose payload expired
        resource: String,
    },

    /// Invalid argument provided to a function
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument
        message: String,
    },

    /// Blob store read/write failure
    #[error("Storage I/O error: {message}")]
    StorageIo {
        /// Description of the storage I/O error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Structured store transaction failure
    #[error("Storage transaction error: {message}")]
    StorageTx {
        /// Description of the transaction error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The reverse-engineering engine did not answer within its timeout
    #[error("Engine timeout after {timeout_secs}s running '{command}'")]
    EngineTimeout {
        /// The command that timed out
        command: String,
        /// The timeout that elapsed
        timeout_secs: u64,
    },

    /// The reverse-engineering engine process exited abnormally
    #[error("Engine crashed: {message}")]
    EngineCrashed {
        /// Diagnostic detail (exit status, stderr tail)
        message: String,
    },

    /// Extraction produced data that fails validation (e.g. collapsed
    /// function addresses)
    #[error("Engine extraction invalid: {message}")]
    EngineExtractionInvalid {
        /// Why the extraction was rejected
        message: String,
    },

    /// Provider signalled rate limiting
    #[error("Provider '{provider}' rate limited")]
    ProviderRateLimit {
        /// The provider that rejected the call
        provider: String,
        /// Server-suggested delay before retrying, if any
        retry_after_secs: Option<u64>,
    },

    /// Provider rejected our credentials; fatal, never retried
    #[error("Provider '{provider}' authentication failed: {message}")]
    ProviderAuth {
        /// The provider that rejected the call
        provider: String,
        /// Detail from the provider
        message: String,
    },

    /// Provider rejected the request as malformed; fatal, never retried
    #[error("Provider '{provider}' rejected request: {message}")]
    ProviderBadRequest {
        /// The provider that rejected the call
        provider: String,
        /// Detail from the provider
        message: String,
    },

    /// Provider-side server error (5xx)
    #[error("Provider '{provider}' server error: {message}")]
    ProviderServerError {
        /// The provider that failed
        provider: String,
        /// Detail from the provider
        message: String,
    },

    /// Provider call exceeded its timeout
    #[error("Provider '{provider}' timed out after {timeout_secs}s")]
    ProviderTimeout {
        /// The provider that timed out
        provider: String,
        /// The timeout that elapsed
        timeout_secs: u64,
    },

    /// Circuit breaker is open for this provider; calls short-circuit
    #[error("Provider '{provider}' unavailable: circuit breaker open")]
    ProviderUnavailable {
        /// The provider whose breaker is open
        provider: String,
    },

    /// A translation call would breach the owner's daily or monthly cost
    /// ceiling
    #[error("Cost limit exceeded for '{owner}' on provider '{provider}': {message}")]
    CostLimitExceeded {
        /// The owner whose budget is exhausted
        owner: String,
        /// The provider the budget applies to
        provider: String,
        /// Which ceiling was hit and by how much
        message: String,
    },

    /// Sliding-window admission rejected the request
    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the oldest contributing bucket expires
        retry_after_secs: u64,
    },

    /// A prompt template referenced a placeholder missing from the context
    #[error("Prompt render error: {message}")]
    PromptRender {
        /// Description of the rendering failure
        message: String,
    },

    /// The operation was cancelled; a normal terminal transition, not a fault
    #[error("Cancelled: {context}")]
    Cancelled {
        /// What was cancelled
        context: String,
    },

    /// Configuration-related error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal system error; ambiguous conditions default here and are
    /// logged with their code
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

impl Error {
    /// Stable machine-readable code for the boundary.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::IoSimple { .. } => "io_error",
            Self::Json { .. } => "json_error",
            Self::Validation { .. } => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::Expired { .. } => "expired",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::StorageIo { .. } => "storage_io",
            Self::StorageTx { .. } => "storage_tx",
            Self::EngineTimeout { .. } => "engine_timeout",
            Self::EngineCrashed { .. } => "engine_crashed",
            Self::EngineExtractionInvalid { .. } => "engine_extraction_invalid",
            Self::ProviderRateLimit { .. } => "provider_rate_limit",
            Self::ProviderAuth { .. } => "provider_auth",
            Self::ProviderBadRequest { .. } => "provider_bad_request",
            Self::ProviderServerError { .. } => "provider_server_error",
            Self::ProviderTimeout { .. } => "provider_timeout",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::CostLimitExceeded { .. } => "cost_limit_exceeded",
            Self::RateLimited { .. } => "rate_limited",
            Self::PromptRender { .. } => "prompt_render_error",
            Self::Cancelled { .. } => "cancelled",
            Self::Config { .. } => "config_error",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Whether a provider call failing with this error may be retried or
    /// routed through the fallback chain. Auth and bad-request failures are
    /// fatal; everything non-provider is not a provider retry concern.
    #[must_use]
    pub fn is_retryable_provider(&self) -> bool {
        matches!(
            self,
            Self::ProviderRateLimit { .. }
                | Self::ProviderServerError { .. }
                | Self::ProviderTimeout { .. }
                | Self::ProviderUnavailable { .. }
        )
    }

    /// Whether this error counts against a provider's circuit-breaker window.
    /// Budget and admission rejections are local decisions, not provider
    /// failures.
    #[must_use]
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            Self::ProviderRateLimit { .. }
                | Self::ProviderServerError { .. }
                | Self::ProviderTimeout { .. }
                | Self::ProviderAuth { .. }
                | Self::ProviderBadRequest { .. }
        )
    }
}

// Basic error creation methods
impl Error {
    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create an expired error
    pub fn expired<S: Into<String>>(resource: S) -> Self {
        Self::Expired {
            resource: resource.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a cancellation marker
    pub fn cancelled<S: Into<String>>(context: S) -> Self {
        Self::Cancelled {
            context: context.into(),
        }
    }

    /// Create a prompt render error
    pub fn prompt_render<S: Into<String>>(message: S) -> Self {
        Self::PromptRender {
            message: message.into(),
        }
    }
}

// Storage error creation methods
impl Error {
    /// Create a blob store I/O error
    pub fn storage_io<S: Into<String>>(message: S) -> Self {
        Self::StorageIo {
            message: message.into(),
            source: None,
        }
    }

    /// Create a blob store I/O error with source
    pub fn storage_io_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::StorageIo {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a structured store transaction error
    pub fn storage_tx<S: Into<String>>(message: S) -> Self {
        Self::StorageTx {
            message: message.into(),
            source: None,
        }
    }

    /// Create a structured store transaction error with source
    pub fn storage_tx_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::StorageTx {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Configuration error creation methods
impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Provider error creation methods
impl Error {
    /// Create a provider server error
    pub fn provider_server<P: Into<String>, S: Into<String>>(provider: P, message: S) -> Self {
        Self::ProviderServerError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a provider auth error
    pub fn provider_auth<P: Into<String>, S: Into<String>>(provider: P, message: S) -> Self {
        Self::ProviderAuth {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a provider bad-request error
    pub fn provider_bad_request<P: Into<String>, S: Into<String>>(provider: P, message: S) -> Self {
        Self::ProviderBadRequest {
            provider: provider.into(),
            message: message.into(),
        }
    }
}
