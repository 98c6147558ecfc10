//! Error types for WeChat Pay operations.
//!
//! A single structured error enum covers every failure the client can
//! surface, from construction-time configuration problems to per-request
//! transport, verification and decoding failures.

use std::fmt;

/// Comprehensive error type for WeChat Pay operations.
#[derive(Debug)]
pub enum Error {
    /// Required configuration is missing or key material is unusable.
    InvalidConfig(String),

    /// Endpoint-level validation failed before the request was sent.
    InvalidInput {
        /// Field or parameter name
        field: String,
        /// Reason for invalidity
        reason: String,
    },

    /// The URL could not be parsed at signing time.
    BadUrl(String),

    /// Network or I/O failure from the HTTP layer.
    Transport(String),

    /// The platform answered with an HTTP status >= 300.
    Http {
        /// HTTP status code
        status: u16,
        /// Platform error code, e.g. `ORDER_NOT_EXIST`
        code: String,
        /// Platform error message
        message: String,
    },

    /// A response header is missing or malformed.
    BadHeader(String),

    /// AEAD authentication or base64 decoding of a ciphertext failed.
    BadCiphertext(String),

    /// RSA signature verification failed.
    BadSignature(String),

    /// No platform certificate is cached for the response serial,
    /// even after a refresh.
    UnknownSerial(String),

    /// The bill stream had an unexpected shape or an unparsable number.
    InvalidBill(String),

    /// Any wrapped unexpected failure from below the public surface.
    Internal(String),
}

impl Error {
    /// Create an invalid configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig(reason.into())
    }

    /// Create an invalid input error for a named field.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a bad header error.
    pub fn bad_header(reason: impl Into<String>) -> Self {
        Self::BadHeader(reason.into())
    }

    /// Create a bad ciphertext error.
    pub fn bad_ciphertext(reason: impl Into<String>) -> Self {
        Self::BadCiphertext(reason.into())
    }

    /// Create an invalid bill error.
    pub fn invalid_bill(reason: impl Into<String>) -> Self {
        Self::InvalidBill(reason.into())
    }

    /// Create an internal error from any displayable cause.
    pub fn internal(cause: impl fmt::Display) -> Self {
        Self::Internal(cause.to_string())
    }

    /// The platform error code carried by an HTTP error, if any.
    pub fn platform_code(&self) -> Option<&str> {
        match self {
            Self::Http { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Returns true if this error is potentially recoverable by retrying.
    ///
    /// The client itself never retries; callers decide.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::InvalidInput { field, reason } => write!(f, "invalid {}: {}", field, reason),
            Self::BadUrl(msg) => write!(f, "bad url: {}", msg),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::Http {
                status,
                code,
                message,
            } => {
                write!(f, "http error {}: [{}] {}", status, code, message)
            }
            Self::BadHeader(msg) => write!(f, "bad response header: {}", msg),
            Self::BadCiphertext(msg) => write!(f, "bad ciphertext: {}", msg),
            Self::BadSignature(msg) => write!(f, "bad signature: {}", msg),
            Self::UnknownSerial(serial) => {
                write!(f, "no platform certificate for serial {}", serial)
            }
            Self::InvalidBill(msg) => write!(f, "invalid bill: {}", msg),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("json: {}", err))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::BadUrl(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {}", err))
        } else if err.is_connect() {
            Self::Transport(format!("connection failed: {}", err))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

// Error codes defined by the platform, carried in `Error::Http::code`.
pub const USER_PAYING: &str = "USERPAYING";
pub const TRADE_ERROR: &str = "TRADE_ERROR";
pub const SYSTEM_ERROR: &str = "SYSTEMERROR";
pub const SIGN_ERROR: &str = "SIGN_ERROR";
pub const RULE_LIMIT: &str = "RULELIMIT";
pub const PARAM_ERROR: &str = "PARAM_ERROR";
pub const OUT_TRADE_NO_USED: &str = "OUT_TRADE_NO_USED";
pub const ORDER_NOT_EXIST: &str = "ORDERNOTEXIST";
pub const ORDER_CLOSED: &str = "ORDER_CLOSED";
pub const OPENID_MISMATCH: &str = "OPENID_MISMATCH";
pub const NOT_ENOUGH: &str = "NOTENOUGH";
pub const NO_AUTH: &str = "NOAUTH";
pub const MCH_NOT_EXISTS: &str = "MCH_NOT_EXISTS";
pub const INVALID_TRANSACTION_ID: &str = "INVALID_TRANSACTIONID";
pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
pub const FREQUENCY_LIMITED: &str = "FREQUENCY_LIMITED";
pub const BANK_ERROR: &str = "BANKERROR";
pub const APPID_MCHID_NOT_MATCH: &str = "APPID_MCHID_NOT_MATCH";
pub const ACCOUNT_ERROR: &str = "ACCOUNTERROR";
