//! Error types for the host-server client.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the host-server client.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid caller-supplied parameter (name too long, too many
    /// service-program parameters, bad configuration value). Raised
    /// before any I/O happens.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation requires an established session.
    #[error("Client is not connected")]
    NotConnected,

    /// I/O errors on either channel.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS setup or handshake errors.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Connection could not be established.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Malformed frame: short response, bad dynamic field, bad message
    /// length. Fatal for the session.
    #[error("Framing error: {0}")]
    Framing(String),

    /// The server rejected the sign-on or remote-command authentication.
    #[error("Authentication failed: {0}")]
    Authentication(AuthFailure),

    /// The attribute-exchange reply carried a result code outside the
    /// tolerated set.
    #[error("Server attribute exchange failed with code 0x{0:04X}")]
    ServerInfo(u16),

    /// Text could not be translated under the requested CCSID.
    #[error("Unsupported CCSID {0}")]
    UnsupportedCcsid(u32),

    /// Protocol violation that fits no more specific category.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation timed out.
    #[error("Operation timed out")]
    Timeout,
}

impl Error {
    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new framing error.
    pub fn framing<S: Into<String>>(msg: S) -> Self {
        Self::Framing(msg.into())
    }

    /// Create a new protocol error.
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Self::Protocol(msg.into())
    }

    /// Whether this error forces the session back to the closed state.
    ///
    /// Configuration and translation errors leave the session usable;
    /// everything touching the wire does not.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Config(_) | Self::UnsupportedCcsid(_))
    }
}

/// Convert from anyhow::Error for convenience (config loading paths).
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Decoded authentication failure from a handshake reply.
///
/// The remote-command server reports failures through a 32-bit result
/// code; specific codes name the exact condition and the upper 16 bits
/// classify the rest. The sign-on server reuses the same code space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// Upper half 0x0001: the request itself was malformed.
    RequestDataError,
    /// Upper half 0x0004: general security failure.
    SecurityFailure,
    /// Upper half 0x0006: authentication-token error.
    TokenError,
    /// 0x0002_0001: the user profile does not exist.
    UnknownUser,
    /// 0x0002_0002: the user profile is disabled.
    UserLocked,
    /// 0x0002_0003: user received does not match the current session.
    UserMismatch,
    /// 0x0003_000B: password is wrong.
    BadPassword,
    /// 0x0003_000C: password is wrong and the next failure revokes the
    /// profile.
    BadPasswordNextRevokes,
    /// 0x0003_000D: password has expired.
    PasswordExpired,
    /// 0x0003_000E: the stored password uses pre-V2R2 encryption.
    PreV2R2Password,
    /// 0x0003_0010: the profile's password is *NONE.
    PasswordNone,
    /// Anything the table above does not name.
    Other(u32),
}

impl AuthFailure {
    /// Map a non-zero handshake result code onto the failure taxonomy.
    pub fn from_code(code: u32) -> Self {
        match code {
            0x0002_0001 => Self::UnknownUser,
            0x0002_0002 => Self::UserLocked,
            0x0002_0003 => Self::UserMismatch,
            0x0003_000B => Self::BadPassword,
            0x0003_000C => Self::BadPasswordNextRevokes,
            0x0003_000D => Self::PasswordExpired,
            0x0003_000E => Self::PreV2R2Password,
            0x0003_0010 => Self::PasswordNone,
            _ => match code >> 16 {
                0x0001 => Self::RequestDataError,
                0x0004 => Self::SecurityFailure,
                0x0006 => Self::TokenError,
                _ => Self::Other(code),
            },
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestDataError => write!(f, "request data error"),
            Self::SecurityFailure => write!(f, "general security failure"),
            Self::TokenError => write!(f, "authentication token error"),
            Self::UnknownUser => write!(f, "unknown user"),
            Self::UserLocked => write!(f, "user profile is disabled"),
            Self::UserMismatch => write!(f, "user does not match session"),
            Self::BadPassword => write!(f, "incorrect password"),
            Self::BadPasswordNextRevokes => {
                write!(f, "incorrect password, next failure disables the profile")
            }
            Self::PasswordExpired => write!(f, "password expired"),
            Self::PreV2R2Password => write!(f, "password uses pre-V2R2 encryption"),
            Self::PasswordNone => write!(f, "password is *NONE"),
            Self::Other(code) => write!(f, "server result code 0x{code:08X}"),
        }
    }
}
