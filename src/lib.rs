//! IBM i host-server client library.
//!
//! Speaks the framed binary protocol of the IBM i (AS/400) host
//! servers over TCP or TLS: sign-on verification with seeded password
//! proofs (DES per RFC 2877 §5, or SHA-1), CL command execution, and
//! program / service-program calls with typed parameters across the
//! ASCII/EBCDIC boundary.
//!
//! ```no_run
//! use ibmi_hostsrv::{CallMessages, ClientConfig, Session};
//!
//! # async fn run() -> ibmi_hostsrv::Result<()> {
//! let config = ClientConfig::new("ibmi.example.com", "QUSER", "secret");
//! let mut session = Session::new(config);
//! session.connect().await?;
//!
//! let mut messages = CallMessages::new();
//! let code = session.call_command("CRTLIB LIB(DEMO)", &mut messages).await?;
//! for message in &messages {
//!     println!("{}: {}", message.id, message.text);
//! }
//! # assert_eq!(code, 0);
//! session.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod codec;
mod command;
pub mod config;
pub mod crypto;
pub mod error;
pub mod messages;
pub mod params;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-export main types
pub use config::ClientConfig;
pub use error::{AuthFailure, Error, Result};
pub use messages::{CallMessage, CallMessages};
pub use params::{
    ParameterType, ProgramCallParameter, ProgramCallParameters, ReturnFormat,
    ServiceProgramCallParameter, ServiceProgramCallParameters, ServiceProgramPassBy,
};
pub use session::{ServerAttributes, Session, SessionState};
pub use transport::TlsPolicy;
