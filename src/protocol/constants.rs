//! Host-server protocol constants.
//!
//! Port numbers, server IDs, request/reply IDs and dynamic-field code
//! points for the IBM i host servers. References: IBM host-server
//! datastream documentation, RFC 2877, JTOpen sources.

// ── Service ports ────────────────────────────────────────
/// Sign-on Verify server, plain TCP.
pub const PORT_SIGNON: u16 = 8476;
/// Sign-on Verify server, TLS.
pub const PORT_SIGNON_TLS: u16 = 9476;
/// Remote Command server, plain TCP.
pub const PORT_COMMAND: u16 = 8475;
/// Remote Command server, TLS.
pub const PORT_COMMAND_TLS: u16 = 9475;

// Remaining host-server ports. Declared for completeness; this client
// only exercises the sign-on and remote-command services.
pub const PORT_DATABASE: u16 = 8471;
pub const PORT_DATABASE_TLS: u16 = 9471;
pub const PORT_DATA_QUEUE: u16 = 8472;
pub const PORT_DATA_QUEUE_TLS: u16 = 9472;
pub const PORT_FILE: u16 = 8473;
pub const PORT_FILE_TLS: u16 = 9473;
pub const PORT_PRINT: u16 = 8474;
pub const PORT_PRINT_TLS: u16 = 9474;
pub const PORT_CENTRAL: u16 = 8470;
pub const PORT_CENTRAL_TLS: u16 = 9470;
pub const PORT_TELNET: u16 = 23;
pub const PORT_TELNET_TLS: u16 = 992;
pub const PORT_SERVICE_TOOLS: u16 = 3000;
pub const PORT_SERVER_MAPPER: u16 = 449;

// ── Server IDs ───────────────────────────────────────────
/// Sign-on Verify server ID (header bytes 2..4).
pub const SERVER_SIGNON: u16 = 0xE009;
/// Remote Command server ID.
pub const SERVER_COMMAND: u16 = 0xE008;

// ── Request/reply IDs ────────────────────────────────────
/// Remote Command seed exchange.
pub const REQREP_RC_EXCHANGE_SEEDS: u16 = 0x7001;
/// Remote Command authentication.
pub const REQREP_RC_AUTHENTICATE: u16 = 0x7002;
/// Sign-on Verify seed exchange.
pub const REQREP_SIGNON_EXCHANGE_SEEDS: u16 = 0x7003;
/// Sign-on Verify authentication.
pub const REQREP_SIGNON_AUTHENTICATE: u16 = 0x7004;
/// Remote Command attribute exchange.
pub const REQREP_RC_EXCHANGE_ATTRIBUTES: u16 = 0x1001;
/// Run a CL command.
pub const REQREP_RC_RUN_COMMAND: u16 = 0x1002;
/// Call a program.
pub const REQREP_RC_CALL_PROGRAM: u16 = 0x1003;

// ── Dynamic-field code points ────────────────────────────
/// Client/server version (u32).
pub const CP_VERSION: u16 = 0x1101;
/// Client/server datastream level (u16).
pub const CP_DATASTREAM_LEVEL: u16 = 0x1102;
/// Client/server seed (u64).
pub const CP_SEED: u16 = 0x1103;
/// User ID, 10-byte EBCDIC right-padded.
pub const CP_USER_ID: u16 = 0x1104;
/// Encrypted password bytes.
pub const CP_PASSWORD: u16 = 0x1105;
/// Client CCSID (u32).
pub const CP_CLIENT_CCSID: u16 = 0x1113;
/// Server CCSID (u32).
pub const CP_SERVER_CCSID: u16 = 0x1114;
/// Server password level (u8).
pub const CP_PASSWORD_LEVEL: u16 = 0x1119;
/// Server job name (EBCDIC, job identifier from byte 4).
pub const CP_JOB_NAME: u16 = 0x111F;
/// Request error messages on failure (u8).
pub const CP_RETURN_MESSAGES: u16 = 0x1128;

// Call-engine code points. 0x1101/0x1104 double as the EBCDIC and
// Unicode command-text fields on the remote-command service.
/// Command text, EBCDIC form.
pub const CP_COMMAND_EBCDIC: u16 = 0x1101;
/// Command text, UTF-16BE form with a leading CCSID word.
pub const CP_COMMAND_UNICODE: u16 = 0x1104;
/// Program-call parameter block.
pub const CP_PROGRAM_PARAMETER: u16 = 0x1103;

// ── Message stream formats ───────────────────────────────
/// Legacy fixed-offset message record.
pub const CP_MESSAGE_LEGACY: u16 = 0x1102;
/// Extended length-prefixed message record.
pub const CP_MESSAGE_EXTENDED: u16 = 0x1106;

// ── Framing sentinels and limits ─────────────────────────
/// Idle/keep-alive marker: four EBCDIC spaces in the length field.
pub const FRAME_IDLE_MARKER: u32 = 0x4040_4040;
/// Largest frame the client will accept (16 MB).
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;
/// Shortest valid response frame (outer length + fixed header).
pub const MIN_FRAME_LEN: usize = 20;
/// Offset of the result code in a response frame.
pub const OFFSET_RESULT: usize = 20;
/// Offset of the first dynamic field or message record.
pub const OFFSET_FIELDS: usize = 24;

/// Command result code for a warning-level completion.
pub const RC_COMMAND_WARNING: u16 = 0x0400;

/// Attribute-exchange result codes tolerated as success.
pub const RC_INFO_TOLERATED: [u16; 7] = [0x0000, 0x0100, 0x0104, 0x0105, 0x0106, 0x0107, 0x0108];

// ── Negotiated protocol values ───────────────────────────
/// Version this client reports during seed exchange.
pub const CLIENT_VERSION: u32 = 1;
/// Datastream level this client reports to the sign-on server.
pub const CLIENT_DATASTREAM_LEVEL: u16 = 2;
/// CCSID the client uses for operational text (UTF-16).
pub const CLIENT_CCSID: u32 = 1200;
/// National language version requested during attribute exchange.
pub const CLIENT_NLV: &str = "2924";
/// Default server CCSID before negotiation.
pub const DEFAULT_CCSID: u32 = 37;

/// Password proof carried in the DES form (encryption type byte).
pub const PWD_ENC_DES: u8 = 1;
/// Password proof carried in the SHA-1 form.
pub const PWD_ENC_SHA1: u8 = 3;

/// System library holding the service-program call API.
pub const QSYS: &str = "QSYS";
/// Service-program call trampoline API.
pub const QZRUCLSP: &str = "QZRUCLSP";

/// Maximum object-name length the protocol carries.
pub const MAX_NAME_LEN: usize = 10;
/// Maximum caller parameters on a service-program call.
pub const MAX_SRVPGM_PARAMETERS: usize = 7;
