//! Session establishment and channel ownership.
//!
//! A session owns one socket per service: Sign-on Verify and Remote
//! Command. Each channel runs its own seed exchange and authentication;
//! the Remote Command channel additionally exchanges attributes. The
//! protocol carries no correlation identifiers, so a session must be
//! driven from a single owner and never pipelined — `&mut self` on
//! every operation enforces exactly that.

use bytes::Bytes;
use tracing::{debug, info};

use crate::codec;
use crate::codec::ebcdic::{encode_name, CP037};
use crate::config::ClientConfig;
use crate::crypto::{self, PasswordCipher};
use crate::error::{AuthFailure, Error, Result};
use crate::protocol::constants::*;
use crate::protocol::{find, parse_fields, write_attribute_header, write_field, write_header, DataStream};
use crate::transport::HostChannel;

/// Parameters negotiated during the handshakes.
#[derive(Debug, Clone)]
pub struct ServerAttributes {
    /// Server version from the seed exchange.
    pub version: u32,
    /// Server level; gates the return-error-messages field.
    pub level: u16,
    /// Server CCSID for EBCDIC text.
    pub ccsid: u32,
    /// National language version, e.g. "2924".
    pub nlv: String,
    /// Datastream level; gates Unicode command text and NULL parameters.
    pub datastream_level: u16,
    /// Password level; selects the proof construction.
    pub password_level: u8,
    /// Server job servicing this session.
    pub job_name: String,
}

impl Default for ServerAttributes {
    fn default() -> Self {
        Self {
            version: 0,
            level: 0,
            ccsid: DEFAULT_CCSID,
            nlv: CLIENT_NLV.to_string(),
            datastream_level: 0,
            password_level: 0,
            job_name: String::new(),
        }
    }
}

/// Session states. Transitions flow strictly downward through the
/// handshake steps; any fatal error tears both channels down and
/// returns to Closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No channel connected.
    Closed,
    /// Sign-on channel open, seeds exchanged.
    SignonConnected,
    /// Sign-on authentication accepted.
    SignonAuthed,
    /// Remote Command channel open, seeds exchanged.
    RcConnected,
    /// Remote Command authentication accepted.
    RcAuthed,
    /// Attribute exchange done; calls are permitted.
    Ready,
}

impl SessionState {
    /// Whether calls are permitted.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// One authenticated host-server session.
///
/// Dropping a session closes both sockets; `disconnect` is the graceful
/// path and is idempotent.
pub struct Session {
    pub(crate) config: ClientConfig,
    pub(crate) state: SessionState,
    pub(crate) signon: Option<HostChannel>,
    pub(crate) command: Option<HostChannel>,
    pub(crate) attributes: ServerAttributes,
    pub(crate) client_seed: u64,
    pub(crate) server_seed: u64,
}

impl Session {
    /// Create a disconnected session over the given configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            state: SessionState::Closed,
            signon: None,
            command: None,
            attributes: ServerAttributes::default(),
            client_seed: 0,
            server_seed: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Negotiated server attributes. Defaults before `connect`.
    pub fn attributes(&self) -> &ServerAttributes {
        &self.attributes
    }

    /// Server job name, empty until authenticated.
    pub fn job_name(&self) -> &str {
        &self.attributes.job_name
    }

    /// Configured temporary library.
    pub fn temporary_library(&self) -> &str {
        &self.config.temporary_library
    }

    /// Establish both channels and authenticate.
    ///
    /// Runs sign-on seed exchange, sign-on authentication, remote-command
    /// seed exchange, remote-command authentication and the attribute
    /// exchange, in that order. Idempotent once Ready. Any failure
    /// closes both channels.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state.is_ready() {
            return Ok(());
        }
        self.config.validate().map_err(Error::from)?;

        match self.establish().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.teardown().await;
                Err(e)
            }
        }
    }

    async fn establish(&mut self) -> Result<()> {
        self.connect_signon().await?;
        self.authenticate_signon().await?;
        self.connect_remote_command().await?;
        self.authenticate_remote_command().await?;
        self.retrieve_server_information().await?;
        self.state = SessionState::Ready;
        info!(
            job = %self.attributes.job_name,
            ccsid = self.attributes.ccsid,
            datastream_level = self.attributes.datastream_level,
            "session ready"
        );
        Ok(())
    }

    /// Close both channels and forget the negotiated job.
    ///
    /// A second disconnect is a no-op.
    pub async fn disconnect(&mut self) {
        self.teardown().await;
        self.attributes.job_name.clear();
    }

    pub(crate) async fn teardown(&mut self) {
        if let Some(mut ch) = self.signon.take() {
            ch.disconnect().await;
        }
        if let Some(mut ch) = self.command.take() {
            ch.disconnect().await;
        }
        self.state = SessionState::Closed;
    }

    // ── Sign-on Verify channel ───────────────────────────

    /// Open the sign-on channel and exchange seeds.
    async fn connect_signon(&mut self) -> Result<()> {
        let mut channel = HostChannel::connect(
            &self.config.host,
            self.config.signon_port(),
            self.config.tls_policy(),
            self.config.connect_timeout(),
            self.config.read_timeout(),
        )
        .await?;

        self.client_seed = crypto::generate_client_seed();
        self.server_seed = 0;

        let mut ds = DataStream::with_capacity(64);
        write_header(&mut ds, SERVER_SIGNON, 0, REQREP_SIGNON_EXCHANGE_SEEDS);
        write_field(&mut ds, CP_VERSION, &CLIENT_VERSION.to_be_bytes());
        write_field(&mut ds, CP_DATASTREAM_LEVEL, &CLIENT_DATASTREAM_LEVEL.to_be_bytes());
        write_field(&mut ds, CP_SEED, &self.client_seed.to_be_bytes());
        channel.write_frame(&ds.into_vec()).await?;

        let frame = read_reply(&mut channel).await?;
        let rc = codec::read_u32(&frame, OFFSET_RESULT);
        if rc != 0 {
            return Err(Error::Authentication(AuthFailure::from_code(rc)));
        }

        let fields = parse_fields(&frame, OFFSET_FIELDS)?;
        if let Some(f) = find(&fields, CP_VERSION) {
            self.attributes.version = codec::read_u32(&f.data, 0);
        }
        if let Some(f) = find(&fields, CP_DATASTREAM_LEVEL) {
            self.attributes.level = codec::read_u16(&f.data, 0);
        }
        if let Some(f) = find(&fields, CP_SEED) {
            self.server_seed = codec::read_u64(&f.data, 0);
        }
        if let Some(f) = find(&fields, CP_PASSWORD_LEVEL) {
            self.attributes.password_level = codec::read_be(&f.data, 0, 1) as u8;
        }
        if let Some(f) = find(&fields, CP_JOB_NAME) {
            self.attributes.job_name = decode_job_name(&f.data);
        }

        debug!(
            version = self.attributes.version,
            level = self.attributes.level,
            password_level = self.attributes.password_level,
            "sign-on seeds exchanged"
        );
        self.signon = Some(channel);
        self.state = SessionState::SignonConnected;
        Ok(())
    }

    /// Prove the password on the sign-on channel.
    async fn authenticate_signon(&mut self) -> Result<()> {
        let cipher = PasswordCipher::for_level(self.attributes.password_level);
        let proof = crypto::encrypt_password(
            &self.config.user,
            &self.config.password,
            self.server_seed,
            self.client_seed,
            cipher,
        )?;

        let mut ds = DataStream::with_capacity(96);
        write_header(&mut ds, SERVER_SIGNON, 1, REQREP_SIGNON_AUTHENTICATE);
        ds.write_u8(cipher.encryption_type());
        write_field(&mut ds, CP_CLIENT_CCSID, &CLIENT_CCSID.to_be_bytes());
        write_field(&mut ds, CP_PASSWORD, &proof);
        write_field(&mut ds, CP_USER_ID, &encode_name(&self.config.user, 10, &CP037));
        if self.attributes.level >= 5 {
            write_field(&mut ds, CP_RETURN_MESSAGES, &[1]);
        }

        let channel = self.signon.as_mut().ok_or(Error::NotConnected)?;
        channel.write_frame(&ds.into_vec()).await?;

        let frame = read_reply(channel).await?;
        let rc = codec::read_u32(&frame, OFFSET_RESULT);
        if rc != 0 {
            return Err(Error::Authentication(AuthFailure::from_code(rc)));
        }

        if frame.len() > OFFSET_FIELDS {
            let fields = parse_fields(&frame, OFFSET_FIELDS)?;
            if let Some(f) = find(&fields, CP_SERVER_CCSID) {
                self.attributes.ccsid = codec::read_u32(&f.data, 0);
            }
        }

        debug!(user = %self.config.user, "sign-on verified");
        self.state = SessionState::SignonAuthed;
        Ok(())
    }

    // ── Remote Command channel ───────────────────────────

    /// Open the remote-command channel and exchange seeds.
    ///
    /// Client attribute 1 declares SHA-1 capability.
    async fn connect_remote_command(&mut self) -> Result<()> {
        let mut channel = HostChannel::connect(
            &self.config.host,
            self.config.command_port(),
            self.config.tls_policy(),
            self.config.connect_timeout(),
            self.config.read_timeout(),
        )
        .await?;

        self.client_seed = crypto::generate_client_seed();
        self.server_seed = 0;

        let mut ds = DataStream::with_capacity(24);
        write_attribute_header(&mut ds, 1, 0, 8, REQREP_RC_EXCHANGE_SEEDS);
        ds.write_u64(self.client_seed);
        channel.write_frame(&ds.into_vec()).await?;

        let frame = read_reply(&mut channel).await?;
        let rc = codec::read_u32(&frame, OFFSET_RESULT);
        if rc != 0 {
            return Err(Error::Authentication(AuthFailure::from_code(rc)));
        }
        self.server_seed = codec::read_u64(&frame, OFFSET_FIELDS);

        debug!("remote-command seeds exchanged");
        self.command = Some(channel);
        self.state = SessionState::RcConnected;
        Ok(())
    }

    /// Prove the password on the remote-command channel.
    ///
    /// Client attribute 2 asks the server to report its job.
    async fn authenticate_remote_command(&mut self) -> Result<()> {
        let cipher = PasswordCipher::for_level(self.attributes.password_level);
        let proof = crypto::encrypt_password(
            &self.config.user,
            &self.config.password,
            self.server_seed,
            self.client_seed,
            cipher,
        )?;

        let mut ds = DataStream::with_capacity(96);
        write_attribute_header(&mut ds, 2, 0, 2, REQREP_RC_AUTHENTICATE);
        ds.write_u8(cipher.encryption_type());
        ds.write_u8(1); // send reply
        write_field(&mut ds, CP_PASSWORD, &proof);
        write_field(&mut ds, CP_USER_ID, &encode_name(&self.config.user, 10, &CP037));

        let channel = self.command.as_mut().ok_or(Error::NotConnected)?;
        channel.write_frame(&ds.into_vec()).await?;

        let frame = read_reply(channel).await?;
        let rc = codec::read_u32(&frame, OFFSET_RESULT);
        if rc != 0 {
            return Err(Error::Authentication(AuthFailure::from_code(rc)));
        }

        if frame.len() > OFFSET_FIELDS {
            let fields = parse_fields(&frame, OFFSET_FIELDS)?;
            if let Some(f) = find(&fields, CP_JOB_NAME) {
                self.attributes.job_name = decode_job_name(&f.data);
            }
        }

        debug!(job = %self.attributes.job_name, "remote command authenticated");
        self.state = SessionState::RcAuthed;
        Ok(())
    }

    /// Exchange attributes on the remote-command channel.
    async fn retrieve_server_information(&mut self) -> Result<()> {
        let mut ds = DataStream::with_capacity(32);
        write_header(&mut ds, SERVER_COMMAND, 14, REQREP_RC_EXCHANGE_ATTRIBUTES);
        ds.write_u32(CLIENT_CCSID);
        ds.write_bytes(&CP037.encode(CLIENT_NLV));
        ds.write_u32(CLIENT_VERSION);
        ds.write_u16(0); // client datastream level

        let channel = self.command.as_mut().ok_or(Error::NotConnected)?;
        channel.write_frame(&ds.into_vec()).await?;

        let frame = read_reply(channel).await?;
        let rc = codec::read_u16(&frame, OFFSET_RESULT);
        if !RC_INFO_TOLERATED.contains(&rc) {
            return Err(Error::ServerInfo(rc));
        }

        self.attributes.ccsid = codec::read_u32(&frame, 22);
        if let Some(nlv) = frame.get(26..30) {
            self.attributes.nlv = CP037.decode(nlv);
        }
        self.attributes.datastream_level = codec::read_u16(&frame, 34);

        debug!(
            ccsid = self.attributes.ccsid,
            nlv = %self.attributes.nlv,
            datastream_level = self.attributes.datastream_level,
            "server attributes retrieved"
        );
        Ok(())
    }

    /// Send one request on the remote-command channel and read the
    /// reply. Requires Ready.
    pub(crate) async fn transact_command(&mut self, payload: Vec<u8>) -> Result<Bytes> {
        if !self.state.is_ready() {
            return Err(Error::NotConnected);
        }
        let channel = self.command.as_mut().ok_or(Error::NotConnected)?;
        channel.write_frame(&payload).await?;
        read_reply(channel).await
    }

    /// Tear the session down if the error is fatal, then hand it back.
    pub(crate) async fn fail(&mut self, error: Error) -> Error {
        if error.is_fatal() {
            self.teardown().await;
        }
        error
    }
}

/// Read one reply frame and reject anything shorter than the fixed
/// header. The idle marker (empty read) is equally malformed here: no
/// handshake or call ends without a reply.
async fn read_reply(channel: &mut HostChannel) -> Result<Bytes> {
    let frame = channel.read_frame().await?;
    if frame.len() < MIN_FRAME_LEN {
        return Err(Error::framing(format!(
            "reply frame of {} bytes is shorter than the {MIN_FRAME_LEN}-byte header",
            frame.len()
        )));
    }
    Ok(frame)
}

/// Job names arrive EBCDIC with a 4-byte prefix before the readable
/// identifier.
fn decode_job_name(data: &[u8]) -> String {
    CP037.decode(data.get(4..).unwrap_or_default()).trim_end().to_string()
}
