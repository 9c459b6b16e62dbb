//! TCP/TLS channel transport with the outer length frame.
//!
//! Each host-server channel is one TCP connection, optionally wrapped
//! in TLS. Above the socket the transport is untyped: framed byte push
//! and pull. Every outbound payload gains a 4-byte big-endian length
//! prefix that counts itself; every inbound datagram is read length
//! first, then body.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use rustls::pki_types::ServerName;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

use crate::codec;
use crate::error::{Error, Result};
use crate::protocol::constants::{FRAME_IDLE_MARKER, MAX_FRAME_LEN};

/// Connection type (either plain TCP or TLS).
pub enum Connection {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Connection {
    async fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        match self {
            Self::Plain(stream) => stream.read_exact(buf).await.map(|_| ()),
            Self::Tls(stream) => stream.read_exact(buf).await.map(|_| ()),
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Plain(stream) => stream.write_all(buf).await,
            Self::Tls(stream) => stream.write_all(buf).await,
        }
    }

    async fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(stream) => stream.flush().await,
            Self::Tls(stream) => stream.flush().await,
        }
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(stream) => stream.shutdown().await,
            Self::Tls(stream) => stream.shutdown().await,
        }
    }
}

/// TLS policy for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsPolicy {
    /// No TLS, plain TCP.
    Off,
    /// TLS with certificate validation against the webpki roots.
    Strict,
    /// TLS accepting any certificate the server presents.
    AcceptAll,
}

/// One framed host-server channel.
pub struct HostChannel {
    connection: Connection,
    read_timeout: Option<Duration>,
}

impl HostChannel {
    /// Open a channel to `host:port` under the given TLS policy.
    pub async fn connect(
        host: &str,
        port: u16,
        tls: TlsPolicy,
        connect_timeout: Duration,
        read_timeout: Option<Duration>,
    ) -> Result<Self> {
        let addr = Self::resolve_address(host, port).await?;
        debug!("Connecting to {host} ({addr})");

        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(Error::Io)?;
        stream.set_nodelay(true)?;

        let connection = match tls {
            TlsPolicy::Off => Connection::Plain(stream),
            _ => Connection::Tls(Box::new(Self::wrap_tls(stream, host, tls).await?)),
        };

        Ok(Self {
            connection,
            read_timeout,
        })
    }

    /// Send one payload with the outer length prefix.
    ///
    /// The prefix value counts itself: `payload.len() + 4`.
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        let mut frame = BytesMut::with_capacity(payload.len() + 4);
        frame.extend_from_slice(&codec::be_u32(payload.len() as u32 + 4));
        frame.extend_from_slice(payload);
        self.connection.write_all(&frame).await?;
        self.connection.flush().await?;
        Ok(())
    }

    /// Receive one datagram.
    ///
    /// Returns the length prefix and body as a single buffer, so parsers
    /// see the length field at offset 0. A length of zero or of four
    /// EBCDIC spaces is the server's idle marker and yields an empty
    /// buffer.
    pub async fn read_frame(&mut self) -> Result<Bytes> {
        let mut prefix = [0u8; 4];
        self.read_with_timeout(&mut prefix).await?;

        let declared = codec::read_u32(&prefix, 0);
        if declared == 0 || declared == FRAME_IDLE_MARKER {
            return Ok(Bytes::new());
        }
        if declared < 4 {
            return Err(Error::framing(format!(
                "frame length {declared} below the 4-byte prefix"
            )));
        }
        if declared as usize > MAX_FRAME_LEN {
            return Err(Error::framing(format!(
                "frame length {declared} exceeds the {MAX_FRAME_LEN}-byte limit"
            )));
        }

        let mut frame = BytesMut::with_capacity(declared as usize);
        frame.extend_from_slice(&prefix);
        frame.resize(declared as usize, 0);
        self.read_with_timeout(&mut frame[4..]).await?;
        Ok(frame.freeze())
    }

    async fn read_with_timeout(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.read_timeout {
            Some(limit) => timeout(limit, self.connection.read_exact(buf))
                .await
                .map_err(|_| Error::Timeout)?
                .map_err(Error::Io),
            None => self.connection.read_exact(buf).await.map_err(Error::Io),
        }
    }

    /// Close the channel. Idempotent: shutdown failures on an already
    /// dead socket are ignored.
    pub async fn disconnect(&mut self) {
        let _ = self.connection.shutdown().await;
    }

    async fn resolve_address(host: &str, port: u16) -> Result<SocketAddr> {
        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, port));
        }

        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(format!("{host}:{port}"))
            .await
            .map_err(|e| Error::ConnectionFailed(format!("DNS lookup for {host} failed: {e}")))?
            .collect();

        addrs
            .into_iter()
            .next()
            .ok_or_else(|| Error::ConnectionFailed(format!("no addresses found for {host}")))
    }

    async fn wrap_tls(
        stream: TcpStream,
        host: &str,
        policy: TlsPolicy,
    ) -> Result<TlsStream<TcpStream>> {
        let tls_config = if policy == TlsPolicy::AcceptAll {
            warn!("TLS certificate validation disabled for {host}");
            rustls::ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
                .with_no_client_auth()
        } else {
            let mut root_store = rustls::RootCertStore::empty();
            root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        };

        let connector = TlsConnector::from(Arc::new(tls_config));
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| Error::Tls(format!("invalid server name for TLS: {host}")))?;

        let tls_stream = connector
            .connect(server_name, stream)
            .await
            .map_err(|e| Error::Tls(format!("handshake with {host} failed: {e}")))?;

        debug!("TLS handshake completed");
        Ok(tls_stream)
    }
}

/// Certificate verifier that accepts any certificate.
/// Used under `TlsPolicy::AcceptAll`; host servers commonly present
/// self-signed certificates.
#[derive(Debug)]
struct NoVerifier;

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn pair() -> (HostChannel, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = HostChannel::connect(
            "127.0.0.1",
            addr.port(),
            TlsPolicy::Off,
            Duration::from_secs(5),
            Some(Duration::from_secs(5)),
        );
        let (channel, accepted) = tokio::join!(client, listener.accept());
        let (server, _) = accepted.unwrap();
        (channel.unwrap(), server)
    }

    #[tokio::test]
    async fn write_frame_prepends_inclusive_length() {
        let (mut channel, mut server) = pair().await;
        channel.write_frame(&[0xAA, 0xBB, 0xCC]).await.unwrap();

        let mut got = [0u8; 7];
        server.read_exact(&mut got).await.unwrap();
        assert_eq!(got, [0, 0, 0, 7, 0xAA, 0xBB, 0xCC]);
    }

    #[tokio::test]
    async fn read_frame_returns_prefix_and_body() {
        let (mut channel, mut server) = pair().await;
        server
            .write_all(&[0, 0, 0, 6, 0x12, 0x34])
            .await
            .unwrap();

        let frame = channel.read_frame().await.unwrap();
        assert_eq!(&frame[..], &[0, 0, 0, 6, 0x12, 0x34]);
    }

    #[tokio::test]
    async fn idle_markers_read_empty() {
        let (mut channel, mut server) = pair().await;
        server.write_all(&[0, 0, 0, 0]).await.unwrap();
        server.write_all(&[0x40, 0x40, 0x40, 0x40]).await.unwrap();

        assert!(channel.read_frame().await.unwrap().is_empty());
        assert!(channel.read_frame().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let (mut channel, _server) = pair().await;
        channel.disconnect().await;
        channel.disconnect().await;
    }
}
