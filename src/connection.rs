//! Transport ownership and the send/receive engine.
//!
//! One engine task owns the connection for its whole life: it connects (or
//! reconnects), pushes the optional auth password, then runs a reader loop
//! that reframes bytes and feeds the packet handler, while a writer task
//! drains the outbound queue with inter-frame pacing and write backoff.

use crate::consts::*;
use crate::error::VelbusError;
use crate::frame::{self, RawMessage};
use crate::handler::PacketHandler;
use crate::messages::Message;
use bytes::BytesMut;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf, ReadHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::{self, pki_types};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info, trace, warn};

/// Parsed connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Dsn {
    pub transport: DsnTransport,
    /// Raw bytes written to the transport before any framed traffic.
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DsnTransport {
    Tcp { host: String, port: u16 },
    Tls { host: String, port: u16 },
    Serial { path: String },
}

impl Dsn {
    /// Accepted forms: `host:port`, `tcp://host:port`, `tls://host:port`,
    /// any of those with a `password@` userinfo part, or an absolute serial
    /// device path.
    pub fn parse(dsn: &str) -> Result<Self, VelbusError> {
        if dsn.starts_with('/') {
            return Ok(Self {
                transport: DsnTransport::Serial {
                    path: dsn.to_string(),
                },
                password: None,
            });
        }

        let (scheme, rest) = match dsn.split_once("://") {
            Some((scheme, rest)) => (scheme, rest),
            None => ("tcp", dsn),
        };

        let (password, authority) = match rest.rsplit_once('@') {
            Some((password, authority)) => (Some(password.to_string()), authority),
            None => (None, rest),
        };

        let (host, port) = authority
            .rsplit_once(':')
            .ok_or_else(|| VelbusError::InvalidDsn(format!("missing port in {dsn}")))?;
        let port: u16 = port
            .parse()
            .map_err(|_| VelbusError::InvalidDsn(format!("bad port in {dsn}")))?;
        if host.is_empty() {
            return Err(VelbusError::InvalidDsn(format!("missing host in {dsn}")));
        }

        let transport = match scheme {
            "tcp" => DsnTransport::Tcp {
                host: host.to_string(),
                port,
            },
            "tls" => DsnTransport::Tls {
                host: host.to_string(),
                port,
            },
            other => {
                return Err(VelbusError::InvalidDsn(format!(
                    "unsupported scheme {other}"
                )));
            }
        };

        Ok(Self { transport, password })
    }
}

/// The transports the engine can own.
pub(crate) enum VelbusStream {
    Tcp(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
    Serial(SerialStream),
}

impl AsyncRead for VelbusStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            VelbusStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            VelbusStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
            VelbusStream::Serial(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for VelbusStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            VelbusStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            VelbusStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
            VelbusStream::Serial(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            VelbusStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            VelbusStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
            VelbusStream::Serial(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            VelbusStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            VelbusStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
            VelbusStream::Serial(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Certificate verifier that accepts anything. Velbus gateways ship
/// self-signed certificates, the bus carries no secrets beyond the optional
/// auth token, and the original tooling disables verification the same way.
#[derive(Debug)]
struct AcceptAnyServerCert(rustls::crypto::CryptoProvider);

impl rustls::client::danger::ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &pki_types::CertificateDer<'_>,
        _intermediates: &[pki_types::CertificateDer<'_>],
        _server_name: &pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

pub(crate) async fn connect_transport(dsn: &Dsn) -> Result<VelbusStream, VelbusError> {
    match &dsn.transport {
        DsnTransport::Tcp { host, port } => {
            let stream = TcpStream::connect((host.as_str(), *port))
                .await
                .map_err(|e| VelbusError::ConnectionFailed(format!("{host}:{port}: {e}")))?;
            Ok(VelbusStream::Tcp(stream))
        }
        DsnTransport::Tls { host, port } => {
            let provider = rustls::crypto::ring::default_provider();
            let config = rustls::ClientConfig::builder_with_provider(Arc::new(provider.clone()))
                .with_safe_default_protocol_versions()
                .map_err(|e| VelbusError::ConnectionFailed(e.to_string()))?
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)))
                .with_no_client_auth();
            let connector = TlsConnector::from(Arc::new(config));
            let tcp = TcpStream::connect((host.as_str(), *port))
                .await
                .map_err(|e| VelbusError::ConnectionFailed(format!("{host}:{port}: {e}")))?;
            let server_name = pki_types::ServerName::try_from(host.clone())
                .map_err(|e| VelbusError::ConnectionFailed(e.to_string()))?;
            let stream = connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| VelbusError::ConnectionFailed(format!("TLS handshake: {e}")))?;
            Ok(VelbusStream::Tls(Box::new(stream)))
        }
        DsnTransport::Serial { path } => {
            let stream = tokio_serial::new(path.as_str(), SERIAL_BAUD_RATE)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::Hardware)
                .open_native_async()
                .map_err(|e| VelbusError::ConnectionFailed(format!("{path}: {e}")))?;
            Ok(VelbusStream::Serial(stream))
        }
    }
}

/// Cloneable enqueue handle onto the paced outbound queue.
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::UnboundedSender<RawMessage>,
}

impl FrameSender {
    /// Build a sender plus the queue the writer drains. Also the hook test
    /// code uses to observe outbound traffic without a transport.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RawMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, address: u8, msg: &Message) {
        self.send_raw(msg.to_raw(address));
    }

    pub fn send_raw(&self, raw: RawMessage) {
        if self.tx.send(raw).is_err() {
            warn!("outbound queue is gone, dropping frame");
        }
    }
}

/// Outcome of one writer-task run. The receiver travels back so the next
/// connection can keep draining the same queue; a message that could not be
/// written stays at the queue head.
struct WriterRun {
    queue: mpsc::UnboundedReceiver<RawMessage>,
    pending: Option<RawMessage>,
}

async fn writer_task<W: AsyncWrite + Unpin>(
    mut transport: W,
    mut queue: mpsc::UnboundedReceiver<RawMessage>,
    mut stop: watch::Receiver<bool>,
    mut pending: Option<RawMessage>,
    failed: oneshot::Sender<()>,
) -> WriterRun {
    loop {
        let msg = match pending.take() {
            Some(msg) => msg,
            None => {
                tokio::select! {
                    _ = stop.changed() => return WriterRun { queue, pending: None },
                    msg = queue.recv() => match msg {
                        Some(msg) => msg,
                        None => return WriterRun { queue, pending: None },
                    },
                }
            }
        };

        let bytes = msg.to_bytes();
        let mut attempt = 0u32;
        let mut backoff = Duration::from_millis(100);
        let sent = loop {
            match write_frame(&mut transport, &bytes).await {
                Ok(()) => break true,
                Err(err) => {
                    attempt += 1;
                    if attempt >= WRITE_MAX_ATTEMPTS {
                        warn!("write failed after {attempt} attempts: {err}");
                        break false;
                    }
                    debug!("write attempt {attempt} failed ({err}), retrying in {backoff:?}");
                    tokio::select! {
                        _ = stop.changed() => {
                            return WriterRun { queue, pending: Some(msg) };
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(Duration::from_secs(5));
                }
            }
        };

        if !sent {
            // Surface a reconnect; the message stays at the queue head.
            let _ = failed.send(());
            return WriterRun {
                queue,
                pending: Some(msg),
            };
        }

        trace!("TX [{} bytes]: {:02x?}", bytes.len(), &bytes[..]);

        // Modules drop back-to-back frames; name requests trigger reply
        // bursts and need a much wider gap.
        let pause = if msg.command() == Some(0xEF) {
            SEND_PACING * NAME_REQUEST_PACING_FACTOR
        } else {
            SEND_PACING
        };
        tokio::select! {
            _ = stop.changed() => return WriterRun { queue, pending: None },
            _ = tokio::time::sleep(pause) => {}
        }
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(transport: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    transport.write_all(bytes).await?;
    transport.flush().await
}

/// Engine entry point, spawned by the controller. Owns the transport for
/// the lifetime of the connection, reconnecting until `stop` fires.
pub(crate) async fn run_connection(
    dsn: Dsn,
    handler: PacketHandler,
    mut queue: mpsc::UnboundedReceiver<RawMessage>,
    closing: Arc<AtomicBool>,
    mut stop: watch::Receiver<bool>,
    first_result: oneshot::Sender<Result<(), VelbusError>>,
) {
    let mut first_result = Some(first_result);
    let mut pending: Option<RawMessage> = None;

    loop {
        if closing.load(Ordering::SeqCst) {
            break;
        }

        let stream = match connect_transport(&dsn).await {
            Ok(stream) => stream,
            Err(err) => {
                if let Some(tx) = first_result.take() {
                    let _ = tx.send(Err(err));
                    return;
                }
                warn!("reconnect failed: {err}");
                tokio::select! {
                    _ = stop.changed() => break,
                    _ = tokio::time::sleep(Duration::from_secs(1)) => continue,
                }
            }
        };

        let mut stream = stream;
        if let Some(password) = &dsn.password {
            // Auth token goes out raw, before any framed traffic.
            if let Err(err) = stream.write_all(password.as_bytes()).await {
                if let Some(tx) = first_result.take() {
                    let _ = tx.send(Err(VelbusError::ConnectionFailed(format!(
                        "auth write: {err}"
                    ))));
                    return;
                }
                warn!("auth write failed: {err}");
                continue;
            }
        }

        if let Some(tx) = first_result.take() {
            let _ = tx.send(Ok(()));
        }
        info!("connection established to Velbus");

        let (read_half, write_half) = tokio::io::split(stream);
        let (writer_stop_tx, writer_stop_rx) = watch::channel(false);
        let (fail_tx, fail_rx) = oneshot::channel();
        let writer = tokio::spawn(writer_task(
            write_half,
            queue,
            writer_stop_rx,
            pending.take(),
            fail_tx,
        ));

        read_loop(read_half, &handler, &mut stop, fail_rx).await;

        let _ = writer_stop_tx.send(true);
        let run = writer.await.expect("writer task panicked");
        queue = run.queue;
        pending = run.pending;

        if closing.load(Ordering::SeqCst) || *stop.borrow() {
            break;
        }
        if queue.is_closed() && pending.is_none() {
            // The controller is gone; nothing left to serve.
            break;
        }
        info!("connection to Velbus lost, reconnecting");
    }

    debug!("connection engine stopped");
}

/// Read frames and dispatch them in arrival order until the connection
/// drops, the writer gives up, or stop fires.
async fn read_loop(
    mut read_half: ReadHalf<VelbusStream>,
    handler: &PacketHandler,
    stop: &mut watch::Receiver<bool>,
    mut writer_failed: oneshot::Receiver<()>,
) {
    let mut buf = BytesMut::with_capacity(16 * MAX_FRAME_SIZE);
    loop {
        tokio::select! {
            _ = stop.changed() => return,
            _ = &mut writer_failed => {
                warn!("writer surfaced a reconnect");
                return;
            }
            read = read_half.read_buf(&mut buf) => {
                match read {
                    Ok(0) => {
                        warn!("EOF received from Velbus");
                        return;
                    }
                    Ok(n) => {
                        trace!("RX [{n} bytes]: {:02x?}", &buf[buf.len() - n..]);
                        while let Some(raw) = frame::next_frame(&mut buf) {
                            handler.handle(&raw).await;
                        }
                    }
                    Err(err) => {
                        warn!("read error: {err}");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsn_forms() {
        assert_eq!(
            Dsn::parse("192.168.1.9:27015").unwrap(),
            Dsn {
                transport: DsnTransport::Tcp {
                    host: "192.168.1.9".into(),
                    port: 27015
                },
                password: None
            }
        );
        assert_eq!(
            Dsn::parse("tls://gateway:27015").unwrap().transport,
            DsnTransport::Tls {
                host: "gateway".into(),
                port: 27015
            }
        );
        let with_auth = Dsn::parse("tcp://secret@gateway:27015").unwrap();
        assert_eq!(with_auth.password.as_deref(), Some("secret"));
        assert_eq!(
            Dsn::parse("/dev/ttyUSB0").unwrap().transport,
            DsnTransport::Serial {
                path: "/dev/ttyUSB0".into()
            }
        );
        assert!(Dsn::parse("gateway").is_err());
        assert!(Dsn::parse("udp://gateway:27015").is_err());
    }
}
