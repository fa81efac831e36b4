use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::message::{self, Reply, MAX_MESSAGE_BYTES};
use super::transport::{self, ChannelGuard, LocalListener};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::intent::InvocationIntent;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of trying to own the launcher session.
pub enum GateOutcome {
    /// This process owns the channel and must serve it.
    Primary(LocalListener),
    /// The intent was handed to the running primary.
    Forwarded,
    /// The channel could not be set up at all; run without it.
    Unavailable(LauncherError),
    /// Forwarding failed and the retry as primary did too.
    Failed(LauncherError),
}

/// Client side of the single-instance protocol plus the claim logic.
#[derive(Debug, Clone)]
pub struct SingleInstanceGate {
    address: PathBuf,
    timeout: Duration,
}

impl SingleInstanceGate {
    pub fn new(address: impl Into<PathBuf>) -> Self {
        Self {
            address: address.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> &Path {
        &self.address
    }

    pub async fn claim(&self) -> LauncherResult<Option<LocalListener>> {
        transport::claim(&self.address)
            .await
            .map_err(|source| LauncherError::Io {
                path: self.address.clone(),
                source,
            })
    }

    /// Claims the channel or forwards `intent` to whoever holds it.
    ///
    /// A failed forward (primary vanished mid-handshake, rejected message)
    /// gets exactly one more claim attempt before giving up.
    pub async fn establish(&self, intent: &InvocationIntent) -> GateOutcome {
        match self.claim().await {
            Ok(Some(listener)) => {
                info!("Claimed launcher channel {:?}", self.address);
                return GateOutcome::Primary(listener);
            }
            Ok(None) => {}
            Err(err) => {
                warn!("Single-instance channel unavailable: {}", err);
                return GateOutcome::Unavailable(err);
            }
        }

        let send_error = match self.send(intent).await {
            Ok(()) => {
                info!("Forwarded invocation to the running launcher");
                return GateOutcome::Forwarded;
            }
            Err(err) => err,
        };

        warn!(
            "Forwarding to the running launcher failed ({}), retrying as primary",
            send_error
        );
        match self.claim().await {
            Ok(Some(listener)) => GateOutcome::Primary(listener),
            Ok(None) => GateOutcome::Failed(send_error),
            Err(err) => GateOutcome::Failed(err),
        }
    }

    /// Sends one intent and waits for the primary's acknowledgement.
    pub async fn send(&self, intent: &InvocationIntent) -> LauncherResult<()> {
        let stream = tokio::time::timeout(self.timeout, transport::connect(&self.address))
            .await
            .map_err(|_| LauncherError::Ipc("timed out connecting to the launcher".into()))?
            .map_err(|e| LauncherError::Ipc(format!("cannot connect to the launcher: {e}")))?;

        let reply = tokio::time::timeout(self.timeout, exchange(stream, intent))
            .await
            .map_err(|_| LauncherError::Ipc("timed out waiting for acknowledgement".into()))??;

        match reply {
            Reply::Ack => Ok(()),
            Reply::Rejected { reason } => Err(LauncherError::Ipc(format!(
                "the running launcher rejected the request: {reason}"
            ))),
        }
    }
}

async fn exchange<S>(stream: S, intent: &InvocationIntent) -> LauncherResult<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    writer.write_all(&message::encode_intent(intent)?).await?;
    writer.flush().await?;

    let mut line = String::new();
    let read = BufReader::new(reader.take(MAX_MESSAGE_BYTES))
        .read_line(&mut line)
        .await?;
    if read == 0 {
        return Err(LauncherError::Ipc(
            "the launcher closed the connection without replying".into(),
        ));
    }
    message::decode_reply(&line)
}

/// Accept loop of the primary. Dropping it releases the channel.
pub struct ServingGate {
    address: PathBuf,
    task: JoinHandle<()>,
    _guard: Option<ChannelGuard>,
}

impl ServingGate {
    /// Forwards every decoded intent into `sink`.
    pub fn serve<E>(mut listener: LocalListener, sink: mpsc::UnboundedSender<E>) -> Self
    where
        E: From<InvocationIntent> + Send + 'static,
    {
        let address = listener.address().to_path_buf();
        let guard = listener.take_guard();
        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok(stream) => {
                        let sink = sink.clone();
                        tokio::spawn(async move {
                            if let Err(err) = serve_connection(stream, sink).await {
                                debug!("Launcher channel client dropped: {}", err);
                            }
                        });
                    }
                    Err(err) => {
                        warn!("Launcher channel accept failed: {}", err);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        });

        Self {
            address,
            task,
            _guard: guard,
        }
    }

    pub fn address(&self) -> &Path {
        &self.address
    }
}

impl Drop for ServingGate {
    fn drop(&mut self) {
        // The guard field drops after this, removing the socket and unlocking.
        self.task.abort();
    }
}

async fn serve_connection<S, E>(stream: S, sink: mpsc::UnboundedSender<E>) -> LauncherResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    E: From<InvocationIntent>,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut line = String::new();
    let read = tokio::time::timeout(
        DEFAULT_TIMEOUT,
        BufReader::new(reader.take(MAX_MESSAGE_BYTES)).read_line(&mut line),
    )
    .await
    .map_err(|_| LauncherError::Ipc("client sent nothing".into()))??;

    // Liveness probes connect and hang up without a message.
    if read == 0 {
        return Ok(());
    }

    let (reply, result) = match message::decode_intent(&line) {
        Ok(intent) => {
            debug!("Received forwarded invocation: {:?}", intent);
            if sink.send(E::from(intent)).is_ok() {
                (Reply::Ack, Ok(()))
            } else {
                (
                    Reply::Rejected {
                        reason: "launcher is shutting down".into(),
                    },
                    Ok(()),
                )
            }
        }
        Err(err) => {
            warn!("Rejecting malformed invocation: {}", err);
            (
                Reply::Rejected {
                    reason: err.to_string(),
                },
                Err(err),
            )
        }
    };

    writer.write_all(&message::encode_reply(&reply)?).await?;
    writer.flush().await?;
    result
}
