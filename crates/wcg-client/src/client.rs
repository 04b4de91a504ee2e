//! Correlated request/response client: one background task owns the
//! transport and the ratchet session; callers talk to it through a
//! command channel and get a future back per call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use wcg_crypto::ratchet::initiate_session;
use wcg_crypto::store::SessionStore;
use wcg_crypto::{DoubleRatchetSession, Identity, PreKeyBundle, RatchetSession};
use wcg_protocol::actions::{
    Action, ActionResultData, LoginAction, ProviderAction, ProviderInfo, ServerEvent,
};
use wcg_protocol::codec::{ActionEnvelope, ResultEnvelope, WireFrame};
use wcg_protocol::handshake::{encode_handshake_init, HandshakeInit};
use wcg_protocol::{decode_frame, encode_action, FrameTransport};

use crate::error::ClientError;

type PendingReply = oneshot::Sender<Result<ActionResultData, ClientError>>;

enum Command {
    Send { action: Action, reply: PendingReply },
    Close,
}

/// A live connection to a gateway, authenticated or not.
///
/// Cloning a `Client` is cheap — clones share the same background actor,
/// command channel, and open/closed state.
#[derive(Clone)]
pub struct Client {
    cmd_tx: mpsc::Sender<Command>,
    events: broadcast::Sender<ServerEvent>,
    is_open: Arc<AtomicBool>,
}

impl Client {
    /// Perform the X3DH handshake over `transport` against `bundle`, then
    /// hand connection ownership to a background actor.
    ///
    /// `peer_address` is the stable logical identifier the session is
    /// persisted under (conventionally `"0"` for the unique local server).
    pub async fn connect<T>(
        mut transport: T,
        our_identity: &Identity,
        bundle: &PreKeyBundle,
        peer_address: impl Into<String>,
        session_store: Arc<dyn SessionStore>,
    ) -> Result<Self, ClientError>
    where
        T: FrameTransport + 'static,
    {
        let peer_address = peer_address.into();
        let (session, ephemeral) = initiate_session(our_identity, bundle)?;
        session_store
            .save_session(&peer_address, &session.to_bytes())
            .await
            .map_err(ClientError::Crypto)?;

        let init = HandshakeInit {
            identity_key: our_identity.public_key_bytes().to_vec(),
            ephemeral_key: ephemeral.to_vec(),
            one_time_prekey_id: None,
        };
        transport.send(encode_handshake_init(&init)?).await?;

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (event_tx, _) = broadcast::channel(32);
        let is_open = Arc::new(AtomicBool::new(true));
        tokio::spawn(run_actor(
            transport,
            session,
            session_store,
            peer_address,
            cmd_rx,
            event_tx.clone(),
            Arc::clone(&is_open),
        ));

        Ok(Self {
            cmd_tx,
            events: event_tx,
            is_open,
        })
    }

    /// Send `action` and await its correlated result.
    ///
    /// Fails immediately with [`ClientError::NotOpen`] once the
    /// connection has closed, rather than waiting on a channel nobody
    /// will ever answer.
    pub async fn call(&self, action: Action) -> Result<ActionResultData, ClientError> {
        if !self.is_open.load(Ordering::SeqCst) {
            return Err(ClientError::NotOpen);
        }
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Send { action, reply })
            .await
            .map_err(|_| ClientError::ChannelClosed)?;
        rx.await.map_err(|_| ClientError::ChannelClosed)?
    }

    /// Request authorization; resolves once the server pushes `Authorized`
    /// or the login action itself errors (e.g. `CryptoLogin timeout`).
    pub async fn login(&self, timeout_ms: Option<u64>) -> Result<(), ClientError> {
        self.call(Action::Login(LoginAction { timeout_ms })).await?;
        Ok(())
    }

    /// Query whether the session is currently authorized.
    pub async fn is_logged_in(&self) -> Result<bool, ClientError> {
        match self.call(Action::IsLoggedIn).await? {
            ActionResultData::Bool(flag) => Ok(flag),
            _ => Err(ClientError::Remote("unexpected result shape for IsLoggedIn".to_string())),
        }
    }

    pub async fn list_providers(&self) -> Result<Vec<ProviderInfo>, ClientError> {
        match self.call(Action::Provider(ProviderAction::List)).await? {
            ActionResultData::Providers(providers) => Ok(providers),
            _ => Err(ClientError::Remote("unexpected result shape for Provider.List".to_string())),
        }
    }

    /// Subscribe to unsolicited server pushes (`authorized`, `token`).
    pub fn subscribe_events(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// Close the channel; any in-flight calls resolve with
    /// [`ClientError::ChannelClosed`].
    pub async fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close).await;
    }

    /// Whether the connection is still open (`open-unauth` or
    /// `open-auth`) as tracked from the client's side.
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }
}

async fn run_actor<T: FrameTransport>(
    mut transport: T,
    mut session: DoubleRatchetSession,
    session_store: Arc<dyn SessionStore>,
    peer_address: String,
    mut cmd_rx: mpsc::Receiver<Command>,
    event_tx: broadcast::Sender<ServerEvent>,
    is_open: Arc<AtomicBool>,
) {
    let mut next_action_id: u64 = 1;
    let mut pending: HashMap<String, PendingReply> = HashMap::new();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Send { action, reply }) => {
                        let action_id = next_action_id.to_string();
                        next_action_id += 1;
                        if let Err(err) = send_one(&mut transport, &mut session, &session_store, &peer_address, &action_id, action).await {
                            let _ = reply.send(Err(err));
                            continue;
                        }
                        pending.insert(action_id, reply);
                    }
                    Some(Command::Close) | None => {
                        let _ = transport.close().await;
                        break;
                    }
                }
            }
            frame = transport.recv() => {
                match frame {
                    Ok(Some(ciphertext)) => {
                        let plaintext = match session.decrypt(&ciphertext) {
                            Ok(p) => p,
                            Err(e) => {
                                warn!(error = %e, "ratchet decrypt failed, closing channel");
                                break;
                            }
                        };
                        if let Err(e) = session_store.save_session(&peer_address, &session.to_bytes()).await {
                            warn!(error = %e, "failed to persist ratchet state after decrypt");
                        }
                        match decode_frame(&plaintext) {
                            Ok(WireFrame::Result(envelope)) => dispatch_result(&mut pending, envelope),
                            Ok(WireFrame::Event(event)) => { let _ = event_tx.send(event); }
                            Ok(WireFrame::Action(_)) => debug!("ignoring unexpected action frame from gateway"),
                            Err(e) => warn!(error = %e, "failed to decode wire frame"),
                        }
                    }
                    Ok(None) | Err(_) => break,
                }
            }
        }
    }

    is_open.store(false, Ordering::SeqCst);
    for (_, reply) in pending.drain() {
        let _ = reply.send(Err(ClientError::ChannelClosed));
    }
}

async fn send_one<T: FrameTransport>(
    transport: &mut T,
    session: &mut DoubleRatchetSession,
    session_store: &Arc<dyn SessionStore>,
    peer_address: &str,
    action_id: &str,
    action: Action,
) -> Result<(), ClientError> {
    let plaintext = encode_action(&ActionEnvelope {
        action_id: action_id.to_string(),
        action,
    })?;
    let ciphertext = session.encrypt(&plaintext).map_err(ClientError::Crypto)?;
    session_store
        .save_session(peer_address, &session.to_bytes())
        .await
        .map_err(ClientError::Crypto)?;
    transport.send(ciphertext).await?;
    Ok(())
}

fn dispatch_result(pending: &mut HashMap<String, PendingReply>, envelope: ResultEnvelope) {
    let Some(reply) = pending.remove(envelope.action_id()) else {
        debug!(action_id = envelope.action_id(), "result for unknown or already-resolved action");
        return;
    };
    let outcome = match envelope {
        ResultEnvelope::Ok { data, .. } => Ok(data),
        ResultEnvelope::Err { message, .. } => Err(ClientError::Remote(message)),
    };
    let _ = reply.send(outcome);
}
