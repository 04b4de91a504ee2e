//! Per-connection handling: the plaintext handshake, then the
//! ratchet-encrypted action/result/event loop for one client.
//!
//! Connection lifecycle: `connecting` (handshake in flight) →
//! `open-unauth` (ratchet established, `Login` not yet granted) →
//! `open-auth` (after a successful `Login`) → closed when the transport
//! drops or a frame fails to decrypt/decode.
//!
//! Each decoded envelope is dispatched on its own spawned task so a slow
//! handler (a blocking hardware-token call, say) only stalls its own
//! reply, not the rest of the session. Dispatch itself is unsynchronized
//! and may interleave freely; only the final encrypt-and-send step is
//! serialized, via the single `writer` mutex, since the ratchet's
//! sending chain must advance in the same order bytes hit the wire.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::ws::WebSocket;
use tokio::sync::{Mutex, Notify};
use tracing::warn;

use wcg_crypto::ratchet::respond_to_session;
use wcg_crypto::{DoubleRatchetSession, RatchetSession, RemoteIdentity};
use wcg_protocol::actions::{ActionResultData, ProviderInfo, ServerEvent};
use wcg_protocol::codec::{decode_action_lenient, encode_event, encode_result, ResultEnvelope};
use wcg_protocol::handshake::decode_handshake_init;
use wcg_protocol::transport::{AxumWsSender, AxumWsTransport};
use wcg_registry::{HandleRegistry, ProviderCryptoInfo};

use crate::auth::{AuthPrompt, AutoApprove};
use crate::dispatch::{dispatch, DispatchOutcome};
use crate::error::GatewayError;
use crate::state::GatewayState;

/// The send half of a session: the ratchet's sending/receiving chains
/// and the socket's write half, always advanced and written together.
struct Writer {
    session: DoubleRatchetSession,
    sender: AxumWsSender,
}

/// Drive one accepted websocket connection to completion, logging (but
/// not propagating) whatever error ended it.
pub async fn handle_connection(state: Arc<GatewayState>, socket: WebSocket) {
    if let Err(err) = run_connection(state, socket).await {
        warn!(error = %err, "session ended");
    }
}

async fn run_connection(state: Arc<GatewayState>, socket: WebSocket) -> Result<(), GatewayError> {
    let mut transport = AxumWsTransport::new(socket);

    let first = transport
        .recv()
        .await?
        .ok_or_else(|| GatewayError::InvalidRequest("connection closed before handshake".to_string()))?;
    let init = decode_handshake_init(&first)?;
    let address = hex::encode(&init.identity_key);

    match state.remote_identity_store.load_remote_identity(&address).await? {
        Some(existing) if existing.identity_key != init.identity_key => {
            return Err(GatewayError::InvalidRequest(
                "identity key does not match the trusted record for this address".to_string(),
            ));
        }
        Some(_) => {}
        None => {
            state
                .remote_identity_store
                .save_remote_identity(&RemoteIdentity::new(address.clone(), init.identity_key.clone()))
                .await?;
        }
    }

    let signed_prekey_secret = state.signed_prekey_secret().await?;
    let one_time_prekey_secret = match init.one_time_prekey_id {
        Some(id) => {
            let secret = state.prekey_store.load_prekey(id).await?;
            state.prekey_store.remove_prekey(id).await?;
            secret
        }
        None => None,
    };

    let session = respond_to_session(
        &state.identity,
        &signed_prekey_secret,
        one_time_prekey_secret.as_ref(),
        &init.identity_key,
        &init.ephemeral_key,
    )?;
    state.session_store.save_session(&address, &session.to_bytes()).await?;

    let (sender, mut receiver) = transport.split();
    let writer = Arc::new(Mutex::new(Writer { session, sender }));
    let handles = Arc::new(HandleRegistry::new());
    let is_authorized = Arc::new(AtomicBool::new(false));
    let auth_prompt: Arc<dyn AuthPrompt> = Arc::new(AutoApprove);
    let mut token_rx = state.provider_registry.subscribe();
    // Signalled by `handle_envelope` the moment a `Login` authorizes the
    // session, so this loop can drop `token_rx` and subscribe fresh —
    // otherwise any hotplug event broadcast while still unauthorized
    // would sit buffered in the channel and land right after the
    // `authorized` event, violating "unauthorized sessions receive none".
    let resubscribe = Arc::new(Notify::new());

    loop {
        tokio::select! {
            frame = receiver.recv() => {
                let Some(ciphertext) = frame? else { break };
                let plaintext = decrypt_inbound(&writer, &state, &address, &ciphertext).await?;

                tokio::spawn(run_envelope(
                    Arc::clone(&state),
                    Arc::clone(&handles),
                    Arc::clone(&auth_prompt),
                    Arc::clone(&writer),
                    Arc::clone(&is_authorized),
                    Arc::clone(&resubscribe),
                    address.clone(),
                    plaintext,
                ));
            }
            Ok(event) = token_rx.recv(), if is_authorized.load(Ordering::SeqCst) => {
                let event = ServerEvent::Token {
                    added: event.added.into_iter().map(into_provider_info).collect(),
                    removed: event.removed.into_iter().map(into_provider_info).collect(),
                };
                tokio::spawn(send_event(Arc::clone(&writer), Arc::clone(&state), address.clone(), event));
            }
            () = resubscribe.notified() => {
                token_rx = state.provider_registry.subscribe();
            }
        }
    }

    Ok(())
}

/// Decrypt one inbound frame. Decryption (unlike dispatch) must happen
/// in frame-arrival order, so this runs inline in the read loop rather
/// than in the spawned per-envelope task.
async fn decrypt_inbound(
    writer: &Arc<Mutex<Writer>>,
    state: &GatewayState,
    address: &str,
    ciphertext: &[u8],
) -> Result<Vec<u8>, GatewayError> {
    let mut w = writer.lock().await;
    let plaintext = w.session.decrypt(ciphertext)?;
    state.session_store.save_session(address, &w.session.to_bytes()).await?;
    Ok(plaintext)
}

/// Decode, dispatch, and reply to one envelope. Runs as its own spawned
/// task; any error here ends only this envelope's handling, not the
/// connection.
async fn run_envelope(
    state: Arc<GatewayState>,
    handles: Arc<HandleRegistry>,
    auth_prompt: Arc<dyn AuthPrompt>,
    writer: Arc<Mutex<Writer>>,
    is_authorized: Arc<AtomicBool>,
    resubscribe: Arc<Notify>,
    address: String,
    plaintext: Vec<u8>,
) {
    if let Err(err) = handle_envelope(&state, &handles, auth_prompt.as_ref(), &writer, &is_authorized, &resubscribe, &address, &plaintext).await {
        warn!(error = %err, "failed to handle envelope");
    }
}

async fn handle_envelope(
    state: &GatewayState,
    handles: &HandleRegistry,
    auth_prompt: &dyn AuthPrompt,
    writer: &Arc<Mutex<Writer>>,
    is_authorized: &AtomicBool,
    resubscribe: &Notify,
    address: &str,
    plaintext: &[u8],
) -> Result<(), GatewayError> {
    let mut authorized_event = false;
    let result = match decode_action_lenient(plaintext)? {
        Err((action_id, tag)) => {
            let e = GatewayError::UnknownAction(tag);
            ResultEnvelope::Err { action_id, code: e.code().to_string(), message: e.to_string() }
        }
        Ok(envelope) => {
            let action_id = envelope.action_id;
            let was_authorized = is_authorized.load(Ordering::SeqCst);
            let outcome = dispatch(state, handles, was_authorized, auth_prompt, envelope.action).await;
            match outcome {
                Ok(DispatchOutcome::Data(data)) => ResultEnvelope::Ok { action_id, data },
                Ok(DispatchOutcome::Authorized) => {
                    is_authorized.store(true, Ordering::SeqCst);
                    // Drop anything buffered in the token-event channel
                    // from before authorization before the run loop's
                    // `select!` starts polling it.
                    resubscribe.notify_one();
                    authorized_event = true;
                    ResultEnvelope::Ok { action_id, data: ActionResultData::None }
                }
                Err(e) => ResultEnvelope::Err {
                    action_id,
                    code: e.code().to_string(),
                    message: e.to_string(),
                },
            }
        }
    };

    send_result_inner(writer, state, address, &result).await?;
    if authorized_event {
        send_event_inner(writer, state, address, &ServerEvent::Authorized).await?;
    }
    Ok(())
}

async fn send_result_inner(
    writer: &Arc<Mutex<Writer>>,
    state: &GatewayState,
    address: &str,
    result: &ResultEnvelope,
) -> Result<(), GatewayError> {
    let bytes = encode_result(result)?;
    let mut w = writer.lock().await;
    let ciphertext = w.session.encrypt(&bytes)?;
    state.session_store.save_session(address, &w.session.to_bytes()).await?;
    w.sender.send(ciphertext).await?;
    Ok(())
}

async fn send_event_inner(
    writer: &Arc<Mutex<Writer>>,
    state: &GatewayState,
    address: &str,
    event: &ServerEvent,
) -> Result<(), GatewayError> {
    let bytes = encode_event(event)?;
    let mut w = writer.lock().await;
    let ciphertext = w.session.encrypt(&bytes)?;
    state.session_store.save_session(address, &w.session.to_bytes()).await?;
    w.sender.send(ciphertext).await?;
    Ok(())
}

/// Spawned-task entry point for pushing an unsolicited event (hotplug
/// notifications arrive independently of any inbound envelope).
async fn send_event(writer: Arc<Mutex<Writer>>, state: Arc<GatewayState>, address: String, event: ServerEvent) {
    if let Err(err) = send_event_inner(&writer, &state, &address, &event).await {
        warn!(error = %err, "failed to push server event");
    }
}

fn into_provider_info(info: ProviderCryptoInfo) -> ProviderInfo {
    ProviderInfo { id: info.id, name: info.name, is_hardware: info.is_hardware }
}
