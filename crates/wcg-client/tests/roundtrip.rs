use std::sync::Arc;

use wcg_client::Client;
use wcg_crypto::ratchet::respond_to_session;
use wcg_crypto::store::{MemorySessionStore, SessionStore};
use wcg_crypto::{Identity, PreKeyBundle, RatchetSession};
use wcg_protocol::actions::{ActionResultData, ProviderInfo, ServerEvent};
use wcg_protocol::codec::{ResultEnvelope, WireFrame};
use wcg_protocol::handshake::decode_handshake_init;
use wcg_protocol::transport::DuplexFrameTransport;
use wcg_protocol::{decode_frame, encode_event, encode_result, FrameTransport};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

/// Drives a `Client` end to end against a hand-rolled fake gateway that
/// speaks the handshake and wire framing directly, without a real
/// dispatcher behind it.
#[tokio::test]
async fn call_roundtrips_through_a_fake_gateway() {
    let server_identity = Identity::generate();
    let signed_prekey_secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
    let signed_prekey_public = X25519Public::from(&signed_prekey_secret);
    let signature = server_identity.sign(signed_prekey_public.as_bytes());

    let bundle = PreKeyBundle {
        identity_key: server_identity.public_key_bytes().to_vec(),
        signed_prekey: signed_prekey_public.as_bytes().to_vec(),
        signed_prekey_signature: signature.to_bytes().to_vec(),
        one_time_prekey: None,
        registration_id: 1,
    };

    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let client_transport = DuplexFrameTransport::new(client_io);
    let mut server_transport = DuplexFrameTransport::new(server_io);

    let server_task = tokio::spawn(async move {
        let handshake_bytes = server_transport.recv().await.unwrap().unwrap();
        let init = decode_handshake_init(&handshake_bytes).unwrap();
        let mut session = respond_to_session(
            &server_identity,
            &signed_prekey_secret.to_bytes(),
            None,
            &init.identity_key,
            &init.ephemeral_key,
        )
        .unwrap();

        let ciphertext = server_transport.recv().await.unwrap().unwrap();
        let plaintext = session.decrypt(&ciphertext).unwrap();
        let envelope = match decode_frame(&plaintext).unwrap() {
            WireFrame::Action(envelope) => envelope,
            other => panic!("expected an action frame, got {other:?}"),
        };
        assert_eq!(envelope.action.tag(), "Provider.List");

        let result = ResultEnvelope::Ok {
            action_id: envelope.action_id.clone(),
            data: ActionResultData::Providers(vec![ProviderInfo {
                id: "software".into(),
                name: "Software".into(),
                is_hardware: false,
            }]),
        };
        let reply_ciphertext = session.encrypt(&encode_result(&result).unwrap()).unwrap();
        server_transport.send(reply_ciphertext).await.unwrap();

        let event_ciphertext = session
            .encrypt(&encode_event(&ServerEvent::Authorized).unwrap())
            .unwrap();
        server_transport.send(event_ciphertext).await.unwrap();
    });

    let client_identity = Identity::generate();
    let session_store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let client = Client::connect(client_transport, &client_identity, &bundle, "0", session_store)
        .await
        .unwrap();

    let mut events = client.subscribe_events();
    let providers = client.list_providers().await.unwrap();
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0].id, "software");

    let event = events.recv().await.unwrap();
    assert!(matches!(event, ServerEvent::Authorized));

    server_task.await.unwrap();
}

#[tokio::test]
async fn pending_calls_reject_when_the_channel_closes() {
    let server_identity = Identity::generate();
    let signed_prekey_secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
    let signed_prekey_public = X25519Public::from(&signed_prekey_secret);
    let signature = server_identity.sign(signed_prekey_public.as_bytes());

    let bundle = PreKeyBundle {
        identity_key: server_identity.public_key_bytes().to_vec(),
        signed_prekey: signed_prekey_public.as_bytes().to_vec(),
        signed_prekey_signature: signature.to_bytes().to_vec(),
        one_time_prekey: None,
        registration_id: 1,
    };

    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let client_transport = DuplexFrameTransport::new(client_io);
    let mut server_transport = DuplexFrameTransport::new(server_io);

    let server_task = tokio::spawn(async move {
        let handshake_bytes = server_transport.recv().await.unwrap().unwrap();
        let init = decode_handshake_init(&handshake_bytes).unwrap();
        let mut session = respond_to_session(
            &server_identity,
            &signed_prekey_secret.to_bytes(),
            None,
            &init.identity_key,
            &init.ephemeral_key,
        )
        .unwrap();
        // Receive the request but never reply, then close — simulating a
        // dropped connection mid-call.
        let ciphertext = server_transport.recv().await.unwrap().unwrap();
        session.decrypt(&ciphertext).unwrap();
        server_transport.close().await.unwrap();
    });

    let client_identity = Identity::generate();
    let session_store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let client = Client::connect(client_transport, &client_identity, &bundle, "0", session_store)
        .await
        .unwrap();

    let result = client.list_providers().await;
    assert!(result.is_err());

    server_task.await.unwrap();
}
