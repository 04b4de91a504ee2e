//! X3DH handshake: the one-time key agreement that bootstraps a
//! [`DoubleRatchetSession`]'s root and chain keys.
//!
//! These functions are pure: callers are responsible for persisting the
//! resulting session (via a [`crate::store::SessionStore`]) and for
//! recording the peer's identity key (via a
//! [`crate::store::RemoteIdentityStore`]) once they accept the result.

use hkdf::Hkdf;
use sha2::Sha256;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

use crate::error::CryptoError;
use crate::identity::Identity;
use crate::prekeys::PreKeyBundle;
use crate::ratchet::DoubleRatchetSession;

fn x25519_public_from_slice(bytes: &[u8], what: &str) -> Result<X25519Public, CryptoError> {
    let array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey(format!("{what} wrong length")))?;
    Ok(X25519Public::from(array))
}

/// Initiator side of X3DH: we fetched a peer's [`PreKeyBundle`] (e.g. via
/// the discovery/provider surface) and want to start a session with them.
///
/// Returns the new session alongside the ephemeral public key the caller
/// must send to the peer as part of the first message — the responder
/// needs it to derive the matching chains in
/// [`respond_to_session`].
pub fn initiate_session(
    our_identity: &Identity,
    bundle: &PreKeyBundle,
) -> Result<(DoubleRatchetSession, [u8; 32]), CryptoError> {
    let ephemeral_secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
    let ephemeral_public = X25519Public::from(&ephemeral_secret);
    let ephemeral_bytes = ephemeral_secret.to_bytes();

    let our_identity_x25519 = our_identity.to_x25519_secret();
    let their_signed_prekey = x25519_public_from_slice(&bundle.signed_prekey, "signed prekey")?;
    let their_identity_x25519 = x25519_public_from_slice(&bundle.identity_key, "identity key")?;

    let dh1 = our_identity_x25519.diffie_hellman(&their_signed_prekey);
    let dh2 = StaticSecret::from(ephemeral_bytes).diffie_hellman(&their_identity_x25519);
    let dh3 = StaticSecret::from(ephemeral_bytes).diffie_hellman(&their_signed_prekey);

    let mut ikm = Vec::with_capacity(128);
    ikm.extend_from_slice(dh1.as_bytes());
    ikm.extend_from_slice(dh2.as_bytes());
    ikm.extend_from_slice(dh3.as_bytes());

    if let Some(ref otpk) = bundle.one_time_prekey {
        let their_otpk = x25519_public_from_slice(otpk, "one-time prekey")?;
        let dh4 = StaticSecret::from(ephemeral_bytes).diffie_hellman(&their_otpk);
        ikm.extend_from_slice(dh4.as_bytes());
    }

    let (root_key, sending_chain_key, receiving_chain_key) = derive_root_and_chains(&ikm)?;
    Ok((
        DoubleRatchetSession::new(root_key, sending_chain_key, receiving_chain_key),
        *ephemeral_public.as_bytes(),
    ))
}

/// Responder side of X3DH: a peer sent us their identity key and an
/// ephemeral public key referencing one of our published prekeys.
pub fn respond_to_session(
    our_identity: &Identity,
    our_signed_prekey_secret: &[u8; 32],
    our_one_time_prekey_secret: Option<&[u8; 32]>,
    their_identity_key: &[u8],
    their_ephemeral_key: &[u8],
) -> Result<DoubleRatchetSession, CryptoError> {
    let our_identity_x25519 = our_identity.to_x25519_secret();
    let signed_prekey_secret = StaticSecret::from(*our_signed_prekey_secret);
    let their_identity_x25519 = x25519_public_from_slice(their_identity_key, "their identity key")?;
    let their_ephemeral = x25519_public_from_slice(their_ephemeral_key, "their ephemeral key")?;

    let dh1 = signed_prekey_secret.diffie_hellman(&their_identity_x25519);
    let dh2 = our_identity_x25519.diffie_hellman(&their_ephemeral);
    let dh3 = signed_prekey_secret.diffie_hellman(&their_ephemeral);

    let mut ikm = Vec::with_capacity(128);
    ikm.extend_from_slice(dh1.as_bytes());
    ikm.extend_from_slice(dh2.as_bytes());
    ikm.extend_from_slice(dh3.as_bytes());

    if let Some(otpk_secret) = our_one_time_prekey_secret {
        let dh4 = StaticSecret::from(*otpk_secret).diffie_hellman(&their_ephemeral);
        ikm.extend_from_slice(dh4.as_bytes());
    }

    // The responder's sending/receiving chains are the mirror of the
    // initiator's, so messages each side sends land on the chain the
    // other side reads from.
    let (root_key, receiving_chain_key, sending_chain_key) = derive_root_and_chains(&ikm)?;
    Ok(DoubleRatchetSession::new(
        root_key,
        sending_chain_key,
        receiving_chain_key,
    ))
}

fn derive_root_and_chains(ikm: &[u8]) -> Result<([u8; 32], [u8; 32], [u8; 32]), CryptoError> {
    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = [0u8; 96];
    hk.expand(b"wcg-x3dh", &mut okm)
        .map_err(|e| CryptoError::SessionError(format!("HKDF expand failed: {e}")))?;

    let mut root_key = [0u8; 32];
    let mut chain_a = [0u8; 32];
    let mut chain_b = [0u8; 32];
    root_key.copy_from_slice(&okm[..32]);
    chain_a.copy_from_slice(&okm[32..64]);
    chain_b.copy_from_slice(&okm[64..96]);
    Ok((root_key, chain_a, chain_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initiator_and_responder_agree() {
        let alice = Identity::generate();
        let bob = Identity::generate();

        let bob_signed_prekey_secret =
            x25519_dalek::StaticSecret::random_from_rng(rand::rngs::OsRng);
        let bob_signed_prekey_public = X25519Public::from(&bob_signed_prekey_secret);
        let signature = bob.sign(bob_signed_prekey_public.as_bytes());

        let bundle = PreKeyBundle {
            identity_key: bob.public_key_bytes().to_vec(),
            signed_prekey: bob_signed_prekey_public.as_bytes().to_vec(),
            signed_prekey_signature: signature.to_bytes().to_vec(),
            one_time_prekey: None,
            registration_id: 1,
        };

        let (mut alice_session, alice_ephemeral) = initiate_session(&alice, &bundle).unwrap();

        let mut bob_session = respond_to_session(
            &bob,
            &bob_signed_prekey_secret.to_bytes(),
            None,
            &alice.public_key_bytes(),
            &alice_ephemeral,
        )
        .unwrap();

        let ciphertext = alice_session.encrypt(b"hello bob").unwrap();
        assert_eq!(bob_session.decrypt(&ciphertext).unwrap(), b"hello bob");

        let reply = bob_session.encrypt(b"hi alice").unwrap();
        assert_eq!(alice_session.decrypt(&reply).unwrap(), b"hi alice");
    }
}
