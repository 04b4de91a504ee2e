pub mod actions;
pub mod codec;
pub mod discovery;
pub mod error;
pub mod handshake;
pub mod transport;

pub use codec::{
    decode_action, decode_event, decode_frame, decode_result, encode_action, encode_event,
    encode_result, ActionEnvelope, ResultEnvelope, WireFrame,
};
pub use discovery::ServerInfo;
pub use error::ProtocolError;
pub use handshake::{decode_handshake_init, encode_handshake_init, HandshakeInit};
pub use transport::FrameTransport;
