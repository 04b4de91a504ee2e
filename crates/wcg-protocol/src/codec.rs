//! Encodes/decodes the outer wire frame (generated from `envelope.proto`)
//! to and from the Rust-domain [`crate::actions::Action`] /
//! [`crate::actions::ActionResultData`] / [`crate::actions::ServerEvent`]
//! types.
//!
//! Every frame placed on the (ratchet-encrypted) wire is a `WireMessage`
//! oneof of exactly one request, result, or event; decoding switches on
//! which field is set rather than guessing a schema from raw bytes.

use prost::Message;

use crate::actions::{Action, ActionResultData, ServerEvent};
use crate::error::ProtocolError;

pub mod wire {
    #![allow(clippy::all, clippy::pedantic)]
    include!(concat!(env!("OUT_DIR"), "/wcg.rs"));
}

/// A decoded action request together with its correlation id.
#[derive(Debug, Clone)]
pub struct ActionEnvelope {
    pub action_id: String,
    pub action: Action,
}

/// A decoded action outcome together with its correlation id.
#[derive(Debug, Clone)]
pub enum ResultEnvelope {
    Ok {
        action_id: String,
        data: ActionResultData,
    },
    Err {
        action_id: String,
        code: String,
        message: String,
    },
}

impl ResultEnvelope {
    pub fn action_id(&self) -> &str {
        match self {
            ResultEnvelope::Ok { action_id, .. } | ResultEnvelope::Err { action_id, .. } => {
                action_id
            }
        }
    }
}

/// Any one of the three things that can arrive on the wire, once
/// decrypted and decoded.
#[derive(Debug, Clone)]
pub enum WireFrame {
    Action(ActionEnvelope),
    Result(ResultEnvelope),
    Event(ServerEvent),
}

/// Encode an action request as a wire frame, ready to hand to a
/// [`crate::transport::FrameTransport`].
pub fn encode_action(envelope: &ActionEnvelope) -> Result<Vec<u8>, ProtocolError> {
    let payload = serde_json::to_vec(&envelope.action)?;
    let frame = wire::WireMessage {
        body: Some(wire::wire_message::Body::Action(wire::ActionEnvelope {
            action_id: envelope.action_id.clone(),
            action: envelope.action.tag(),
            payload,
        })),
    };
    Ok(frame.encode_to_vec())
}

/// Encode an action outcome as a wire frame.
pub fn encode_result(envelope: &ResultEnvelope) -> Result<Vec<u8>, ProtocolError> {
    let result = match envelope {
        ResultEnvelope::Ok { action_id, data } => wire::ResultEnvelope {
            action_id: action_id.clone(),
            ok: true,
            data: serde_json::to_vec(data)?,
            error_code: String::new(),
            error_message: String::new(),
        },
        ResultEnvelope::Err {
            action_id,
            code,
            message,
        } => wire::ResultEnvelope {
            action_id: action_id.clone(),
            ok: false,
            data: Vec::new(),
            error_code: code.clone(),
            error_message: message.clone(),
        },
    };
    let frame = wire::WireMessage {
        body: Some(wire::wire_message::Body::Result(result)),
    };
    Ok(frame.encode_to_vec())
}

/// Encode an unsolicited server event as a wire frame.
pub fn encode_event(event: &ServerEvent) -> Result<Vec<u8>, ProtocolError> {
    let payload = serde_json::to_vec(event)?;
    let frame = wire::WireMessage {
        body: Some(wire::wire_message::Body::Event(wire::EventEnvelope { payload })),
    };
    Ok(frame.encode_to_vec())
}

/// Decode any wire frame previously produced by [`encode_action`],
/// [`encode_result`], or [`encode_event`]. Decoding an unrecognized
/// protobuf tag is a decode error rather than a silent skip — every byte
/// on this wire is cryptographically meaningful.
pub fn decode_frame(bytes: &[u8]) -> Result<WireFrame, ProtocolError> {
    let message = wire::WireMessage::decode(bytes)?;
    match message.body {
        Some(wire::wire_message::Body::Action(frame)) => {
            let action: Action = serde_json::from_slice(&frame.payload)?;
            Ok(WireFrame::Action(ActionEnvelope {
                action_id: frame.action_id,
                action,
            }))
        }
        Some(wire::wire_message::Body::Result(frame)) => Ok(WireFrame::Result(if frame.ok {
            ResultEnvelope::Ok {
                action_id: frame.action_id,
                data: serde_json::from_slice(&frame.data)?,
            }
        } else {
            ResultEnvelope::Err {
                action_id: frame.action_id,
                code: frame.error_code,
                message: frame.error_message,
            }
        })),
        Some(wire::wire_message::Body::Event(frame)) => {
            let event: ServerEvent = serde_json::from_slice(&frame.payload)?;
            Ok(WireFrame::Event(event))
        }
        None => Err(ProtocolError::Deserialization("empty wire message".to_string())),
    }
}

/// Decode a wire frame known to carry an action request.
pub fn decode_action(bytes: &[u8]) -> Result<ActionEnvelope, ProtocolError> {
    match decode_frame(bytes)? {
        WireFrame::Action(envelope) => Ok(envelope),
        _ => Err(ProtocolError::Deserialization("expected an action frame".to_string())),
    }
}

/// Decode an action frame the way a dispatcher needs to: the outer
/// `action_id`/`action` tag are read off the wire message itself, so a
/// payload whose `family`/`op` doesn't match any known action still
/// yields enough to send back a correlated `UnknownAction` result
/// instead of dropping the connection.
pub fn decode_action_lenient(bytes: &[u8]) -> Result<Result<ActionEnvelope, (String, String)>, ProtocolError> {
    let message = wire::WireMessage::decode(bytes)?;
    match message.body {
        Some(wire::wire_message::Body::Action(frame)) => match serde_json::from_slice::<Action>(&frame.payload) {
            Ok(action) => Ok(Ok(ActionEnvelope { action_id: frame.action_id, action })),
            Err(_) => Ok(Err((frame.action_id, frame.action))),
        },
        _ => Err(ProtocolError::Deserialization("expected an action frame".to_string())),
    }
}

/// Decode a wire frame known to carry a result.
pub fn decode_result(bytes: &[u8]) -> Result<ResultEnvelope, ProtocolError> {
    match decode_frame(bytes)? {
        WireFrame::Result(envelope) => Ok(envelope),
        _ => Err(ProtocolError::Deserialization("expected a result frame".to_string())),
    }
}

/// Decode a wire frame known to carry an unsolicited event.
pub fn decode_event(bytes: &[u8]) -> Result<ServerEvent, ProtocolError> {
    match decode_frame(bytes)? {
        WireFrame::Event(event) => Ok(event),
        _ => Err(ProtocolError::Deserialization("expected an event frame".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ProviderAction, ProviderInfo};

    #[test]
    fn action_roundtrips_through_wire_bytes() {
        let envelope = ActionEnvelope {
            action_id: "a-1".into(),
            action: Action::Provider(ProviderAction::List),
        };
        let bytes = encode_action(&envelope).unwrap();
        let decoded = decode_action(&bytes).unwrap();
        assert_eq!(decoded.action_id, "a-1");
        assert_eq!(decoded.action.tag(), "Provider.List");
    }

    #[test]
    fn result_roundtrips_through_wire_bytes() {
        let envelope = ResultEnvelope::Ok {
            action_id: "a-2".into(),
            data: ActionResultData::Names(vec!["one".into(), "two".into()]),
        };
        let bytes = encode_result(&envelope).unwrap();
        let decoded = decode_result(&bytes).unwrap();
        assert_eq!(decoded.action_id(), "a-2");
    }

    #[test]
    fn unknown_action_error_roundtrips() {
        let envelope = ResultEnvelope::Err {
            action_id: "a-3".into(),
            code: "UnknownAction".into(),
            message: "Subtle.Bogus is not a known action".into(),
        };
        let bytes = encode_result(&envelope).unwrap();
        let decoded = decode_result(&bytes).unwrap();
        match decoded {
            ResultEnvelope::Err { code, .. } => assert_eq!(code, "UnknownAction"),
            ResultEnvelope::Ok { .. } => panic!("expected an error result"),
        }
    }

    #[test]
    fn event_roundtrips_through_wire_bytes() {
        let event = ServerEvent::Token {
            added: vec![ProviderInfo {
                id: "t1".into(),
                name: "TEST".into(),
                is_hardware: true,
            }],
            removed: vec![],
        };
        let bytes = encode_event(&event).unwrap();
        match decode_frame(&bytes).unwrap() {
            WireFrame::Event(ServerEvent::Token { added, .. }) => assert_eq!(added[0].id, "t1"),
            _ => panic!("expected a token event"),
        }
    }

    #[test]
    fn decoding_a_result_frame_as_an_action_fails() {
        let envelope = ResultEnvelope::Ok {
            action_id: "a-4".into(),
            data: ActionResultData::None,
        };
        let bytes = encode_result(&envelope).unwrap();
        assert!(decode_action(&bytes).is_err());
    }
}
