//! JSON text codec for request and response envelopes.

use super::message::{Inbound, JSONRPC_VERSION, RawResponse, Request, Response};
use crate::error::{CodecError, Result};

/// Encode a request envelope into a text frame.
///
/// # Errors
///
/// Returns an error if the parameters cannot be serialized.
pub fn encode(request: &Request<'_>) -> Result<String> {
    serde_json::to_string(request)
        .map_err(|e| CodecError::SerializationFailed(e.to_string()).into())
}

/// Decode an inbound text frame.
///
/// # Errors
///
/// Returns an error if the frame is not JSON, carries a foreign protocol
/// version, or is a reply with both or neither of `result` and `error`.
pub fn decode(frame: &str) -> Result<Inbound> {
    let raw: RawResponse = serde_json::from_str(frame)
        .map_err(|e| CodecError::DeserializationFailed(e.to_string()))?;

    if let Some(version) = raw.jsonrpc.as_deref() {
        if version != JSONRPC_VERSION {
            return Err(malformed(format!("unsupported jsonrpc version {version:?}")));
        }
    }

    let Some(id) = raw.id else {
        return match (raw.method, raw.error) {
            (Some(method), None) => Ok(Inbound::Notification {
                method,
                params: raw.params,
            }),
            (_, Some(error)) => Err(malformed(format!(
                "error without id: {} {}",
                error.code, error.message
            ))),
            (None, None) => Err(malformed("missing id")),
        };
    };

    let outcome = match (raw.result, raw.error) {
        (Some(result), None) => Ok(result),
        (None, Some(error)) => Err(error),
        (Some(_), Some(_)) => return Err(malformed("both result and error present")),
        (None, None) => return Err(malformed("neither result nor error present")),
    };

    Ok(Inbound::Response(Response { id, outcome }))
}

fn malformed(reason: impl Into<String>) -> crate::Error {
    CodecError::MalformedResponse(reason.into()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::protocol::message::{ErrorObject, RequestId};
    use serde_json::{Value, json};

    #[test]
    fn test_encode_omits_absent_params() {
        let frame = encode(&Request::new(7, "minecraft:players", None)).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "method": "minecraft:players", "id": 7})
        );
    }

    #[test]
    fn test_encode_with_params() {
        let params = json!([{"name": "Steve"}]);
        let frame = encode(&Request::new(1, "minecraft:allowlist/add", Some(&params))).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(value["params"], params);
        assert_eq!(value["id"], 1);
    }

    #[test]
    fn test_decode_result() {
        let inbound = decode(r#"{"jsonrpc":"2.0","id":1,"result":"pong"}"#).unwrap();

        assert_eq!(
            inbound,
            Inbound::Response(Response {
                id: RequestId::Number(1),
                outcome: Ok(json!("pong")),
            })
        );
    }

    #[test]
    fn test_decode_null_result_is_present() {
        let inbound = decode(r#"{"jsonrpc":"2.0","id":3,"result":null}"#).unwrap();

        let Inbound::Response(response) = inbound else {
            panic!("expected a response");
        };
        assert_eq!(response.outcome, Ok(Value::Null));
    }

    #[test]
    fn test_decode_error() {
        let inbound = decode(
            r#"{"jsonrpc":"2.0","id":"4","error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();

        let Inbound::Response(response) = inbound else {
            panic!("expected a response");
        };
        assert_eq!(response.id.as_u64(), Some(4));
        assert_eq!(
            response.outcome,
            Err(ErrorObject {
                code: -32601,
                message: "Method not found".to_string(),
                data: None,
            })
        );
    }

    #[test]
    fn test_decode_notification() {
        let inbound = decode(
            r#"{"jsonrpc":"2.0","method":"minecraft:notification/players/joined","params":[{"name":"Alex"}]}"#,
        )
        .unwrap();

        assert!(matches!(
            inbound,
            Inbound::Notification { ref method, .. } if method == "minecraft:notification/players/joined"
        ));
    }

    #[test]
    fn test_decode_rejects_ambiguous_replies() {
        for frame in [
            r#"{"jsonrpc":"2.0","id":1}"#,
            r#"{"jsonrpc":"2.0","id":1,"result":1,"error":{"code":1,"message":"x"}}"#,
            r#"{"jsonrpc":"1.0","id":1,"result":1}"#,
            r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}}"#,
        ] {
            assert!(
                matches!(
                    decode(frame),
                    Err(Error::Codec(CodecError::MalformedResponse(_)))
                ),
                "{frame} should be malformed"
            );
        }
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            decode("not json"),
            Err(Error::Codec(CodecError::DeserializationFailed(_)))
        ));
    }
}
