//! RPC envelope definitions and framing.
//!
//! Outbound envelopes carry `{id, method, params}` (plus an optional opaque
//! `trace` context); inbound envelopes carry `{id, result}` on success or
//! `{id, error: {code, message}}` on failure. Both directions are encoded
//! through the value codec so that every extended scalar survives the trip.
//! The response encoder exists for in-process transports and test servers.

use ciborium::Value as Cbor;

use crate::codec;
use crate::error::{DriverError, DriverResult};
use crate::value::Value;

/// Version strings reported by compatible servers carry this prefix.
pub const VERSION_PREFIX: &str = "surrealdb-";

/// Lowest server version the driver is known to work with.
pub const SUPPORTED_VERSION_MIN: &str = "1.4.2";
/// First server version the driver is known not to work with.
pub const SUPPORTED_VERSION_UNTIL: &str = "3.0.0";

/// An outbound remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Correlation token, unique among in-flight calls on the connection.
    pub id: String,
    pub method: String,
    pub params: Vec<Value>,
    /// Opaque trace context propagated to the server when present.
    pub trace: Option<String>,
}

/// An error payload reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerError {
    pub code: i64,
    pub message: String,
}

/// The body of an inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Result(Value),
    Error(ServerError),
}

/// An inbound envelope. `id` is absent for unsolicited messages, which this
/// core does not interpret.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: Option<String>,
    pub payload: ResponsePayload,
}

/// Encode an outbound request into its wire frame.
pub fn encode_request(request: &Request) -> DriverResult<Vec<u8>> {
    let mut entries = vec![
        (
            Cbor::Text("id".to_string()),
            Cbor::Text(request.id.clone()),
        ),
        (
            Cbor::Text("method".to_string()),
            Cbor::Text(request.method.clone()),
        ),
        (
            Cbor::Text("params".to_string()),
            Cbor::Array(
                request
                    .params
                    .iter()
                    .map(codec::to_cbor)
                    .collect::<DriverResult<Vec<_>>>()?,
            ),
        ),
    ];
    if let Some(trace) = &request.trace {
        entries.push((
            Cbor::Text("trace".to_string()),
            Cbor::Text(trace.clone()),
        ));
    }

    let mut buf = Vec::new();
    ciborium::into_writer(&Cbor::Map(entries), &mut buf)
        .map_err(|e| DriverError::Protocol(format!("CBOR encode failed: {}", e)))?;
    Ok(buf)
}

/// Decode an inbound frame into a request. Serves test servers and
/// in-process transports; clients never receive requests.
pub fn decode_request(frame: &[u8]) -> DriverResult<Request> {
    let entries = read_envelope(frame)?;

    let mut id = None;
    let mut method = None;
    let mut params = Vec::new();
    let mut trace = None;

    for (key, value) in entries {
        match (key.as_str(), value) {
            ("id", Cbor::Text(s)) => id = Some(s),
            ("method", Cbor::Text(s)) => method = Some(s),
            ("params", Cbor::Array(items)) => {
                params = items
                    .into_iter()
                    .map(codec::from_cbor)
                    .collect::<DriverResult<Vec<_>>>()?;
            }
            ("trace", Cbor::Text(s)) => trace = Some(s),
            _ => {}
        }
    }

    Ok(Request {
        id: id.ok_or_else(|| DriverError::Protocol("Request without id".to_string()))?,
        method: method
            .ok_or_else(|| DriverError::Protocol("Request without method".to_string()))?,
        params,
        trace,
    })
}

/// Encode a response into its wire frame. Serves test servers and
/// in-process transports.
pub fn encode_response(response: &Response) -> DriverResult<Vec<u8>> {
    let mut entries = Vec::new();
    if let Some(id) = &response.id {
        entries.push((Cbor::Text("id".to_string()), Cbor::Text(id.clone())));
    }
    match &response.payload {
        ResponsePayload::Result(value) => {
            entries.push((Cbor::Text("result".to_string()), codec::to_cbor(value)?));
        }
        ResponsePayload::Error(err) => {
            entries.push((
                Cbor::Text("error".to_string()),
                Cbor::Map(vec![
                    (
                        Cbor::Text("code".to_string()),
                        Cbor::Integer(err.code.into()),
                    ),
                    (
                        Cbor::Text("message".to_string()),
                        Cbor::Text(err.message.clone()),
                    ),
                ]),
            ));
        }
    }

    let mut buf = Vec::new();
    ciborium::into_writer(&Cbor::Map(entries), &mut buf)
        .map_err(|e| DriverError::Protocol(format!("CBOR encode failed: {}", e)))?;
    Ok(buf)
}

/// Decode an inbound frame into a response envelope.
pub fn decode_response(frame: &[u8]) -> DriverResult<Response> {
    let entries = read_envelope(frame)?;

    let mut id = None;
    let mut result = None;
    let mut error = None;

    for (key, value) in entries {
        match (key.as_str(), value) {
            ("id", Cbor::Text(s)) => id = Some(s),
            ("result", value) => result = Some(codec::from_cbor(value)?),
            ("error", Cbor::Map(fields)) => error = Some(parse_server_error(fields)?),
            _ => {}
        }
    }

    let payload = match (result, error) {
        (_, Some(err)) => ResponsePayload::Error(err),
        (Some(value), None) => ResponsePayload::Result(value),
        (None, None) => {
            return Err(DriverError::Protocol(
                "Response carries neither result nor error".to_string(),
            ))
        }
    };

    Ok(Response { id, payload })
}

fn parse_server_error(fields: Vec<(Cbor, Cbor)>) -> DriverResult<ServerError> {
    let mut code = 0;
    let mut message = String::new();
    for (key, value) in fields {
        match (key, value) {
            (Cbor::Text(k), Cbor::Integer(n)) if k == "code" => {
                code = i64::try_from(n)
                    .map_err(|_| DriverError::Protocol("Error code out of range".to_string()))?;
            }
            (Cbor::Text(k), Cbor::Text(s)) if k == "message" => message = s,
            _ => {}
        }
    }
    Ok(ServerError { code, message })
}

fn read_envelope(frame: &[u8]) -> DriverResult<Vec<(String, Cbor)>> {
    let cbor: Cbor = ciborium::from_reader(frame)
        .map_err(|e| DriverError::Protocol(format!("CBOR decode failed: {}", e)))?;
    match cbor {
        Cbor::Map(entries) => entries
            .into_iter()
            .map(|(k, v)| match k {
                Cbor::Text(s) => Ok((s, v)),
                other => Err(DriverError::Protocol(format!(
                    "Non-text envelope key: {:?}",
                    other
                ))),
            })
            .collect(),
        other => Err(DriverError::Protocol(format!(
            "Envelope must be a map, got {:?}",
            other
        ))),
    }
}

/// Strip the conventional `surrealdb-` prefix from a reported version.
pub fn strip_version_prefix(version: &str) -> &str {
    version.strip_prefix(VERSION_PREFIX).unwrap_or(version)
}

/// Whether a bare version string (no prefix) falls in the supported range.
pub fn is_version_supported(version: &str) -> bool {
    match (
        parse_version(version),
        parse_version(SUPPORTED_VERSION_MIN),
        parse_version(SUPPORTED_VERSION_UNTIL),
    ) {
        (Some(v), Some(min), Some(until)) => v >= min && v < until,
        _ => false,
    }
}

fn parse_version(version: &str) -> Option<(u64, u64, u64)> {
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    // Tolerate suffixes like "2.1.0-beta.1" on the patch component
    let patch_raw = parts.next()?;
    let patch = patch_raw
        .split(['-', '+'])
        .next()?
        .parse()
        .ok()?;
    Some((major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Decimal;

    #[test]
    fn test_request_round_trip() {
        let request = Request {
            id: "42".to_string(),
            method: "query".to_string(),
            params: vec![
                Value::String("SELECT * FROM users".to_string()),
                Value::Decimal(Decimal::from("1.50")),
            ],
            trace: None,
        };
        let frame = encode_request(&request).unwrap();
        assert_eq!(decode_request(&frame).unwrap(), request);
    }

    #[test]
    fn test_trace_context_is_carried_when_present() {
        let request = Request {
            id: "1".to_string(),
            method: "ping".to_string(),
            params: Vec::new(),
            trace: Some("00-abc-def-01".to_string()),
        };
        let frame = encode_request(&request).unwrap();
        let decoded = decode_request(&frame).unwrap();
        assert_eq!(decoded.trace.as_deref(), Some("00-abc-def-01"));
    }

    #[test]
    fn test_response_with_result() {
        let response = Response {
            id: Some("7".to_string()),
            payload: ResponsePayload::Result(Value::Bool(true)),
        };
        let frame = encode_response(&response).unwrap();
        assert_eq!(decode_response(&frame).unwrap(), response);
    }

    #[test]
    fn test_response_with_error() {
        let response = Response {
            id: Some("7".to_string()),
            payload: ResponsePayload::Error(ServerError {
                code: -32000,
                message: "table does not exist".to_string(),
            }),
        };
        let frame = encode_response(&response).unwrap();
        assert_eq!(decode_response(&frame).unwrap(), response);
    }

    #[test]
    fn test_malformed_envelopes_are_rejected() {
        // not CBOR at all
        assert!(decode_response(&[0xff, 0x00, 0x13]).is_err());

        // CBOR, but not a map
        let mut buf = Vec::new();
        ciborium::into_writer(&Cbor::Text("hello".to_string()), &mut buf).unwrap();
        assert!(matches!(
            decode_response(&buf),
            Err(DriverError::Protocol(_))
        ));

        // a map with neither result nor error
        let mut buf = Vec::new();
        ciborium::into_writer(
            &Cbor::Map(vec![(
                Cbor::Text("id".to_string()),
                Cbor::Text("1".to_string()),
            )]),
            &mut buf,
        )
        .unwrap();
        assert!(matches!(
            decode_response(&buf),
            Err(DriverError::Protocol(_))
        ));
    }

    #[test]
    fn test_version_prefix_stripping() {
        assert_eq!(strip_version_prefix("surrealdb-2.1.0"), "2.1.0");
        assert_eq!(strip_version_prefix("2.1.0"), "2.1.0");
    }

    #[test]
    fn test_version_range() {
        assert!(is_version_supported("1.4.2"));
        assert!(is_version_supported("2.1.0"));
        assert!(is_version_supported("2.99.9-beta.3"));
        assert!(!is_version_supported("1.4.1"));
        assert!(!is_version_supported("3.0.0"));
        assert!(!is_version_supported("not-a-version"));
    }
}
