use crate::config::Credentials;
use crate::error::Error;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use sha1::{Digest, Sha1};
use url::Url;

/// Constant client nonce. The gateway terminates the real venue connection,
/// so the anti-caching purpose of a random key does not apply here.
pub const WEBSOCKET_KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";

const WEBSOCKET_UUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Splits a `ws://` gateway URL into the pieces the handshake needs: host,
/// port and the request path with its query, without the leading slash.
pub fn parse_gateway_url(ws_url: &str) -> Result<(String, u16, String), Error> {
    let parsed_url = Url::parse(ws_url)?;

    // The gateway speaks plain TCP; TLS towards the venue is its business.
    if parsed_url.scheme() != "ws" {
        return Err(Error::InvalidSchemeURL);
    }
    let host = parsed_url.host_str().ok_or(Error::URLNoHost)?;
    let port = parsed_url.port().ok_or(Error::URLNoPort)?;

    let request_path = match parsed_url.query() {
        Some(query) => format!("{}?{}", parsed_url.path(), query),
        None => parsed_url.path().to_string(),
    };
    let request_path = request_path.trim_start_matches('/').to_string();

    Ok((String::from(host), port, request_path))
}

/// The upgrade request sent after connect, byte for byte.
pub fn build_upgrade_request(host: &str, port: u16, path: &str) -> String {
    format!(
        "GET /{} HTTP/1.1\r\nHost: {}:{}\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: {}\r\nSec-WebSocket-Version: 13\r\n\r\n",
        path, host, port, WEBSOCKET_KEY,
    )
}

/// Checks the collected response head: status 101 and the accept value
/// derived from our key.
pub(crate) fn validate_upgrade_response(head: &[u8]) -> Result<(), Error> {
    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut response = httparse::Response::new(&mut headers);
    if response.parse(head)?.is_partial() {
        return Err(Error::IncompleteHTTPResponse);
    }
    if response.code != Some(101) {
        return Err(Error::NoUpgrade);
    }
    let accept = response
        .headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case("sec-websocket-accept"))
        .ok_or(Error::InvalidAcceptKey)?;
    if accept.value != generate_websocket_accept_value(WEBSOCKET_KEY).as_bytes() {
        return Err(Error::InvalidAcceptKey);
    }
    Ok(())
}

pub(crate) fn generate_websocket_accept_value(key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(WEBSOCKET_UUID.as_bytes());
    BASE64_STANDARD.encode(sha1.finalize())
}

pub fn build_login_frame(credentials: &Credentials, timestamp: u64) -> String {
    format!(
        r#"{{"op":"login","args":[{{"apiKey":"{}","passphrase":"{}","timestamp":{},"sign":"{}"}}]}}"#,
        credentials.api_key, credentials.passphrase, timestamp, credentials.sign,
    )
}

/// Subscribe frame for the order channel. An empty `inst_id` is left out of
/// the args object entirely.
pub fn build_subscribe_frame(channel: &str, inst_type: &str, inst_id: &str) -> String {
    let inst_id_part = if inst_id.is_empty() {
        String::new()
    } else {
        format!(r#","instId":"{}""#, inst_id)
    };
    format!(
        r#"{{"op":"subscribe","args":[{{"channel":"{}","instType":"{}"{}}}]}}"#,
        channel, inst_type, inst_id_part,
    )
}
