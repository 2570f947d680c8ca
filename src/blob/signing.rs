//! Shared-key request signing
//!
//! The signature is an HMAC-SHA256 over a canonical string built from the
//! request, keyed with the base64-decoded account key. The string layout must
//! match the server's byte for byte:
//!
//! ```text
//! VERB \n Content-Encoding \n Content-Language \n Content-Length \n
//! Content-MD5 \n Content-Type \n Date \n If-Modified-Since \n If-Match \n
//! If-None-Match \n If-Unmodified-Since \n Range \n
//! CanonicalizedHeaders \n CanonicalizedResource
//! ```

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use super::crypto::HmacProvider;
use super::transport::HttpRequest;
use crate::constants::{CUSTOM_HEADER_PREFIX, SHARED_KEY_SCHEME};

/// Standard headers that take part in the string-to-sign, in order
const SIGNED_STANDARD_HEADERS: [&str; 11] = [
    "Content-Encoding",
    "Content-Language",
    "Content-Length",
    "Content-MD5",
    "Content-Type",
    "Date",
    "If-Modified-Since",
    "If-Match",
    "If-None-Match",
    "If-Unmodified-Since",
    "Range",
];

/// Everything the signer needs besides the request itself
#[derive(Clone)]
pub struct SigningContext {
    pub account_name: String,
    /// Decoded account key
    pub account_key: Vec<u8>,
    /// Headers sent with every request (x-ms-version, x-ms-client-request-id)
    pub default_headers: Vec<(String, String)>,
}

/// RFC 1123 timestamp, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn format_rfc1123(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// `x-ms-*` headers of the request and the client defaults, sorted and joined
///
/// Request values win over defaults with the same name.
pub fn canonicalized_headers(request: &HttpRequest, default_headers: &[(String, String)]) -> String {
    let names: BTreeSet<String> = default_headers
        .iter()
        .chain(request.headers.iter())
        .map(|(name, _)| name.to_ascii_lowercase())
        .filter(|name| name.starts_with(CUSTOM_HEADER_PREFIX))
        .collect();

    names
        .iter()
        .map(|name| {
            let value = request
                .header(name)
                .or_else(|| {
                    default_headers
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(name))
                        .map(|(_, v)| v.as_str())
                })
                .unwrap_or_default();
            format!("{}:{}", name, value.replace('\n', " ").trim())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `/account/path` followed by one `key:value[,value]` line per query parameter
///
/// Parameters are unescaped and their keys lowercased, then sorted by key and
/// value; repeated keys have their values comma-joined.
pub fn canonicalized_resource(account_name: &str, request: &HttpRequest) -> String {
    let mut resource = format!("/{}{}", account_name.trim(), request.absolute_path());

    let mut parameters: Vec<(String, String)> = request
        .query()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let decoded = match urlencoding::decode(pair) {
                Ok(decoded) => decoded.into_owned(),
                Err(_) => pair.to_string(),
            };
            match decoded.split_once('=') {
                Some((key, value)) => (key.to_lowercase(), value.to_string()),
                None => (decoded.to_lowercase(), String::new()),
            }
        })
        .collect();
    parameters.sort();

    // Adjacent after sorting, so grouping only looks at the last key
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in parameters {
        if let Some((last, values)) = grouped.last_mut() {
            if *last == key {
                values.push(value);
                continue;
            }
        }
        grouped.push((key, vec![value]));
    }

    for (key, values) in grouped {
        resource.push('\n');
        resource.push_str(&key);
        resource.push(':');
        resource.push_str(&values.join(","));
    }
    resource
}

/// The exact string the HMAC is computed over
pub fn string_to_sign(request: &HttpRequest, context: &SigningContext) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(SIGNED_STANDARD_HEADERS.len() + 3);
    lines.push(request.method.as_str().to_uppercase());

    for name in SIGNED_STANDARD_HEADERS {
        let value = if name == "Content-Length" {
            content_length(request)
        } else {
            request.header(name).unwrap_or_default().to_string()
        };
        lines.push(value);
    }

    lines.push(canonicalized_headers(request, &context.default_headers));
    lines.push(canonicalized_resource(&context.account_name, request));
    lines.join("\n")
}

/// Content length as signed: empty when zero or absent
fn content_length(request: &HttpRequest) -> String {
    let length = match request.header("Content-Length") {
        Some(value) => value.trim().parse::<usize>().unwrap_or(0),
        None => request.body.len(),
    };
    if length == 0 {
        String::new()
    } else {
        length.to_string()
    }
}

/// Base64 signature of the request as it currently stands
pub fn compute_signature(
    request: &HttpRequest,
    context: &SigningContext,
    crypto: &dyn HmacProvider,
) -> String {
    let string_to_sign = string_to_sign(request, context);
    BASE64.encode(crypto.hmac_sha256(&context.account_key, string_to_sign.as_bytes()))
}

/// Stamps `x-ms-date` with `now` and sets the shared-key `Authorization` header
pub fn sign_request(
    request: &mut HttpRequest,
    context: &SigningContext,
    crypto: &dyn HmacProvider,
    now: DateTime<Utc>,
) {
    request.set_header("x-ms-date", format_rfc1123(now));
    let signature = compute_signature(request, context, crypto);
    request.set_header(
        "Authorization",
        format!(
            "{} {}:{}",
            SHARED_KEY_SCHEME,
            context.account_name.trim(),
            signature
        ),
    );
}
