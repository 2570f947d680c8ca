//! Listing response parsing
//!
//! Enumeration responses are small, flat XML documents. The parser scans for
//! the handful of elements the client needs instead of building a DOM.

use chrono::{DateTime, Utc};

use crate::error::{Result, StorageError};

/// One blob from a blob enumeration page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobItem {
    pub name: String,
    pub content_length: i64,
    pub last_modified: DateTime<Utc>,
}

/// One page of a blob enumeration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobPage {
    pub blobs: Vec<BlobItem>,
    /// Virtual directory names (`BlobPrefix/Name`), delimiter included
    pub prefixes: Vec<String>,
    /// Empty on the last page
    pub next_marker: String,
}

/// One page of a container enumeration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerPage {
    pub names: Vec<String>,
    pub next_marker: String,
}

pub fn parse_blob_page(xml: &str) -> Result<BlobPage> {
    let mut page = BlobPage {
        next_marker: next_marker(xml),
        ..BlobPage::default()
    };

    for blob in elements(xml, "Blob") {
        let name = required(blob, "Name")?;
        let content_length = required(blob, "Content-Length")?
            .trim()
            .parse::<i64>()
            .map_err(|e| malformed(format!("bad Content-Length for '{}': {}", name, e)))?;
        let last_modified = parse_http_date(&required(blob, "Last-Modified")?)?;

        page.blobs.push(BlobItem {
            name,
            content_length,
            last_modified,
        });
    }

    for prefix in elements(xml, "BlobPrefix") {
        page.prefixes.push(required(prefix, "Name")?);
    }

    Ok(page)
}

pub fn parse_container_page(xml: &str) -> Result<ContainerPage> {
    let names = elements(xml, "Container")
        .into_iter()
        .map(|container| required(container, "Name"))
        .collect::<Result<Vec<_>>>()?;

    Ok(ContainerPage {
        names,
        next_marker: next_marker(xml),
    })
}

/// RFC 1123 date as used in `Last-Modified`
pub fn parse_http_date(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| malformed(format!("bad date '{}': {}", value, e)))
}

fn next_marker(xml: &str) -> String {
    first(xml, "NextMarker")
        .map(|marker| unescape(marker.trim()))
        .unwrap_or_default()
}

fn required(xml: &str, tag: &str) -> Result<String> {
    first(xml, tag)
        .map(unescape)
        .ok_or_else(|| malformed(format!("missing <{}> element", tag)))
}

fn malformed(detail: String) -> StorageError {
    StorageError::backend(format!("Malformed listing response: {}", detail))
}

/// Inner text of every `<tag>` element, in document order
///
/// Matches `<tag>`, `<tag attr="...">` and `<tag/>` (empty content), but not
/// longer names sharing the prefix such as `<tags>`. Elements must not nest
/// inside themselves.
fn elements<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut found = Vec::new();
    let mut rest = xml;

    while let Some(start) = rest.find(&open) {
        let after_name = &rest[start + open.len()..];
        match after_name.chars().next() {
            Some('>') | Some(' ') | Some('/') | Some('\t') | Some('\r') | Some('\n') => {}
            _ => {
                rest = after_name;
                continue;
            }
        }

        let Some(tag_end) = after_name.find('>') else {
            break;
        };
        if after_name[..tag_end].ends_with('/') {
            found.push("");
            rest = &after_name[tag_end + 1..];
            continue;
        }

        let body = &after_name[tag_end + 1..];
        let Some(end) = body.find(&close) else {
            break;
        };
        found.push(&body[..end]);
        rest = &body[end + close.len()..];
    }

    found
}

fn first<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    elements(xml, tag).into_iter().next()
}

/// Decodes the predefined entities and numeric character references in one
/// pass; anything unrecognised is kept verbatim
fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        result.push_str(&rest[..start]);
        let candidate = &rest[start..];
        let decoded = candidate
            .find(';')
            .and_then(|end| entity(&candidate[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                result.push(c);
                rest = &candidate[end + 1..];
            }
            None => {
                result.push('&');
                rest = &candidate[1..];
            }
        }
    }
    result.push_str(rest);
    result
}

fn entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "amp" => Some('&'),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}
