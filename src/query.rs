//! Query-string helpers for reading and rewriting URL parameters.
//!
//! URLs are treated as plain strings of the form `base?k1=v1&k2=v2#fragment`.
//! Nothing here validates schemes or hosts; relative paths such as
//! `/json/count?query=x` work the same as absolute URLs.

use crate::constants::query::{
    ALT_PAIR_DELIMITER, FRAGMENT_DELIMITER, KEY_VALUE_DELIMITER, PAIR_DELIMITER, QUERY_DELIMITER,
};

/// A URL split into base, query string, and fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct UrlParts<'a> {
    base: &'a str,
    query: Option<&'a str>,
    fragment: Option<&'a str>,
}

impl<'a> UrlParts<'a> {
    fn parse(url: &'a str) -> Self {
        let (before_fragment, fragment) = match url.split_once(FRAGMENT_DELIMITER) {
            Some((head, fragment)) => (head, Some(fragment)),
            None => (url, None),
        };
        let (base, query) = match before_fragment.split_once(QUERY_DELIMITER) {
            Some((base, query)) => (base, Some(query)),
            None => (before_fragment, None),
        };
        Self {
            base,
            query,
            fragment,
        }
    }

    fn push_fragment(&self, out: &mut String) {
        if let Some(fragment) = self.fragment
            && !fragment.is_empty()
        {
            out.push(FRAGMENT_DELIMITER);
            out.push_str(fragment);
        }
    }
}

/// Return the decoded value of the first `name` parameter in `url`.
///
/// Returns `Some("")` when the parameter is present without a value and
/// `None` when it does not occur. `name` is matched literally. Values are
/// decoded by turning `+` into a space and then percent-decoding.
pub fn get_parameter_by_name(name: &str, url: &str) -> Option<String> {
    for (idx, ch) in url.char_indices() {
        if ch != QUERY_DELIMITER && ch != PAIR_DELIMITER {
            continue;
        }
        let Some(after) = url[idx + ch.len_utf8()..].strip_prefix(name) else {
            continue;
        };
        match after.chars().next() {
            None => return Some(String::new()),
            Some(next) if next == PAIR_DELIMITER || next == FRAGMENT_DELIMITER => {
                return Some(String::new());
            }
            Some(KEY_VALUE_DELIMITER) => {
                let raw = &after[KEY_VALUE_DELIMITER.len_utf8()..];
                let end = raw
                    .find(|c: char| c == PAIR_DELIMITER || c == FRAGMENT_DELIMITER)
                    .unwrap_or(raw.len());
                return Some(decode_component(&raw[..end].replace('+', " ")));
            }
            Some(_) => continue,
        }
    }
    None
}

/// Remove every query pair starting with `encode_component(name) + "="`.
///
/// Pairs may be separated by `&` or `;` and are re-joined with `&`. The `?`
/// is dropped when no pairs remain. A URL without a query string is
/// returned unchanged.
pub fn remove_url_parameter(url: &str, name: &str) -> String {
    let parts = UrlParts::parse(url);
    let Some(query) = parts.query else {
        return url.to_string();
    };
    let mut prefix = encode_component(name);
    prefix.push(KEY_VALUE_DELIMITER);

    let kept: Vec<&str> = query
        .split([PAIR_DELIMITER, ALT_PAIR_DELIMITER])
        .filter(|pair| !pair.starts_with(&prefix))
        .collect();

    let mut out = String::with_capacity(url.len());
    out.push_str(parts.base);
    for (idx, pair) in kept.iter().enumerate() {
        out.push(if idx == 0 { QUERY_DELIMITER } else { PAIR_DELIMITER });
        out.push_str(pair);
    }
    parts.push_fragment(&mut out);
    out
}

/// Set `name=value` in `url`, replacing any previous value.
///
/// Other pairs keep their relative order; the updated pair is appended after
/// them and the fragment (if any) follows the new value. Empty pairs are
/// dropped rather than carried over, so `/p?&b=2` becomes `/p?b=2&a=1`. `value` is written
/// as given; callers encode it when needed.
pub fn update_url_parameter(url: &str, name: &str, value: &str) -> String {
    let parts = UrlParts::parse(url);
    let mut out = String::with_capacity(url.len() + name.len() + value.len() + 2);
    out.push_str(parts.base);
    out.push(QUERY_DELIMITER);

    if let Some(query) = parts.query {
        for pair in query.split(PAIR_DELIMITER) {
            if pair.is_empty() || pair_key(pair) == name {
                continue;
            }
            out.push_str(pair);
            out.push(PAIR_DELIMITER);
        }
    }
    out.push_str(name);
    out.push(KEY_VALUE_DELIMITER);
    out.push_str(value);
    parts.push_fragment(&mut out);
    out
}

fn pair_key(pair: &str) -> &str {
    pair.split_once(KEY_VALUE_DELIMITER)
        .map(|(key, _)| key)
        .unwrap_or(pair)
}

/// Percent-encode everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
pub fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if is_unreserved(byte) {
            out.push(byte as char);
        } else {
            out.push('%');
            out.push(hex_digit(byte >> 4));
            out.push(hex_digit(byte & 0x0f));
        }
    }
    out
}

/// Percent-decode `encoded`.
///
/// Escapes that are not followed by two hex digits are kept literally, and
/// byte sequences that do not form valid UTF-8 are replaced with U+FFFD.
pub fn decode_component(encoded: &str) -> String {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%'
            && idx + 2 < bytes.len()
            && let (Some(hi), Some(lo)) = (hex_value(bytes[idx + 1]), hex_value(bytes[idx + 2]))
        {
            decoded.push((hi << 4) | lo);
            idx += 3;
            continue;
        }
        decoded.push(bytes[idx]);
        idx += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(byte, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')')
}

fn hex_digit(nibble: u8) -> char {
    char::from_digit(u32::from(nibble), 16)
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or('0')
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|value| value as u8)
}
