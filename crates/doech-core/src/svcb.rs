//! SVCB/HTTPS RDATA decoding (RFC 9460).
//!
//! Turns the raw RDATA of a single SVCB or HTTPS resource record into a
//! [`SvcbHttpsRecord`]. Decoding is pure: no I/O, no shared state.
//!
//! # Example
//!
//! ```rust
//! use doech_core::models::RecordType;
//! use doech_core::svcb::{SvcParamKey, SvcParamValue, SvcbMode, decode};
//!
//! // priority 1, target ".", alpn=h2
//! let rdata = [0x00, 0x01, 0x00, 0x00, 0x01, 0x00, 0x03, 0x02, b'h', b'2'];
//! let record = decode("example.com", RecordType::Https, &rdata).unwrap();
//!
//! assert_eq!(record.priority(), 1);
//! assert_eq!(record.effective_target(), "example.com");
//! let SvcbMode::Service { params, .. } = &record.mode else { unreachable!() };
//! assert_eq!(
//!     params.get(SvcParamKey::Alpn),
//!     Some(&SvcParamValue::Alpn(vec!["h2".to_string()]))
//! );
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::models::RecordType;

/// Maximum wire length of a domain name, including length octets.
const MAX_NAME_LEN: usize = 255;

/// Wire-format violations found while decoding SVCB/HTTPS RDATA.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated {what} at offset {offset}: need {needed} bytes, {remaining} remaining")]
    Truncated {
        what: &'static str,
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("{count} trailing bytes at offset {offset} after the last parameter")]
    TrailingBytes { offset: usize, count: usize },

    #[error("name compression pointer at offset {0} cannot be followed inside RDATA")]
    CompressionPointer(usize),

    #[error("reserved label type {label_type:#04x} at offset {offset}")]
    ReservedLabelType { label_type: u8, offset: usize },

    #[error("domain name exceeds {MAX_NAME_LEN} octets")]
    NameTooLong,

    #[error("invalid {key} value: {reason}")]
    InvalidValue { key: SvcParamKey, reason: String },

    #[error("{0} records are not SVCB-compatible")]
    UnsupportedType(RecordType),
}

// ---------------------------------------------------------------------------
// Parameter keys
// ---------------------------------------------------------------------------

/// SvcParamKey registry entry.
///
/// Registered keys get their own variant; everything else, including the
/// reserved key 65535, is carried as [`SvcParamKey::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SvcParamKey {
    Mandatory,
    Alpn,
    NoDefaultAlpn,
    Port,
    Ipv4Hint,
    Ech,
    Ipv6Hint,
    DohPath,
    Ohttp,
    Unknown(u16),
}

impl SvcParamKey {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => SvcParamKey::Mandatory,
            1 => SvcParamKey::Alpn,
            2 => SvcParamKey::NoDefaultAlpn,
            3 => SvcParamKey::Port,
            4 => SvcParamKey::Ipv4Hint,
            5 => SvcParamKey::Ech,
            6 => SvcParamKey::Ipv6Hint,
            7 => SvcParamKey::DohPath,
            8 => SvcParamKey::Ohttp,
            other => SvcParamKey::Unknown(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            SvcParamKey::Mandatory => 0,
            SvcParamKey::Alpn => 1,
            SvcParamKey::NoDefaultAlpn => 2,
            SvcParamKey::Port => 3,
            SvcParamKey::Ipv4Hint => 4,
            SvcParamKey::Ech => 5,
            SvcParamKey::Ipv6Hint => 6,
            SvcParamKey::DohPath => 7,
            SvcParamKey::Ohttp => 8,
            SvcParamKey::Unknown(code) => code,
        }
    }

    fn name(self) -> Option<&'static str> {
        match self {
            SvcParamKey::Mandatory => Some("mandatory"),
            SvcParamKey::Alpn => Some("alpn"),
            SvcParamKey::NoDefaultAlpn => Some("no-default-alpn"),
            SvcParamKey::Port => Some("port"),
            SvcParamKey::Ipv4Hint => Some("ipv4hint"),
            SvcParamKey::Ech => Some("ech"),
            SvcParamKey::Ipv6Hint => Some("ipv6hint"),
            SvcParamKey::DohPath => Some("dohpath"),
            SvcParamKey::Ohttp => Some("ohttp"),
            SvcParamKey::Unknown(_) => None,
        }
    }
}

impl fmt::Display for SvcParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "key{}", self.code()),
        }
    }
}

impl Ord for SvcParamKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.code().cmp(&other.code())
    }
}

impl PartialOrd for SvcParamKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for SvcParamKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Parameter values
// ---------------------------------------------------------------------------

/// A decoded SvcParamValue, typed according to its key's value grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SvcParamValue {
    Mandatory(Vec<SvcParamKey>),
    Alpn(Vec<String>),
    NoDefaultAlpn,
    Port(u16),
    Ipv4Hint(Vec<Ipv4Addr>),
    /// ECHConfigList, kept as raw bytes and rendered as base64.
    Ech(Vec<u8>),
    Ipv6Hint(Vec<Ipv6Addr>),
    DohPath(String),
    Ohttp,
    Unknown(Vec<u8>),
}

impl SvcParamValue {
    fn decode(key: SvcParamKey, data: &[u8]) -> Result<Self, DecodeError> {
        let invalid = |reason: &str| DecodeError::InvalidValue {
            key,
            reason: reason.to_string(),
        };

        match key {
            SvcParamKey::Mandatory => {
                if data.is_empty() || data.len() % 2 != 0 {
                    return Err(invalid("expected a non-empty list of 16-bit keys"));
                }
                Ok(SvcParamValue::Mandatory(
                    data.chunks_exact(2)
                        .map(|c| SvcParamKey::from_code(u16::from_be_bytes([c[0], c[1]])))
                        .collect(),
                ))
            }
            SvcParamKey::Alpn => {
                let mut ids = Vec::new();
                let mut rest = data;
                while let Some((&len, tail)) = rest.split_first() {
                    let len = len as usize;
                    if len == 0 {
                        return Err(invalid("empty alpn-id"));
                    }
                    if len > tail.len() {
                        return Err(invalid("alpn-id overruns the value"));
                    }
                    ids.push(String::from_utf8_lossy(&tail[..len]).into_owned());
                    rest = &tail[len..];
                }
                if ids.is_empty() {
                    return Err(invalid("expected at least one alpn-id"));
                }
                Ok(SvcParamValue::Alpn(ids))
            }
            SvcParamKey::NoDefaultAlpn | SvcParamKey::Ohttp => {
                if !data.is_empty() {
                    return Err(invalid("expected an empty value"));
                }
                Ok(if key == SvcParamKey::Ohttp {
                    SvcParamValue::Ohttp
                } else {
                    SvcParamValue::NoDefaultAlpn
                })
            }
            SvcParamKey::Port => match data {
                [hi, lo] => Ok(SvcParamValue::Port(u16::from_be_bytes([*hi, *lo]))),
                _ => Err(invalid("expected exactly 2 bytes")),
            },
            SvcParamKey::Ipv4Hint => {
                if data.is_empty() || data.len() % 4 != 0 {
                    return Err(invalid("expected a non-empty list of IPv4 addresses"));
                }
                Ok(SvcParamValue::Ipv4Hint(
                    data.chunks_exact(4)
                        .map(|c| Ipv4Addr::new(c[0], c[1], c[2], c[3]))
                        .collect(),
                ))
            }
            SvcParamKey::Ipv6Hint => {
                if data.is_empty() || data.len() % 16 != 0 {
                    return Err(invalid("expected a non-empty list of IPv6 addresses"));
                }
                Ok(SvcParamValue::Ipv6Hint(
                    data.chunks_exact(16)
                        .map(|c| {
                            let mut octets = [0u8; 16];
                            octets.copy_from_slice(c);
                            Ipv6Addr::from(octets)
                        })
                        .collect(),
                ))
            }
            SvcParamKey::Ech => Ok(SvcParamValue::Ech(data.to_vec())),
            SvcParamKey::DohPath => String::from_utf8(data.to_vec())
                .map(SvcParamValue::DohPath)
                .map_err(|_| invalid("URI template is not UTF-8")),
            SvcParamKey::Unknown(_) => Ok(SvcParamValue::Unknown(data.to_vec())),
        }
    }
}

impl fmt::Display for SvcParamValue {
    /// Presentation-format rendering of the value (without the `key=` part).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SvcParamValue::Mandatory(keys) => write_joined(f, keys),
            SvcParamValue::Alpn(ids) => {
                let escaped: Vec<String> = ids
                    .iter()
                    .map(|id| id.replace('\\', "\\\\").replace(',', "\\,"))
                    .collect();
                f.write_str(&escaped.join(","))
            }
            SvcParamValue::NoDefaultAlpn | SvcParamValue::Ohttp => Ok(()),
            SvcParamValue::Port(port) => write!(f, "{port}"),
            SvcParamValue::Ipv4Hint(addrs) => write_joined(f, addrs),
            SvcParamValue::Ipv6Hint(addrs) => write_joined(f, addrs),
            SvcParamValue::Ech(bytes) => f.write_str(&BASE64.encode(bytes)),
            SvcParamValue::DohPath(path) => f.write_str(path),
            SvcParamValue::Unknown(bytes) => f.write_str(&hex::encode(bytes)),
        }
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Serialize for SvcParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SvcParamValue::Mandatory(keys) => keys.serialize(serializer),
            SvcParamValue::Alpn(ids) => ids.serialize(serializer),
            SvcParamValue::NoDefaultAlpn | SvcParamValue::Ohttp => serializer.serialize_bool(true),
            SvcParamValue::Port(port) => serializer.serialize_u16(*port),
            SvcParamValue::Ipv4Hint(addrs) => serialize_display_seq(serializer, addrs),
            SvcParamValue::Ipv6Hint(addrs) => serialize_display_seq(serializer, addrs),
            SvcParamValue::Ech(_) | SvcParamValue::DohPath(_) | SvcParamValue::Unknown(_) => {
                serializer.collect_str(self)
            }
        }
    }
}

fn serialize_display_seq<S: Serializer, T: fmt::Display>(
    serializer: S,
    items: &[T],
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(items.len()))?;
    for item in items {
        seq.serialize_element(&item.to_string())?;
    }
    seq.end()
}

/// Ordered parameter map of a ServiceMode record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SvcParams(BTreeMap<SvcParamKey, SvcParamValue>);

impl SvcParams {
    pub fn get(&self, key: SvcParamKey) -> Option<&SvcParamValue> {
        self.0.get(&key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SvcParamKey, &SvcParamValue)> {
        self.0.iter()
    }

    pub fn has_ech(&self) -> bool {
        self.0.contains_key(&SvcParamKey::Ech)
    }

    pub fn alpn(&self) -> Option<&[String]> {
        match self.get(SvcParamKey::Alpn) {
            Some(SvcParamValue::Alpn(ids)) => Some(ids),
            _ => None,
        }
    }

    /// Inserts a value, returning true if the key was already present.
    fn insert(&mut self, key: SvcParamKey, value: SvcParamValue) -> bool {
        self.0.insert(key, value).is_some()
    }
}

impl fmt::Display for SvcParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match value {
                SvcParamValue::NoDefaultAlpn | SvcParamValue::Ohttp => write!(f, "{key}")?,
                _ => write!(f, "{key}={value}")?,
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// AliasMode or ServiceMode, discriminated by priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SvcbMode {
    /// Priority 0: redirect to another name, no parameters.
    Alias { target: String },
    Service {
        priority: u16,
        target: String,
        params: SvcParams,
        /// Keys seen more than once on the wire; the last value was kept.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        duplicate_keys: Vec<SvcParamKey>,
    },
}

/// One decoded SVCB or HTTPS record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SvcbHttpsRecord {
    pub owner: String,
    pub rr_type: RecordType,
    #[serde(flatten)]
    pub mode: SvcbMode,
}

impl SvcbHttpsRecord {
    pub fn priority(&self) -> u16 {
        match &self.mode {
            SvcbMode::Alias { .. } => 0,
            SvcbMode::Service { priority, .. } => *priority,
        }
    }

    pub fn target(&self) -> &str {
        match &self.mode {
            SvcbMode::Alias { target } | SvcbMode::Service { target, .. } => target,
        }
    }

    pub fn params(&self) -> Option<&SvcParams> {
        match &self.mode {
            SvcbMode::Alias { .. } => None,
            SvcbMode::Service { params, .. } => Some(params),
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.mode, SvcbMode::Alias { .. })
    }

    /// An AliasMode record pointing at the root signals that the service
    /// is not available.
    pub fn is_unavailable(&self) -> bool {
        self.is_alias() && self.target() == "."
    }

    /// Target with the ServiceMode root shorthand (`.`) resolved to the
    /// owner name.
    pub fn effective_target(&self) -> &str {
        match &self.mode {
            SvcbMode::Service { target, .. } if target == "." => &self.owner,
            _ => self.target(),
        }
    }
}

/// Decodes the RDATA of one SVCB or HTTPS record owned by `owner`.
pub fn decode(
    owner: &str,
    rr_type: RecordType,
    rdata: &[u8],
) -> Result<SvcbHttpsRecord, DecodeError> {
    if !rr_type.is_svcb_compatible() {
        return Err(DecodeError::UnsupportedType(rr_type));
    }

    let mut reader = Reader::new(rdata);
    let priority = reader.read_u16("priority")?;
    let target = reader.read_name()?;
    let owner = strip_root(owner);

    if priority == 0 {
        if reader.remaining() > 0 {
            tracing::debug!(
                %owner,
                ignored = reader.remaining(),
                "Ignoring parameters on AliasMode record"
            );
        }
        return Ok(SvcbHttpsRecord {
            owner,
            rr_type,
            mode: SvcbMode::Alias { target },
        });
    }

    let mut params = SvcParams::default();
    let mut duplicate_keys = Vec::new();
    while reader.remaining() > 0 {
        if reader.remaining() < 4 {
            return Err(DecodeError::TrailingBytes {
                offset: reader.pos,
                count: reader.remaining(),
            });
        }
        let key = SvcParamKey::from_code(reader.read_u16("parameter key")?);
        let len = reader.read_u16("parameter length")? as usize;
        let value = SvcParamValue::decode(key, reader.take(len, "parameter value")?)?;

        if params.insert(key, value) && !duplicate_keys.contains(&key) {
            tracing::debug!(%owner, %key, "Duplicate SvcParamKey, keeping last value");
            duplicate_keys.push(key);
        }
    }

    Ok(SvcbHttpsRecord {
        owner,
        rr_type,
        mode: SvcbMode::Service {
            priority,
            target,
            params,
            duplicate_keys,
        },
    })
}

fn strip_root(name: &str) -> String {
    match name.strip_suffix('.') {
        Some("") | None => name.to_string(),
        Some(stripped) => stripped.to_string(),
    }
}

/// Bounds-checked cursor over the RDATA.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated {
                what,
                offset: self.pos,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u16(&mut self, what: &'static str) -> Result<u16, DecodeError> {
        let bytes = self.take(2, what)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads an uncompressed domain name in presentation form, without the
    /// trailing root dot. The root name itself is returned as `.`.
    fn read_name(&mut self) -> Result<String, DecodeError> {
        let mut labels: Vec<String> = Vec::new();
        let mut wire_len = 0usize;

        loop {
            let offset = self.pos;
            let len = self.take(1, "label length")?[0];
            match len & 0xC0 {
                0x00 => {}
                0xC0 => return Err(DecodeError::CompressionPointer(offset)),
                label_type => {
                    return Err(DecodeError::ReservedLabelType { label_type, offset });
                }
            }

            wire_len += 1 + len as usize;
            if wire_len > MAX_NAME_LEN {
                return Err(DecodeError::NameTooLong);
            }
            if len == 0 {
                break;
            }
            labels.push(escape_label(self.take(len as usize, "label")?));
        }

        if labels.is_empty() {
            Ok(".".to_string())
        } else {
            Ok(labels.join("."))
        }
    }
}

fn escape_label(label: &[u8]) -> String {
    let mut out = String::with_capacity(label.len());
    for &b in label {
        match b {
            b'.' | b'\\' | b'"' | b'(' | b')' | b';' | b'@' | b'$' => {
                out.push('\\');
                out.push(b as char);
            }
            0x21..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\{b:03}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encodes a presentation name as an uncompressed wire name.
    fn wire_name(name: &str) -> Vec<u8> {
        let mut out = Vec::new();
        for label in name.trim_end_matches('.').split('.').filter(|l| !l.is_empty()) {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        out.push(0);
        out
    }

    fn rdata(priority: u16, target: &str, params: &[(u16, &[u8])]) -> Vec<u8> {
        let mut out = priority.to_be_bytes().to_vec();
        out.extend(wire_name(target));
        for (key, value) in params {
            out.extend_from_slice(&key.to_be_bytes());
            out.extend_from_slice(&(value.len() as u16).to_be_bytes());
            out.extend_from_slice(value);
        }
        out
    }

    #[test]
    fn alias_mode_has_no_params_and_no_trailing_dot() {
        let bytes = rdata(0, "cdn.example.net.", &[]);
        let record = decode("example.com.", RecordType::Https, &bytes).unwrap();

        assert!(record.is_alias());
        assert_eq!(record.priority(), 0);
        assert_eq!(record.target(), "cdn.example.net");
        assert_eq!(record.owner, "example.com");
        assert!(record.params().is_none());
    }

    #[test]
    fn alias_mode_ignores_trailing_params() {
        let bytes = rdata(0, "svc.example.net", &[(3, &[0x01, 0xBB])]);
        let record = decode("example.com", RecordType::Svcb, &bytes).unwrap();
        assert_eq!(
            record.mode,
            SvcbMode::Alias {
                target: "svc.example.net".into()
            }
        );
    }

    #[test]
    fn alias_to_root_means_unavailable() {
        let bytes = rdata(0, ".", &[]);
        let record = decode("example.com", RecordType::Https, &bytes).unwrap();
        assert!(record.is_unavailable());
        assert_eq!(record.target(), ".");
    }

    #[test]
    fn service_mode_decodes_well_known_keys() {
        let alpn: &[u8] = &[2, b'h', b'2', 2, b'h', b'3'];
        let mut v6 = [0u8; 16];
        v6[0] = 0x20;
        v6[1] = 0x01;
        v6[2] = 0x0d;
        v6[3] = 0xb8;
        v6[15] = 0x01;
        let bytes = rdata(
            1,
            ".",
            &[
                (0, &[0x00, 0x01]),
                (1, alpn),
                (2, &[]),
                (3, &[0x20, 0xFB]),
                (4, &[192, 0, 2, 1, 192, 0, 2, 2]),
                (5, &[0xDE, 0xAD, 0xBE, 0xEF]),
                (6, &v6),
            ],
        );
        let record = decode("example.com", RecordType::Https, &bytes).unwrap();
        let params = record.params().unwrap();

        assert_eq!(record.priority(), 1);
        assert_eq!(params.len(), 7);
        assert_eq!(
            params.get(SvcParamKey::Mandatory),
            Some(&SvcParamValue::Mandatory(vec![SvcParamKey::Alpn]))
        );
        assert_eq!(params.alpn(), Some(&["h2".to_string(), "h3".to_string()][..]));
        assert_eq!(
            params.get(SvcParamKey::NoDefaultAlpn),
            Some(&SvcParamValue::NoDefaultAlpn)
        );
        assert_eq!(params.get(SvcParamKey::Port), Some(&SvcParamValue::Port(8443)));
        assert_eq!(
            params.get(SvcParamKey::Ipv4Hint).unwrap().to_string(),
            "192.0.2.1,192.0.2.2"
        );
        assert_eq!(params.get(SvcParamKey::Ech).unwrap().to_string(), "3q2+7w==");
        assert_eq!(
            params.get(SvcParamKey::Ipv6Hint).unwrap().to_string(),
            "2001:db8::1"
        );
        assert!(params.has_ech());
    }

    #[test]
    fn service_mode_root_target_resolves_to_owner() {
        let bytes = rdata(1, ".", &[(1, &[2, b'h', b'2'])]);
        let record = decode("www.example.com.", RecordType::Https, &bytes).unwrap();
        assert_eq!(record.target(), ".");
        assert_eq!(record.effective_target(), "www.example.com");

        let bytes = rdata(2, "pool.example.net", &[]);
        let record = decode("www.example.com", RecordType::Https, &bytes).unwrap();
        assert_eq!(record.effective_target(), "pool.example.net");
    }

    #[test]
    fn unknown_keys_are_kept_raw() {
        let bytes = rdata(1, "svc.example.com", &[(65001, b"hello"), (65535, &[])]);
        let record = decode("example.com", RecordType::Svcb, &bytes).unwrap();
        let params = record.params().unwrap();

        assert_eq!(params.len(), 2);
        assert_eq!(
            params.get(SvcParamKey::Unknown(65001)),
            Some(&SvcParamValue::Unknown(b"hello".to_vec()))
        );
        assert_eq!(
            params.get(SvcParamKey::from_code(65535)),
            Some(&SvcParamValue::Unknown(vec![]))
        );
    }

    #[test]
    fn duplicate_keys_last_wins_and_are_flagged() {
        let bytes = rdata(
            1,
            ".",
            &[(3, &[0x01, 0xBB]), (1, &[2, b'h', b'2']), (3, &[0x20, 0xFB])],
        );
        let record = decode("example.com", RecordType::Https, &bytes).unwrap();

        let SvcbMode::Service {
            params,
            duplicate_keys,
            ..
        } = &record.mode
        else {
            panic!("expected service mode");
        };
        assert_eq!(params.len(), 2);
        assert_eq!(params.get(SvcParamKey::Port), Some(&SvcParamValue::Port(8443)));
        assert_eq!(duplicate_keys, &vec![SvcParamKey::Port]);
    }

    #[test]
    fn value_longer_than_buffer_is_truncated_error() {
        let mut bytes = rdata(1, ".", &[]);
        bytes.extend_from_slice(&[0x00, 0x01, 0x00, 0x10, 2, b'h', b'2']);
        let err = decode("example.com", RecordType::Https, &bytes).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Truncated {
                what: "parameter value",
                needed: 16,
                remaining: 3,
                ..
            }
        ));
    }

    #[test]
    fn dangling_bytes_after_last_param_are_rejected() {
        let mut bytes = rdata(1, ".", &[(3, &[0x01, 0xBB])]);
        bytes.extend_from_slice(&[0x00, 0x01]);
        let err = decode("example.com", RecordType::Https, &bytes).unwrap_err();
        assert_eq!(err, DecodeError::TrailingBytes { offset: 9, count: 2 });
    }

    #[test]
    fn truncated_priority_and_name_are_errors() {
        assert!(matches!(
            decode("example.com", RecordType::Https, &[0x00]),
            Err(DecodeError::Truncated { what: "priority", .. })
        ));
        assert!(matches!(
            decode("example.com", RecordType::Https, &[0x00, 0x01, 0x03, b'c', b'o']),
            Err(DecodeError::Truncated { what: "label", .. })
        ));
        assert!(matches!(
            decode("example.com", RecordType::Https, &[0x00, 0x01]),
            Err(DecodeError::Truncated {
                what: "label length",
                ..
            })
        ));
    }

    #[test]
    fn compression_pointer_is_rejected() {
        let err = decode("example.com", RecordType::Https, &[0x00, 0x01, 0xC0, 0x0C]).unwrap_err();
        assert_eq!(err, DecodeError::CompressionPointer(2));
    }

    #[test]
    fn reserved_label_type_is_rejected() {
        let err = decode("example.com", RecordType::Https, &[0x00, 0x01, 0x41]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::ReservedLabelType {
                label_type: 0x40,
                offset: 2
            }
        );
    }

    #[test]
    fn overlong_name_is_rejected() {
        let mut bytes = vec![0x00, 0x01];
        for _ in 0..5 {
            bytes.push(63);
            bytes.extend(std::iter::repeat_n(b'a', 63));
        }
        bytes.push(0);
        assert_eq!(
            decode("example.com", RecordType::Https, &bytes).unwrap_err(),
            DecodeError::NameTooLong
        );
    }

    #[test]
    fn malformed_values_are_rejected() {
        let cases: &[(u16, &[u8])] = &[
            (0, &[0x00]),
            (1, &[]),
            (1, &[0]),
            (1, &[5, b'h', b'2']),
            (2, &[0x01]),
            (3, &[0x01]),
            (4, &[192, 0, 2]),
            (6, &[0u8; 15]),
            (8, &[0x00]),
        ];
        for (key, value) in cases {
            let bytes = rdata(1, ".", &[(*key, *value)]);
            let err = decode("example.com", RecordType::Https, &bytes).unwrap_err();
            assert!(
                matches!(err, DecodeError::InvalidValue { .. }),
                "key {key} with {value:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn non_svcb_types_are_unsupported() {
        let bytes = rdata(0, ".", &[]);
        assert_eq!(
            decode("example.com", RecordType::A, &bytes).unwrap_err(),
            DecodeError::UnsupportedType(RecordType::A)
        );
    }

    #[test]
    fn labels_with_special_bytes_are_escaped() {
        let bytes = [0x00, 0x00, 0x03, b'a', b'.', 0x07, 0x03, b'c', b'o', b'm', 0x00];
        let record = decode("example.com", RecordType::Svcb, &bytes).unwrap();
        assert_eq!(record.target(), "a\\.\\007.com");
    }

    #[test]
    fn serializes_with_registered_key_names() {
        let bytes = rdata(
            1,
            ".",
            &[(1, &[2, b'h', b'2']), (5, &[0x01, 0x02]), (65001, &[0xAB])],
        );
        let record = decode("example.com", RecordType::Https, &bytes).unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "owner": "example.com",
                "rr_type": "HTTPS",
                "mode": "service",
                "priority": 1,
                "target": ".",
                "params": {"alpn": ["h2"], "ech": "AQI=", "key65001": "ab"}
            })
        );
    }

    #[test]
    fn params_render_in_presentation_format() {
        let bytes = rdata(
            1,
            ".",
            &[(1, &[2, b'h', b'2', 2, b'h', b'3']), (2, &[]), (3, &[0x01, 0xBB])],
        );
        let record = decode("example.com", RecordType::Https, &bytes).unwrap();
        assert_eq!(
            record.params().unwrap().to_string(),
            "alpn=h2,h3 no-default-alpn port=443"
        );
    }
}
