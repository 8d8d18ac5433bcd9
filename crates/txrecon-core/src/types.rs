//! Shared domain types for the reconciliation pipeline.
//!
//! Contains the inbound filter triple (`TxFilter`), the closed set of data
//! sources (`Source`), the exact nanosecond timestamp (`NanoTimestamp`) and
//! the generic reference-format page (`ReferencePage`) that both providers
//! are normalized into.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::CoreError;

// ==============================================================================
// Filter
// ==============================================================================

/// The three scalar filters every provider query is parameterized by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxFilter {
    #[serde(rename = "payerID")]
    pub payer_id: u64,
    pub query: String,
    #[serde(rename = "accountFrom")]
    pub account_from: u64,
}

impl TxFilter {
    pub fn new(payer_id: u64, query: impl Into<String>, account_from: u64) -> Self {
        Self {
            payer_id,
            query: query.into(),
            account_from,
        }
    }
}

// ==============================================================================
// Source
// ==============================================================================

/// Identifies which upstream a payload or record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// REST explorer; its native shape is the reference format.
    #[serde(rename = "dragonglass")]
    Dragonglass,
    /// GraphQL indexer; needs canonicalization.
    #[serde(rename = "hgraphio")]
    Hgraph,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dragonglass => "dragonglass",
            Self::Hgraph => "hgraphio",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==============================================================================
// Nanosecond Timestamp
// ==============================================================================

const NANOS_PER_SECOND: u64 = 1_000_000_000;
const NANO_DIGITS: usize = 9;

/// Largest integer an IEEE-754 double represents exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// Nanoseconds since the Unix epoch, split into whole seconds and the
/// sub-second remainder so the value never passes through a float.
///
/// Deserializes from a decimal string (`"1700000000123456789"` or
/// `"1700000000.123456789"`) or from a JSON integer. Floats are accepted
/// only when integral and at most [`MAX_SAFE_INTEGER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NanoTimestamp {
    seconds: u64,
    nanos: u32,
}

impl NanoTimestamp {
    pub fn new(seconds: u64, nanos: u32) -> Self {
        let carry = u64::from(nanos) / NANOS_PER_SECOND;
        Self {
            seconds: seconds + carry,
            nanos: (u64::from(nanos) % NANOS_PER_SECOND) as u32,
        }
    }

    pub fn from_total_nanos(total: u64) -> Self {
        Self {
            seconds: total / NANOS_PER_SECOND,
            nanos: (total % NANOS_PER_SECOND) as u32,
        }
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    /// Render as `YYYY-MM-DDTHH:MM:SS.nnnnnnnnnZ`, keeping all nine
    /// fractional digits.
    pub fn to_iso8601(&self) -> Result<String, CoreError> {
        let seconds = i64::try_from(self.seconds)
            .map_err(|_| CoreError::InvalidTimestamp(self.to_string()))?;
        let datetime = OffsetDateTime::from_unix_timestamp(seconds)
            .and_then(|dt| dt.replace_nanosecond(self.nanos))
            .map_err(|_| CoreError::InvalidTimestamp(self.to_string()))?;

        datetime
            .format(format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z"
            ))
            .map_err(|e| CoreError::InvalidTimestamp(format!("{self}: {e}")))
    }
}

/// Reproduces the raw concatenated nanosecond form the indexer uses.
impl fmt::Display for NanoTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.seconds == 0 {
            write!(f, "{}", self.nanos)
        } else {
            write!(f, "{}{:09}", self.seconds, self.nanos)
        }
    }
}

impl FromStr for NanoTimestamp {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidTimestamp(raw.to_owned());
        let s = raw.trim();

        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());

        if let Some((secs, frac)) = s.split_once('.') {
            if !all_digits(secs) || !all_digits(frac) || frac.len() > NANO_DIGITS {
                return Err(invalid());
            }
            let seconds = secs.parse::<u64>().map_err(|_| invalid())?;
            let nanos = format!("{:0<width$}", frac, width = NANO_DIGITS)
                .parse::<u32>()
                .map_err(|_| invalid())?;
            return Ok(Self::new(seconds, nanos));
        }

        if !all_digits(s) {
            return Err(invalid());
        }
        if s.len() <= NANO_DIGITS {
            let nanos = s.parse::<u32>().map_err(|_| invalid())?;
            return Ok(Self::new(0, nanos));
        }

        let (secs, nanos) = s.split_at(s.len() - NANO_DIGITS);
        Ok(Self {
            seconds: secs.parse().map_err(|_| invalid())?,
            nanos: nanos.parse().map_err(|_| invalid())?,
        })
    }
}

impl<'de> Deserialize<'de> for NanoTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NanoVisitor;

        impl Visitor<'_> for NanoVisitor {
            type Value = NanoTimestamp;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a nanosecond timestamp as an integer or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(NanoTimestamp::from_total_nanos(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .map(NanoTimestamp::from_total_nanos)
                    .map_err(|_| E::custom(format!("negative timestamp {v}")))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= MAX_SAFE_INTEGER as f64 {
                    Ok(NanoTimestamp::from_total_nanos(v as u64))
                } else {
                    Err(E::custom(format!(
                        "timestamp {v} cannot be represented exactly"
                    )))
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(NanoVisitor)
    }
}

impl Serialize for NanoTimestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ==============================================================================
// Reference-Format Page
// ==============================================================================

/// The explorer's listing envelope, used as the common shape for both
/// sources: `{size, totalCount, data, facets, mapping}`.
///
/// Missing or `null` fields default to their zero value, so a sparse
/// upstream body still decodes into the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>, F: Deserialize<'de> + Default"))]
pub struct ReferencePage<T, F> {
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: u64,
    #[serde(default, rename = "totalCount", deserialize_with = "null_as_default")]
    pub total_count: u64,
    #[serde(default = "Vec::new", deserialize_with = "null_as_default")]
    pub data: Vec<T>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub facets: F,
    #[serde(default)]
    pub mapping: Option<serde_json::Value>,
}

fn null_as_default<'de, D, V>(deserializer: D) -> Result<V, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de> + Default,
{
    Ok(Option::<V>::deserialize(deserializer)?.unwrap_or_default())
}

impl<T, F: Default> Default for ReferencePage<T, F> {
    fn default() -> Self {
        Self {
            size: 0,
            total_count: 0,
            data: Vec::new(),
            facets: F::default(),
            mapping: None,
        }
    }
}

/// Source A's native page. Records stay opaque JSON so fields the explorer
/// adds later pass through untouched.
pub type ExplorerPage = ReferencePage<serde_json::Value, serde_json::Map<String, serde_json::Value>>;
