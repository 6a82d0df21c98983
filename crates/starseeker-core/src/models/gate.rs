//! Gate and link models.
//!
//! These mirror the wire format of the gates service. A `Gate` is never
//! mutated locally; a fresher catalog replaces the whole list.

use serde::{Deserialize, Serialize};

use crate::utils::contains_ignore_case;

#[cfg(feature = "ts")]
use ts_rs::TS;

/// A node in the travel network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Gate {
    #[serde(default)]
    pub uuid: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Gate {
    /// Distance to a directly linked gate, if this gate links to it.
    pub fn distance_to(&self, target_code: &str) -> Option<f64> {
        self.links
            .iter()
            .find(|l| l.target_code == target_code)
            .map(|l| l.distance)
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Search match against name or code, case-insensitive.
    /// A whitespace-only query matches everything; any other query is
    /// matched as typed, surrounding spaces included.
    pub fn matches_search(&self, query: &str) -> bool {
        query.trim().is_empty()
            || contains_ignore_case(&self.name, query)
            || contains_ignore_case(&self.code, query)
    }

    /// Display label such as "Sol (SOL)".
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.code)
    }
}

/// A directed, weighted edge to another gate.
///
/// Links are not symmetric: A linking to B says nothing about B linking to A.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(TS), ts(export))]
pub struct Link {
    #[serde(rename = "code")]
    pub target_code: String,
    /// Distance in hyperspace units. Sent by the service as a decimal string.
    #[serde(rename = "hu", with = "hu_distance")]
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub distance: f64,
}

impl Link {
    pub fn new(target_code: impl Into<String>, distance: f64) -> Self {
        Self {
            target_code: target_code.into(),
            distance,
        }
    }
}

/// The service encodes distances as strings ("123.45"); older payloads used
/// plain numbers. Accept both, always write the string form.
mod hu_distance {
    use serde::de::{self, Deserializer, Unexpected, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        struct DistanceVisitor;

        impl<'de> Visitor<'de> for DistanceVisitor {
            type Value = f64;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a distance as a number or numeric string")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
                Ok(v)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
                Ok(v as f64)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
                Ok(v as f64)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
                v.trim()
                    .parse::<f64>()
                    .map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(DistanceVisitor)
    }
}
