//! Findings returned by the analysis service.
//!
//! The service sends findings as a JSON object keyed by condition name. Key
//! order matters: it breaks ties when rows are sorted by probability, so the
//! object is decoded into an ordered list rather than a map.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Confidence bucket the analyzer attaches to each probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
    #[serde(other)]
    Unknown,
}

/// Score record for a single finding as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingScore {
    pub probability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

/// A named condition with its score
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub name: String,
    pub probability: f64,
    pub confidence: Option<Confidence>,
}

impl Finding {
    pub fn new(name: impl Into<String>, probability: f64) -> Self {
        Self {
            name: name.into(),
            probability,
            confidence: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum FindingsError {
    #[error("Stored findings are not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Findings in the order the service listed them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Findings(Vec<Finding>);

impl Findings {
    pub fn new(findings: Vec<Finding>) -> Self {
        Self(findings)
    }

    /// Decode findings stored as a JSON-encoded string (history entries)
    pub fn from_json_str(raw: &str) -> Result<Self, FindingsError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.0.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Finding> {
        self.0.iter().find(|f| f.name == name)
    }

    /// Findings by descending probability; equal probabilities keep input order
    pub fn sorted_by_probability(&self) -> Vec<&Finding> {
        let mut sorted: Vec<&Finding> = self.0.iter().collect();
        // sort_by is stable
        sorted.sort_by(|a, b| compare_probability(b.probability, a.probability));
        sorted
    }
}

fn compare_probability(a: f64, b: f64) -> Ordering {
    let a = if a.is_nan() { 0.0 } else { a };
    let b = if b.is_nan() { 0.0 } else { b };
    a.total_cmp(&b)
}

impl From<Vec<Finding>> for Findings {
    fn from(findings: Vec<Finding>) -> Self {
        Self(findings)
    }
}

impl<'de> Deserialize<'de> for Findings {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedFindings;

        impl<'de> Visitor<'de> for OrderedFindings {
            type Value = Findings;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping finding names to {probability}")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut findings = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, score)) = map.next_entry::<String, FindingScore>()? {
                    findings.push(Finding {
                        name,
                        probability: score.probability,
                        confidence: score.confidence,
                    });
                }
                Ok(Findings(findings))
            }
        }

        deserializer.deserialize_map(OrderedFindings)
    }
}

impl Serialize for Findings {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for finding in &self.0 {
            map.serialize_entry(
                &finding.name,
                &FindingScore {
                    probability: finding.probability,
                    confidence: finding.confidence,
                },
            )?;
        }
        map.end()
    }
}
