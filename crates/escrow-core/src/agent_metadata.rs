//! On-chain agent metadata shapes, as read off an agent-identifying NFT.
//!
//! Spec reference: §9 "Dynamic JSON metadata" design note. Cardano
//! transaction metadata truncates individual strings to 64 bytes, so a
//! long field (a description, a URL) is published either as one short
//! string or as an array of chunks meant to be concatenated back
//! together. Every string-typed field in `AgentMetadata` has to accept
//! either shape.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// A metadata string field that was published either whole (`Atomic`) or
/// split into ≤64-byte chunks (`Chunked`) to fit Cardano's per-string
/// truncation limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StringOrChunks {
    Atomic(String),
    Chunked(Vec<String>),
}

impl<'de> Deserialize<'de> for StringOrChunks {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Atomic(String),
            Chunked(Vec<String>),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Atomic(s) => StringOrChunks::Atomic(s),
            Raw::Chunked(chunks) => StringOrChunks::Chunked(chunks),
        })
    }
}

impl StringOrChunks {
    /// Concatenate chunks back into the original string. The single
    /// entry point every caller uses instead of matching on the variant
    /// by hand.
    pub fn resolve(&self) -> String {
        match self {
            StringOrChunks::Atomic(s) => s.clone(),
            StringOrChunks::Chunked(chunks) => chunks.concat(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub name: StringOrChunks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<StringOrChunks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_other: Option<StringOrChunks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<StringOrChunks>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Legal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy_policy: Option<StringOrChunks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<StringOrChunks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other: Option<StringOrChunks>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedPricing {
    pub amounts: Vec<crate::money::UnitValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "pricingType")]
pub enum AgentPricing {
    Fixed(FixedPricing),
    Free,
}

/// The on-chain metadata of an agent registry NFT, as published by
/// `escrow-registry` and read back by `escrow-orchestrator` when
/// resolving a seller's policy/agent during CreatePayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetadata {
    pub name: StringOrChunks,
    pub api_base_url: StringOrChunks,
    pub author: Author,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legal: Option<Legal>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub pricing: AgentPricing,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example_output: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<StringOrChunks>,
}
