//! Extraction of identifiers from the marketplace CLI's mixed output formats:
//! free text with an `ID = <value>` marker line, YAML listings and status
//! renderings, and `--out=json` documents.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};

static ID_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*ID\s*=\s*(\S.*)$").expect("valid marker regex"));

/// Capture the `<value>` from the first `ID = <value>` line, trimmed.
pub fn extract_marker_id(output: &str) -> Result<String> {
    ID_MARKER
        .captures(output)
        .map(|caps| caps[1].trim().to_string())
        .ok_or_else(|| Error::Parse(format!("no 'ID = <value>' line in output: {output:?}")))
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

/// One plan's entry in the `worker ask-plan list` YAML mapping. The CLI emits
/// empty strings for fields the marketplace has not populated yet.
#[derive(Debug, Default, Deserialize)]
pub struct PlanEntry {
    #[serde(default)]
    pub orderid: Option<String>,
    #[serde(default)]
    pub dealid: Option<String>,
}

#[derive(Debug)]
pub struct PlanListing(HashMap<String, Option<PlanEntry>>);

impl PlanListing {
    pub fn parse(output: &str) -> Result<Self> {
        let plans: HashMap<String, Option<PlanEntry>> = serde_yaml::from_str(output)
            .map_err(|e| Error::Parse(format!("malformed ask-plan listing: {e}")))?;
        Ok(Self(plans))
    }

    fn field(&self, plan_id: &str, pick: impl Fn(&PlanEntry) -> Option<&String>) -> Option<String> {
        self.0
            .get(plan_id)
            .and_then(|entry| entry.as_ref())
            .and_then(|entry| non_empty(pick(entry)))
    }

    pub fn order_id(&self, plan_id: &str) -> Option<String> {
        self.field(plan_id, |entry| entry.orderid.as_ref())
    }

    pub fn deal_id(&self, plan_id: &str) -> Option<String> {
        self.field(plan_id, |entry| entry.dealid.as_ref())
    }
}

#[derive(Debug, Deserialize)]
struct IdDocument {
    #[serde(default)]
    id: Option<String>,
}

/// Top-level `id` field of a `--out=json` document (deal status, task start).
pub fn extract_json_id(output: &str) -> Result<String> {
    let doc: IdDocument = serde_json::from_str(output)
        .map_err(|e| Error::Parse(format!("malformed JSON status: {e}")))?;
    non_empty(doc.id.as_ref()).ok_or_else(|| Error::Parse("no 'id' field in output".to_string()))
}

#[derive(Debug, Deserialize)]
struct DealStatusYaml {
    #[serde(rename = "Consumer ID", default)]
    consumer_id: Option<String>,
}

/// Read the `Consumer ID` field from a YAML deal status and normalize the
/// hexadecimal numeral into a `0x`-prefixed lowercase worker identifier.
pub fn extract_worker_id(output: &str) -> Result<String> {
    let doc: DealStatusYaml = serde_yaml::from_str(output)
        .map_err(|e| Error::Parse(format!("malformed deal status: {e}")))?;
    let raw = non_empty(doc.consumer_id.as_ref())
        .ok_or_else(|| Error::Parse("no 'Consumer ID' field in deal status".to_string()))?;

    let digits = raw.strip_prefix("0x").unwrap_or(&raw);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::Parse(format!(
            "'Consumer ID' is not a hexadecimal numeral: {raw:?}"
        )));
    }

    Ok(format!("0x{}", digits.to_lowercase()))
}

#[derive(Debug, Deserialize)]
struct DealList {
    #[serde(default)]
    deals: Option<Vec<DealRef>>,
}

#[derive(Debug, Deserialize)]
struct DealRef {
    id: String,
}

/// Deal ids from a `deals list --out=json` document, de-duplicated in
/// first-seen order.
pub fn extract_deal_ids(output: &str) -> Result<Vec<String>> {
    let doc: DealList = serde_json::from_str(output)
        .map_err(|e| Error::Parse(format!("malformed deal listing: {e}")))?;

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for deal in doc.deals.unwrap_or_default() {
        if seen.insert(deal.id.clone()) {
            ids.push(deal.id);
        }
    }
    Ok(ids)
}
