use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Rendered in place of any scalar field that could not be resolved.
pub const UNKNOWN: &str = "N/A";

pub fn or_unknown(value: Option<String>) -> String {
    value.unwrap_or_else(|| UNKNOWN.to_string())
}

/// Anything stored in a [`crate::ledger::Ledger`]: one line per record,
/// unique by key.
pub trait LedgerRecord: Serialize {
    /// JSON field holding the key, read back when a ledger is reopened.
    const KEY_FIELD: &'static str;

    fn key(&self) -> &str;
}

/// One named category entry of a chart breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    pub name: String,
    pub percentage: String,
}

impl Slice {
    /// `fraction` is 0..1; rendered as a percent with one decimal,
    /// rounding half away from zero (0.2345 -> "23.5%").
    pub fn from_fraction(name: &str, fraction: f64) -> Self {
        let per_mille = (fraction * 1000.0).round();
        Self {
            name: name.to_string(),
            percentage: format!("{:.1}%", per_mille / 10.0),
        }
    }
}

/// A named sub-chart of the focus breakdown. Serialized as a single-key
/// object: `{"<group>": [slices]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "IndexMap<String, Vec<Slice>>",
    into = "IndexMap<String, Vec<Slice>>"
)]
pub struct FocusGroup {
    pub group: String,
    pub slices: Vec<Slice>,
}

impl From<FocusGroup> for IndexMap<String, Vec<Slice>> {
    fn from(g: FocusGroup) -> Self {
        let mut map = IndexMap::with_capacity(1);
        map.insert(g.group, g.slices);
        map
    }
}

impl TryFrom<IndexMap<String, Vec<Slice>>> for FocusGroup {
    type Error = String;

    fn try_from(map: IndexMap<String, Vec<Slice>>) -> Result<Self, Self::Error> {
        if map.len() != 1 {
            return Err(format!("focus group must have one key, found {}", map.len()));
        }
        let (group, slices) = map.into_iter().next().ok_or("empty focus group")?;
        Ok(FocusGroup { group, slices })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSnapshot {
    pub most_common_project_size: String,
    pub client_feedback_summary: String,
}

/// One company profile as written to the output ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub profile_url: String,
    pub name: String,
    pub tagline: String,
    pub summary_description: String,
    pub website: String,
    pub summary_details: IndexMap<String, String>,
    pub languages: Vec<String>,
    pub locations: Vec<String>,
    pub service_lines: Vec<Slice>,
    pub focus_breakdown: Vec<FocusGroup>,
    pub industries_focus: Vec<Slice>,
    pub client_focus: Vec<Slice>,
    pub pricing_snapshot: PricingSnapshot,
}

impl LedgerRecord for ProfileRecord {
    const KEY_FIELD: &'static str = "profile_url";

    fn key(&self) -> &str {
        &self.profile_url
    }
}

/// Summary of one provider card on a listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingCard {
    pub profile_url: String,
    pub name: String,
    pub tagline: String,
    pub location: String,
    pub hourly_rate: String,
    pub min_project_size: String,
    pub team_size: String,
    pub website: String,
}

impl LedgerRecord for ListingCard {
    const KEY_FIELD: &'static str = "profile_url";

    fn key(&self) -> &str {
        &self.profile_url
    }
}
