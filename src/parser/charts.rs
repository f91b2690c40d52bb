use indexmap::IndexMap;
use scraper::Html;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::embedded;
use super::locator::select;
use crate::record::{FocusGroup, Slice};

/// Script variable holding the profile's pie-chart data.
pub const CHART_MARKER: &str = "window.chartPie";
const CHART_ATTR: &str = "data-chart";

#[derive(Deserialize)]
struct Chart {
    #[serde(default)]
    slices: Vec<RawSlice>,
}

#[derive(Deserialize)]
struct RawSlice {
    #[serde(default)]
    name: String,
    #[serde(default)]
    percent: f64,
}

#[derive(Deserialize)]
struct FocusCharts {
    #[serde(default)]
    charts: IndexMap<String, FocusChart>,
}

#[derive(Deserialize)]
struct FocusChart {
    legend_title: Option<String>,
    #[serde(default)]
    slices: Vec<RawSlice>,
}

/// The four category breakdowns of a profile.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChartBreakdown {
    pub service_lines: Vec<Slice>,
    pub focus_breakdown: Vec<FocusGroup>,
    pub industries_focus: Vec<Slice>,
    pub client_focus: Vec<Slice>,
}

/// Chart data from the inline script, falling back to a `data-chart`
/// attribute. Missing or malformed data gives empty breakdowns.
pub fn recover(doc: &Html) -> ChartBreakdown {
    embedded::extract(doc, CHART_MARKER)
        .or_else(|| chart_attribute(doc))
        .map(|v| ChartBreakdown::from_value(&v))
        .unwrap_or_default()
}

fn chart_attribute(doc: &Html) -> Option<Value> {
    select(doc.root_element(), "[data-chart]")
        .into_iter()
        .filter_map(|el| el.value().attr(CHART_ATTR))
        .find_map(|raw| serde_json::from_str::<Value>(raw).ok().filter(Value::is_object))
}

impl ChartBreakdown {
    /// Each category maps independently; one malformed category only
    /// empties itself.
    pub fn from_value(data: &Value) -> Self {
        Self {
            service_lines: slices_of(data, "service_provided"),
            focus_breakdown: focus_groups(data),
            industries_focus: slices_of(data, "industries"),
            client_focus: slices_of(data, "clients"),
        }
    }
}

fn slices_of(data: &Value, category: &str) -> Vec<Slice> {
    let Some(raw) = data.get(category) else {
        return Vec::new();
    };
    match Chart::deserialize(raw) {
        Ok(chart) => to_slices(&chart.slices),
        Err(e) => {
            warn!("Chart category {} is malformed: {}", category, e);
            Vec::new()
        }
    }
}

fn focus_groups(data: &Value) -> Vec<FocusGroup> {
    let Some(raw) = data.get("focus") else {
        return Vec::new();
    };
    match FocusCharts::deserialize(raw) {
        Ok(focus) => focus
            .charts
            .into_iter()
            .map(|(key, chart)| FocusGroup {
                group: chart.legend_title.filter(|t| !t.trim().is_empty()).unwrap_or(key),
                slices: to_slices(&chart.slices),
            })
            .collect(),
        Err(e) => {
            warn!("Focus chart is malformed: {}", e);
            Vec::new()
        }
    }
}

fn to_slices(raw: &[RawSlice]) -> Vec<Slice> {
    raw.iter()
        .map(|s| Slice::from_fraction(s.name.trim(), s.percent))
        .collect()
}
