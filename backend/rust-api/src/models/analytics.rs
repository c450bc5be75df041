use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::field::Field;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntry {
    pub name: String,
    pub count: u32,
    pub percentage: u32,
}

/// Response distribution for one summarizable field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAnalytics {
    pub field: Field,
    pub total_responses: u32,
    pub option_counts: BTreeMap<String, u32>,
    /// Buckets by count, highest first.
    pub chart_data: Vec<ChartEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub form_id: String,
    pub form_title: String,
    pub total_submissions: usize,
    pub fields: Vec<FieldAnalytics>,
}
