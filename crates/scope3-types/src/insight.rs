use serde::{Deserialize, Deserializer, Serialize};

use crate::message::Metadata;

/// Aggregated emissions record for one category.
///
/// Fields beyond the three known ones are kept in `extra` so the record can
/// be forwarded to the query service unchanged.
///
/// The gateway reports SQL sums, which arrive as numbers, numeric strings
/// such as `"500.00"`, or `null` when a category has no rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(default)]
    pub category: String,
    #[serde(default, deserialize_with = "lenient_total")]
    pub total_emissions: Option<f64>,
    #[serde(default, deserialize_with = "lenient_total")]
    pub total_reduction: Option<f64>,
    #[serde(flatten)]
    pub extra: Metadata,
}

impl Insight {
    pub fn new(category: impl Into<String>, total_emissions: f64, total_reduction: f64) -> Self {
        Self {
            category: category.into(),
            total_emissions: Some(total_emissions),
            total_reduction: Some(total_reduction),
            extra: Metadata::new(),
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Total {
    Number(f64),
    Text(String),
}

fn lenient_total<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Total>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Total::Number(n)) => Ok(Some(n)),
        Some(Total::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("total {s:?} is not a number"))),
    }
}
