use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// Submitted values keyed by field id.
pub type AnswerSet = BTreeMap<String, AnswerValue>;

/// A single answer (or declared correct answer). The shape depends on the
/// field type; see the variants for which types produce which shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Null,
    Bool(bool),
    /// slider / rating values submitted as numbers
    Number(serde_json::Number),
    /// text, textarea, select, radio, boolean ("yes"/"no")
    Text(String),
    /// checkbox, multi-select, and multi-text (one entry per textbox)
    List(#[serde(deserialize_with = "nullable_strings")] Vec<String>),
    /// file / image metadata; binary content is never stored
    Files(Vec<FileDescriptor>),
    /// ranking: option -> rank
    Ranks(#[serde(deserialize_with = "rank_map")] BTreeMap<String, i64>),
    /// Anything else. Kept verbatim so malformed answers round-trip.
    Other(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(default)]
    pub last_modified: i64,
}

impl AnswerValue {
    pub fn text(value: impl Into<String>) -> Self {
        AnswerValue::Text(value.into())
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AnswerValue::List(values.into_iter().map(Into::into).collect())
    }

    pub fn ranks<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        AnswerValue::Ranks(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AnswerValue::Null | AnswerValue::Other(serde_json::Value::Null))
    }

    /// True for values that carry no response at all: null, blank strings and
    /// empty collections.
    pub fn is_blank(&self) -> bool {
        match self {
            AnswerValue::Null => true,
            AnswerValue::Bool(_) | AnswerValue::Number(_) => false,
            AnswerValue::Text(s) => s.trim().is_empty(),
            AnswerValue::List(items) => items.is_empty(),
            AnswerValue::Files(files) => files.is_empty(),
            AnswerValue::Ranks(ranks) => ranks.is_empty(),
            AnswerValue::Other(value) => match value {
                serde_json::Value::Null => true,
                serde_json::Value::Array(items) => items.is_empty(),
                serde_json::Value::Object(map) => map.is_empty(),
                serde_json::Value::String(s) => s.trim().is_empty(),
                _ => false,
            },
        }
    }

    /// Number of entries for sequence- and mapping-shaped values, `None` for
    /// scalars.
    pub fn entry_count(&self) -> Option<usize> {
        match self {
            AnswerValue::List(items) => Some(items.len()),
            AnswerValue::Files(files) => Some(files.len()),
            AnswerValue::Ranks(ranks) => Some(ranks.len()),
            AnswerValue::Other(serde_json::Value::Array(items)) => Some(items.len()),
            AnswerValue::Other(serde_json::Value::Object(map)) => Some(map.len()),
            _ => None,
        }
    }

    /// String form of a scalar answer. Integral numbers render without a
    /// fractional part so `5`, `5.0` and `"5"` all read as `5`.
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            AnswerValue::Text(s) => Some(s.clone()),
            AnswerValue::Bool(b) => Some(b.to_string()),
            AnswerValue::Number(n) => Some(render_number(n)),
            _ => None,
        }
    }
}

fn render_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Text(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        AnswerValue::Text(value)
    }
}

impl From<i64> for AnswerValue {
    fn from(value: i64) -> Self {
        AnswerValue::Number(value.into())
    }
}

impl From<bool> for AnswerValue {
    fn from(value: bool) -> Self {
        AnswerValue::Bool(value)
    }
}

// Unfilled textboxes arrive as nulls inside the array.
fn nullable_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Vec<Option<String>> = Vec::deserialize(deserializer)?;
    Ok(items.into_iter().map(Option::unwrap_or_default).collect())
}

// Ranks are entered as numbers by the fill-out UI but as numeric strings by
// hand-edited JSON. A rank reset to "-" arrives as "" or null and means the
// option is unranked, so it is left out of the map.
fn rank_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RankValue {
        Int(i64),
        Float(f64),
        Text(String),
    }

    let raw: BTreeMap<String, Option<RankValue>> = BTreeMap::deserialize(deserializer)?;
    let mut ranks = BTreeMap::new();
    for (option, rank) in raw {
        let rank = match rank {
            None => continue,
            Some(RankValue::Text(s)) if s.trim().is_empty() => continue,
            Some(RankValue::Int(i)) => i,
            Some(RankValue::Float(f)) if f.fract() == 0.0 => f as i64,
            Some(RankValue::Float(f)) => {
                return Err(serde::de::Error::custom(format!(
                    "rank for {} is not an integer: {}",
                    option, f
                )))
            }
            Some(RankValue::Text(s)) => s.trim().parse::<i64>().map_err(|_| {
                serde::de::Error::custom(format!("rank for {} is not a number", option))
            })?,
        };
        ranks.insert(option, rank);
    }
    Ok(ranks)
}

/// Opaque reference to whoever filled in the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitterIdentity {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Stored response document ("formSubmissions" collection).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(rename = "_id")]
    pub id: String,
    pub form_id: String,
    #[serde(default)]
    pub form_title: String,
    #[serde(alias = "formData", default)]
    pub answers: AnswerSet,
    pub submitted_at: DateTime<Utc>,
    #[serde(alias = "user")]
    pub submitter: SubmitterIdentity,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFormRequest {
    #[validate(length(min = 1, max = 128, message = "userId must be between 1 and 128 characters"))]
    pub user_id: String,
    #[validate(length(max = 200, message = "name must be at most 200 characters"))]
    pub name: Option<String>,
    #[serde(default)]
    pub answers: AnswerSet,
}

impl SubmitFormRequest {
    pub fn submitter(&self) -> SubmitterIdentity {
        SubmitterIdentity {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Answers checked against a single page or the whole form without storing
/// anything.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateAnswersRequest {
    #[serde(default)]
    pub answers: AnswerSet,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> AnswerValue {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn answer_shapes_deserialize_by_structure() {
        assert_eq!(parse(json!("red")), AnswerValue::text("red"));
        assert_eq!(parse(json!(null)), AnswerValue::Null);
        assert_eq!(parse(json!(["A", "B"])), AnswerValue::list(["A", "B"]));
        assert_eq!(parse(json!(["A", null])), AnswerValue::list(["A", ""]));
        assert_eq!(
            parse(json!({"Tea": 1, "Coffee": "2"})),
            AnswerValue::ranks([("Tea", 1), ("Coffee", 2)])
        );
        assert!(matches!(parse(json!(7)), AnswerValue::Number(_)));
    }

    #[test]
    fn cleared_ranks_are_left_out_of_the_map() {
        assert_eq!(
            parse(json!({"Tea": 1, "Coffee": "", "Milk": null})),
            AnswerValue::ranks([("Tea", 1)])
        );
        assert!(parse(json!({"Tea": "", "Coffee": " "})).is_blank());
    }

    #[test]
    fn file_metadata_is_recognised() {
        let value = parse(json!([
            {"name": "cv.pdf", "size": 1024, "type": "application/pdf", "lastModified": 1700000000000i64}
        ]));
        match value {
            AnswerValue::Files(files) => {
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].mime_type, "application/pdf");
            }
            other => panic!("expected files, got {:?}", other),
        }
    }

    #[test]
    fn unrecognised_objects_fall_through_to_other() {
        let value = parse(json!({"Tea": "first"}));
        assert!(matches!(value, AnswerValue::Other(_)));
        assert!(!value.is_blank());
    }

    #[test]
    fn numbers_render_without_trailing_fraction() {
        assert_eq!(parse(json!(5)).scalar_string().as_deref(), Some("5"));
        assert_eq!(parse(json!(5.0)).scalar_string().as_deref(), Some("5"));
        assert_eq!(parse(json!(2.5)).scalar_string().as_deref(), Some("2.5"));
    }

    #[test]
    fn submission_accepts_legacy_field_names() {
        let submission: Submission = serde_json::from_value(json!({
            "_id": "s1",
            "formId": "f1",
            "formData": {"q1": "yes"},
            "submittedAt": "2024-05-01T10:00:00Z",
            "user": {"userId": "u1", "name": "Ada"}
        }))
        .unwrap();
        assert_eq!(submission.answers.get("q1"), Some(&AnswerValue::text("yes")));
        assert_eq!(submission.submitter.user_id, "u1");
    }
}
