//! Response distributions for the admin analytics view.

use std::collections::{BTreeMap, HashMap};

use crate::models::analytics::{AnalyticsReport, ChartEntry, FieldAnalytics};
use crate::models::answer::{AnswerSet, AnswerValue};
use crate::models::field::{Field, FieldType};
use crate::models::form::FormSchema;

/// How one answer of a summarizable field turns into bucket increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tally {
    /// radio, select: the chosen value
    Single,
    /// checkbox: one increment per chosen value
    Multiple,
    /// boolean: "Yes" / "No"
    YesNo,
    /// ranking: one bucket per observed (option, rank) pair
    RankPairs,
}

impl Tally {
    fn for_type(field_type: FieldType) -> Option<Self> {
        match field_type {
            FieldType::Radio | FieldType::Select => Some(Tally::Single),
            FieldType::Checkbox => Some(Tally::Multiple),
            FieldType::Boolean => Some(Tally::YesNo),
            FieldType::Ranking => Some(Tally::RankPairs),
            _ => None,
        }
    }

    fn labels(self, answer: &AnswerValue) -> Vec<String> {
        match self {
            Tally::Single => answer
                .scalar_string()
                .filter(|s| !s.trim().is_empty())
                .into_iter()
                .collect(),
            Tally::Multiple => match answer {
                AnswerValue::List(items) => items
                    .iter()
                    .filter(|item| !item.trim().is_empty())
                    .cloned()
                    .collect(),
                _ => Vec::new(),
            },
            Tally::YesNo => {
                let yes = match answer {
                    AnswerValue::Text(s) => s.trim().eq_ignore_ascii_case("yes"),
                    AnswerValue::Bool(b) => *b,
                    _ => false,
                };
                vec![if yes { "Yes" } else { "No" }.to_string()]
            }
            Tally::RankPairs => match answer {
                AnswerValue::Ranks(ranks) => ranks
                    .iter()
                    .map(|(option, rank)| format!("{} (Rank {})", option, rank))
                    .collect(),
                // ranks that are not whole numbers still show up as entered
                AnswerValue::Other(serde_json::Value::Object(entries)) => entries
                    .iter()
                    .filter_map(|(option, rank)| {
                        let rank = match rank {
                            serde_json::Value::String(s) => s.trim().to_string(),
                            serde_json::Value::Null => return None,
                            other => other.to_string(),
                        };
                        (!rank.is_empty()).then(|| format!("{} (Rank {})", option, rank))
                    })
                    .collect(),
                _ => Vec::new(),
            },
        }
    }
}

/// Counts that remember the order buckets were first seen, so equal counts
/// keep a stable order in the chart.
#[derive(Default)]
struct Buckets {
    order: Vec<(String, u32)>,
    index: HashMap<String, usize>,
}

impl Buckets {
    fn increment(&mut self, label: String) {
        match self.index.get(&label) {
            Some(&i) => self.order[i].1 += 1,
            None => {
                self.index.insert(label.clone(), self.order.len());
                self.order.push((label, 1));
            }
        }
    }
}

fn percentage(count: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (f64::from(count) / f64::from(total) * 100.0).round() as u32
}

/// Distribution for a single field, or `None` when the field is not
/// summarizable.
pub fn analyze_field<'a, I>(field: &Field, answer_sets: I) -> Option<FieldAnalytics>
where
    I: IntoIterator<Item = &'a AnswerSet>,
{
    let tally = Tally::for_type(field.field_type)?;
    let mut buckets = Buckets::default();
    let mut total_responses = 0u32;

    for answers in answer_sets {
        let Some(answer) = answers.get(&field.id) else {
            continue;
        };
        if answer.is_blank() {
            continue;
        }
        total_responses += 1;
        for label in tally.labels(answer) {
            buckets.increment(label);
        }
    }

    let option_counts: BTreeMap<String, u32> = buckets.order.iter().cloned().collect();
    let mut chart_data: Vec<ChartEntry> = buckets
        .order
        .into_iter()
        .map(|(name, count)| ChartEntry {
            percentage: percentage(count, total_responses),
            name,
            count,
        })
        .collect();
    chart_data.sort_by(|a, b| b.count.cmp(&a.count));

    Some(FieldAnalytics {
        field: field.clone(),
        total_responses,
        option_counts,
        chart_data,
    })
}

/// Per-field distributions in page-then-field order. Fields that end up with
/// no buckets are left out.
pub fn aggregate(schema: &FormSchema, answer_sets: &[&AnswerSet]) -> Vec<FieldAnalytics> {
    schema
        .fields()
        .filter_map(|field| analyze_field(field, answer_sets.iter().copied()))
        .filter(|analytics| !analytics.chart_data.is_empty())
        .collect()
}

pub fn build_report(
    form_id: &str,
    schema: &FormSchema,
    answer_sets: &[&AnswerSet],
) -> AnalyticsReport {
    let fields = aggregate(schema, answer_sets);
    tracing::debug!(
        "Aggregated {} submissions for form {}: {} charted fields",
        answer_sets.len(),
        form_id,
        fields.len()
    );
    AnalyticsReport {
        form_id: form_id.to_string(),
        form_title: schema.form_title.clone(),
        total_submissions: answer_sets.len(),
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::form::Page;

    fn schema_with(fields: Vec<Field>) -> FormSchema {
        FormSchema::from_pages("Survey", vec![Page::new("One").with_fields(fields)])
    }

    fn submission(entries: Vec<(&str, AnswerValue)>) -> AnswerSet {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn field(field_type: FieldType, id: &str) -> Field {
        Field::new(field_type).with_id(id).with_label(id.to_uppercase())
    }

    #[test]
    fn boolean_answers_split_into_yes_and_no() {
        let schema = schema_with(vec![field(FieldType::Boolean, "f4")]);
        let a = submission(vec![("f4", "yes".into())]);
        let b = submission(vec![("f4", "no".into())]);

        let result = aggregate(&schema, &[&a, &b]);
        assert_eq!(result.len(), 1);
        let stats = &result[0];
        assert_eq!(stats.total_responses, 2);
        assert_eq!(stats.option_counts.get("Yes"), Some(&1));
        assert_eq!(stats.option_counts.get("No"), Some(&1));
        assert!(stats.chart_data.iter().all(|c| c.percentage == 50));
    }

    #[test]
    fn radio_skips_blank_answers_and_sorts_by_count() {
        let schema = schema_with(vec![field(FieldType::Radio, "color")]);
        let subs = [
            submission(vec![("color", "Blue".into())]),
            submission(vec![("color", "Red".into())]),
            submission(vec![("color", "Red".into())]),
            submission(vec![("color", "  ".into())]),
            submission(vec![]),
        ];
        let refs: Vec<&AnswerSet> = subs.iter().collect();

        let stats = &aggregate(&schema, &refs)[0];
        assert_eq!(stats.total_responses, 3);
        let names: Vec<_> = stats.chart_data.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Red", "Blue"]);
        assert_eq!(stats.chart_data[0].percentage, 67);
        assert_eq!(stats.chart_data[1].percentage, 33);
    }

    #[test]
    fn checkbox_counts_each_choice_against_responses() {
        let schema = schema_with(vec![field(FieldType::Checkbox, "tags")]);
        let a = submission(vec![("tags", AnswerValue::list(["A", "B"]))]);
        let b = submission(vec![("tags", AnswerValue::list(["A"]))]);
        let empty = submission(vec![("tags", AnswerValue::list(Vec::<String>::new()))]);

        let stats = &aggregate(&schema, &[&a, &b, &empty])[0];
        assert_eq!(stats.total_responses, 2);
        assert_eq!(stats.option_counts.get("A"), Some(&2));
        assert_eq!(stats.chart_data[0].percentage, 100);
        assert_eq!(stats.chart_data[1].percentage, 50);
    }

    #[test]
    fn ranking_buckets_by_option_and_rank() {
        let schema = schema_with(vec![field(FieldType::Ranking, "order")]);
        let a = submission(vec![("order", AnswerValue::ranks([("Tea", 1), ("Coffee", 2)]))]);
        let b = submission(vec![("order", AnswerValue::ranks([("Tea", 2), ("Coffee", 1)]))]);
        let c = submission(vec![("order", AnswerValue::ranks([("Tea", 1), ("Coffee", 2)]))]);

        let stats = &aggregate(&schema, &[&a, &b, &c])[0];
        assert_eq!(stats.chart_data.len(), 4);
        assert_eq!(stats.option_counts.get("Tea (Rank 1)"), Some(&2));
        assert_eq!(stats.option_counts.get("Coffee (Rank 1)"), Some(&1));
        assert_eq!(stats.total_responses, 3);
    }

    #[test]
    fn ranking_with_cleared_rank_keeps_ranked_options() {
        let schema = schema_with(vec![field(FieldType::Ranking, "order")]);
        let a: AnswerSet =
            serde_json::from_value(serde_json::json!({"order": {"Tea": 1, "Coffee": ""}}))
                .unwrap();

        let result = aggregate(&schema, &[&a]);
        assert_eq!(result.len(), 1);
        let stats = &result[0];
        assert_eq!(stats.total_responses, 1);
        assert_eq!(stats.option_counts.get("Tea (Rank 1)"), Some(&1));
        assert_eq!(stats.option_counts.len(), 1);
    }

    #[test]
    fn ranking_with_unparsed_ranks_tallies_entries_as_entered() {
        let schema = schema_with(vec![field(FieldType::Ranking, "order")]);
        let a: AnswerSet = serde_json::from_value(
            serde_json::json!({"order": {"Tea": "first", "Coffee": 2, "Milk": ""}}),
        )
        .unwrap();
        assert!(matches!(a.get("order"), Some(AnswerValue::Other(_))));

        let stats = &aggregate(&schema, &[&a])[0];
        assert_eq!(stats.option_counts.get("Tea (Rank first)"), Some(&1));
        assert_eq!(stats.option_counts.get("Coffee (Rank 2)"), Some(&1));
        assert_eq!(stats.option_counts.len(), 2);
    }

    #[test]
    fn checkbox_ignores_unfilled_entries() {
        let schema = schema_with(vec![field(FieldType::Checkbox, "tags")]);
        let a: AnswerSet =
            serde_json::from_value(serde_json::json!({"tags": ["A", null, " "]})).unwrap();

        let stats = &aggregate(&schema, &[&a])[0];
        assert_eq!(stats.option_counts.len(), 1);
        assert_eq!(stats.option_counts.get("A"), Some(&1));
        assert!(stats.chart_data.iter().all(|c| !c.name.trim().is_empty()));
    }

    #[test]
    fn non_summarizable_and_empty_fields_are_omitted() {
        let schema = schema_with(vec![
            field(FieldType::Text, "name"),
            field(FieldType::Select, "country"),
            field(FieldType::Radio, "unused"),
        ]);
        let a = submission(vec![("name", "Ada".into()), ("country", "Peru".into())]);

        let result = aggregate(&schema, &[&a]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].field.id, "country");

        assert!(aggregate(&schema, &[]).is_empty());
    }

    #[test]
    fn output_follows_field_order() {
        let schema = FormSchema::from_pages(
            "Survey",
            vec![
                Page::new("One").with_fields(vec![field(FieldType::Boolean, "first")]),
                Page::new("Two").with_fields(vec![field(FieldType::Radio, "second")]),
            ],
        );
        let a = submission(vec![("second", "x".into()), ("first", "yes".into())]);
        let ids: Vec<_> = aggregate(&schema, &[&a])
            .into_iter()
            .map(|f| f.field.id)
            .collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn report_carries_submission_count() {
        let schema = schema_with(vec![field(FieldType::Radio, "color")]);
        let report = build_report("form-1", &schema, &[]);
        assert_eq!(report.total_submissions, 0);
        assert!(report.fields.is_empty());
        assert_eq!(report.form_title, "Survey");
    }
}
