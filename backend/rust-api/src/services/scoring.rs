//! Grades a submission against the correct answers declared on the schema.
//!
//! Comparison never fails: an answer (or declared answer) in the wrong shape
//! for its field simply grades as incorrect.

use std::collections::{BTreeMap, HashSet};

use crate::models::answer::{AnswerSet, AnswerValue};
use crate::models::field::{Field, FieldType};
use crate::models::form::FormSchema;
use crate::models::scoring::{QuestionResult, ScoringResult};

/// Comparison semantics per field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    /// checkbox, multi-select: same length and every expected option chosen
    OptionSet,
    /// trimmed, case-insensitive string equality
    Scalar,
    /// ranking: every option has the expected rank
    RankMap,
}

impl Comparison {
    fn for_type(field_type: FieldType) -> Option<Self> {
        match field_type {
            FieldType::Checkbox | FieldType::MultiSelect => Some(Comparison::OptionSet),
            FieldType::Boolean
            | FieldType::Radio
            | FieldType::Select
            | FieldType::Text
            | FieldType::Textarea
            | FieldType::Slider
            | FieldType::Rating => Some(Comparison::Scalar),
            FieldType::Ranking => Some(Comparison::RankMap),
            FieldType::File | FieldType::Image | FieldType::MultiText => None,
        }
    }

    fn matches(self, submitted: &AnswerValue, expected: &AnswerValue) -> bool {
        match self {
            Comparison::OptionSet => {
                let (Some(submitted), Some(expected)) =
                    (submitted_options(submitted), expected_options(expected))
                else {
                    return false;
                };
                if submitted.len() != expected.len() {
                    return false;
                }
                let chosen: HashSet<&str> = submitted.iter().map(String::as_str).collect();
                expected.iter().all(|option| chosen.contains(option.as_str()))
            }
            Comparison::Scalar => match (submitted.scalar_string(), expected.scalar_string()) {
                (Some(a), Some(b)) => normalize(&a) == normalize(&b),
                _ => false,
            },
            Comparison::RankMap => match (rank_map(submitted), rank_map(expected)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn submitted_options(value: &AnswerValue) -> Option<Vec<String>> {
    match value {
        AnswerValue::List(items) => Some(items.iter().map(|s| normalize(s)).collect()),
        _ => None,
    }
}

/// Expected options are stored either as a list or as the comma-separated
/// text the editor accepts ("Option 1, Option 2").
fn expected_options(value: &AnswerValue) -> Option<Vec<String>> {
    match value {
        AnswerValue::List(items) => Some(
            items
                .iter()
                .map(|s| normalize(s))
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        AnswerValue::Text(raw) => Some(
            raw.split(',')
                .map(normalize)
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        _ => None,
    }
}

/// Rank mappings arrive as objects, or as JSON text when typed into the
/// editor.
fn rank_map(value: &AnswerValue) -> Option<BTreeMap<String, i64>> {
    let ranks = match value {
        AnswerValue::Ranks(ranks) => ranks.clone(),
        AnswerValue::Text(raw) => match serde_json::from_str::<AnswerValue>(raw) {
            Ok(AnswerValue::Ranks(ranks)) => ranks,
            _ => return None,
        },
        _ => return None,
    };
    Some(
        ranks
            .into_iter()
            .map(|(option, rank)| (normalize(&option), rank))
            .collect(),
    )
}

/// Grades one field, or `None` when the field is not graded at all.
pub fn grade_field(field: &Field, answers: &AnswerSet) -> Option<QuestionResult> {
    if !field.has_correct_answer {
        return None;
    }
    let comparison = Comparison::for_type(field.field_type)?;

    let user_answer = answers.get(&field.id).filter(|a| !a.is_null()).cloned();
    let is_correct = match (&user_answer, &field.correct_answer) {
        (Some(submitted), Some(expected)) => comparison.matches(submitted, expected),
        _ => false,
    };

    Some(QuestionResult {
        field_id: field.id.clone(),
        field_label: field.label.clone(),
        field_type: field.field_type,
        user_answer,
        correct_answer: field.correct_answer.clone(),
        is_correct,
    })
}

pub fn score(schema: &FormSchema, answers: &AnswerSet) -> ScoringResult {
    let per_question: Vec<QuestionResult> = schema
        .fields()
        .filter_map(|field| grade_field(field, answers))
        .collect();

    let total_questions = per_question.len() as u32;
    let correct_count = per_question.iter().filter(|q| q.is_correct).count() as u32;
    let score_percent = percent(correct_count, total_questions);

    tracing::debug!(
        "Scored form {:?}: {}/{} correct ({}%)",
        schema.form_title,
        correct_count,
        total_questions,
        score_percent
    );

    ScoringResult {
        per_question,
        total_questions,
        correct_count,
        score_percent,
    }
}

fn percent(part: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let value = (f64::from(part) / f64::from(total) * 100.0).round();
    value.clamp(0.0, 100.0) as u8
}
