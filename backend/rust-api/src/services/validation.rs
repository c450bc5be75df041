//! Required-field checks run on page advance and before final submit.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::answer::{AnswerSet, AnswerValue};
use crate::models::field::{Field, FieldType};
use crate::models::form::{FormSchema, Page};

/// Field id -> error message. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationResult(BTreeMap<String, String>);

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field_id: &str) -> Option<&str> {
        self.0.get(field_id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Adds entries from `other` without replacing messages already present.
    pub fn merge(&mut self, other: ValidationResult) {
        for (field_id, message) in other.0 {
            self.0.entry(field_id).or_insert(message);
        }
    }

    fn insert(&mut self, field_id: &str, message: String) {
        self.0.insert(field_id.to_string(), message);
    }
}

/// Errors introduced by one page of a multi-page form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageErrors {
    pub page_index: usize,
    pub page_id: String,
    pub page_title: String,
    pub errors: ValidationResult,
}

/// Whole-form outcome as returned to clients: the merged errors plus where
/// each one came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: ValidationResult,
    pub pages: Vec<PageErrors>,
    pub first_invalid_page: Option<usize>,
}

impl ValidationReport {
    pub fn for_answers(schema: &FormSchema, answers: &AnswerSet) -> Self {
        let pages = validate_form_by_page(schema, answers);
        let mut errors = ValidationResult::default();
        for page in &pages {
            errors.merge(page.errors.clone());
        }
        Self {
            valid: errors.is_valid(),
            first_invalid_page: pages.first().map(|p| p.page_index),
            errors,
            pages,
        }
    }
}

/// How a required field decides it has been answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PresenceRule {
    /// checkbox, multi-select: non-empty sequence
    Selection,
    /// multi-text: at least one non-blank textbox
    Textboxes,
    /// ranking: non-empty rank mapping
    Ranking,
    /// file, image: at least one file
    Upload,
    /// everything else: present and not a blank string
    Scalar,
}

impl PresenceRule {
    fn for_type(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Checkbox | FieldType::MultiSelect => PresenceRule::Selection,
            FieldType::MultiText => PresenceRule::Textboxes,
            FieldType::Ranking => PresenceRule::Ranking,
            FieldType::File | FieldType::Image => PresenceRule::Upload,
            FieldType::Text
            | FieldType::Textarea
            | FieldType::Select
            | FieldType::Radio
            | FieldType::Boolean
            | FieldType::Slider
            | FieldType::Rating => PresenceRule::Scalar,
        }
    }

    fn is_satisfied(self, answer: Option<&AnswerValue>) -> bool {
        let answer = match answer {
            Some(value) if !value.is_null() => value,
            _ => return false,
        };

        match self {
            PresenceRule::Selection => matches!(answer, AnswerValue::List(items) if !items.is_empty()),
            PresenceRule::Textboxes => match answer {
                AnswerValue::List(items) => items.iter().any(|item| !item.trim().is_empty()),
                _ => false,
            },
            // a rank mapping or file list with entries; text never qualifies
            PresenceRule::Ranking | PresenceRule::Upload => match answer {
                AnswerValue::Text(_) => false,
                other => other.entry_count().is_some_and(|n| n > 0),
            },
            PresenceRule::Scalar => match answer {
                AnswerValue::Text(s) => !s.trim().is_empty(),
                _ => true,
            },
        }
    }
}

pub fn required_message(field: &Field) -> String {
    format!("{} is required", field.label)
}

/// Whether a single field's answer satisfies its `required` flag. Optional
/// fields always pass.
pub fn field_is_satisfied(field: &Field, answers: &AnswerSet) -> bool {
    !field.required || PresenceRule::for_type(field.field_type).is_satisfied(answers.get(&field.id))
}

pub fn validate_page(page: &Page, answers: &AnswerSet) -> ValidationResult {
    let mut result = ValidationResult::default();
    for field in &page.fields {
        if !field_is_satisfied(field, answers) {
            result.insert(&field.id, required_message(field));
        }
    }
    result
}

/// Errors grouped by the page that introduced them; pages without errors
/// are left out.
pub fn validate_form_by_page(schema: &FormSchema, answers: &AnswerSet) -> Vec<PageErrors> {
    schema
        .pages
        .iter()
        .enumerate()
        .filter_map(|(page_index, page)| {
            let errors = validate_page(page, answers);
            (!errors.is_valid()).then(|| PageErrors {
                page_index,
                page_id: page.id.clone(),
                page_title: page.title.clone(),
                errors,
            })
        })
        .collect()
}

pub fn validate_form(schema: &FormSchema, answers: &AnswerSet) -> ValidationResult {
    let mut result = ValidationResult::default();
    for page in &schema.pages {
        result.merge(validate_page(page, answers));
    }
    result
}

/// The page a fill-out flow should return to, if any page is incomplete.
pub fn first_invalid_page(schema: &FormSchema, answers: &AnswerSet) -> Option<usize> {
    schema
        .pages
        .iter()
        .position(|page| !validate_page(page, answers).is_valid())
}
