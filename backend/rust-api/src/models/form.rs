use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use super::answer::AnswerValue;
use super::field::{Field, FieldType};

/// Structural problems in a form definition. Messages follow the wording the
/// editor shows on JSON import.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Invalid JSON structure: pages array is required")]
    MissingPages,
    #[error("Page {page}: {attribute} is required")]
    PageAttribute { page: usize, attribute: &'static str },
    #[error("Page {page}, Field {field}: {attribute} is required")]
    FieldAttribute {
        page: usize,
        field: usize,
        attribute: &'static str,
    },
    #[error("Field id {0} is used more than once")]
    DuplicateFieldId(String),
    #[error("Page id {0} is used more than once")]
    DuplicatePageId(String),
    #[error("Field {field_id}: {field_type} fields need at least one option")]
    MissingOptions {
        field_id: String,
        field_type: &'static str,
    },
    #[error("Field {field_id}: correct answer does not fit a {field_type} field")]
    CorrectAnswerShape {
        field_id: String,
        field_type: &'static str,
    },
    #[error("Invalid form definition: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Page {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: format!("page_{}", Uuid::new_v4().simple()),
            title: title.into(),
            description: Some(String::new()),
            fields: Vec::new(),
        }
    }

    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    #[serde(default)]
    pub form_title: String,
    pub pages: Vec<Page>,
}

impl Default for FormSchema {
    fn default() -> Self {
        Self::new("Form Title")
    }
}

impl FormSchema {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            form_title: title.into(),
            pages: vec![Page::new("Page 1")],
        }
    }

    pub fn from_pages(title: impl Into<String>, pages: Vec<Page>) -> Self {
        let mut schema = Self {
            form_title: title.into(),
            pages,
        };
        if schema.pages.is_empty() {
            schema.pages.push(Page::new("Page 1"));
        }
        schema
    }

    /// Parses an imported definition, reporting the first missing
    /// attribute before any typed conversion happens.
    pub fn import(value: &serde_json::Value) -> Result<Self, SchemaError> {
        let pages = value
            .get("pages")
            .and_then(|p| p.as_array())
            .ok_or(SchemaError::MissingPages)?;

        for (page_index, page) in pages.iter().enumerate() {
            let page_no = page_index + 1;
            for attribute in ["id", "title"] {
                if !is_present(page.get(attribute)) {
                    return Err(SchemaError::PageAttribute {
                        page: page_no,
                        attribute,
                    });
                }
            }
            let fields = page
                .get("fields")
                .and_then(|f| f.as_array())
                .ok_or(SchemaError::PageAttribute {
                    page: page_no,
                    attribute: "fields array",
                })?;

            for (field_index, field) in fields.iter().enumerate() {
                for attribute in ["id", "type", "label"] {
                    if !is_present(field.get(attribute)) {
                        return Err(SchemaError::FieldAttribute {
                            page: page_no,
                            field: field_index + 1,
                            attribute,
                        });
                    }
                }
            }
        }

        let schema: FormSchema = serde_json::from_value(value.clone())
            .map_err(|e| SchemaError::Malformed(e.to_string()))?;
        schema.check_structure()?;
        Ok(schema)
    }

    /// Checks the invariants every stored schema must satisfy.
    pub fn check_structure(&self) -> Result<(), SchemaError> {
        if self.pages.is_empty() {
            return Err(SchemaError::MissingPages);
        }

        let mut page_ids = HashSet::new();
        let mut field_ids = HashSet::new();

        for (page_index, page) in self.pages.iter().enumerate() {
            let page_no = page_index + 1;
            if page.id.trim().is_empty() {
                return Err(SchemaError::PageAttribute {
                    page: page_no,
                    attribute: "id",
                });
            }
            if page.title.trim().is_empty() {
                return Err(SchemaError::PageAttribute {
                    page: page_no,
                    attribute: "title",
                });
            }
            if !page_ids.insert(page.id.as_str()) {
                return Err(SchemaError::DuplicatePageId(page.id.clone()));
            }

            for (field_index, field) in page.fields.iter().enumerate() {
                let field_no = field_index + 1;
                if field.id.trim().is_empty() {
                    return Err(SchemaError::FieldAttribute {
                        page: page_no,
                        field: field_no,
                        attribute: "id",
                    });
                }
                if field.label.trim().is_empty() {
                    return Err(SchemaError::FieldAttribute {
                        page: page_no,
                        field: field_no,
                        attribute: "label",
                    });
                }
                if !field_ids.insert(field.id.as_str()) {
                    return Err(SchemaError::DuplicateFieldId(field.id.clone()));
                }
            }
        }

        Ok(())
    }

    /// Structure plus the extra rules a published form must meet: options
    /// present where the type needs them and correct answers shaped for
    /// their type.
    pub fn check_publishable(&self) -> Result<(), SchemaError> {
        self.check_structure()?;

        for field in self.fields() {
            let field_type = field.field_type;
            if field_type.is_option_bearing() && field.options().is_empty() {
                return Err(SchemaError::MissingOptions {
                    field_id: field.id.clone(),
                    field_type: field_type.as_str(),
                });
            }
            if field.has_correct_answer && field_type.is_scorable() {
                let fits = field
                    .correct_answer
                    .as_ref()
                    .is_some_and(|answer| correct_answer_fits(field_type, answer));
                if !fits {
                    return Err(SchemaError::CorrectAnswerShape {
                        field_id: field.id.clone(),
                        field_type: field_type.as_str(),
                    });
                }
            }
        }

        Ok(())
    }

    /// All fields in page-then-field order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.pages.iter().flat_map(|page| page.fields.iter())
    }

    pub fn field(&self, field_id: &str) -> Option<&Field> {
        self.fields().find(|f| f.id == field_id)
    }

    pub fn field_mut(&mut self, field_id: &str) -> Option<&mut Field> {
        self.pages
            .iter_mut()
            .flat_map(|page| page.fields.iter_mut())
            .find(|f| f.id == field_id)
    }

    /// Index of the page that owns a field.
    pub fn page_of(&self, field_id: &str) -> Option<usize> {
        self.pages
            .iter()
            .position(|page| page.fields.iter().any(|f| f.id == field_id))
    }

    pub fn add_page(&mut self) -> &mut Page {
        let title = format!("Page {}", self.pages.len() + 1);
        self.pages.push(Page::new(title));
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// Removes a page. A form always keeps at least one page, so removing the
    /// only page leaves a fresh empty one in its place.
    pub fn remove_page(&mut self, index: usize) -> Option<Page> {
        if index >= self.pages.len() {
            return None;
        }
        let removed = self.pages.remove(index);
        if self.pages.is_empty() {
            self.pages.push(Page::new("Page 1"));
        }
        Some(removed)
    }

    /// Appends a field with the type's default attributes and returns its id.
    pub fn add_field(&mut self, page_index: usize, field_type: FieldType) -> Option<String> {
        let page = self.pages.get_mut(page_index)?;
        let field = Field::new(field_type);
        let id = field.id.clone();
        page.fields.push(field);
        Some(id)
    }

    pub fn remove_field(&mut self, field_id: &str) -> Option<Field> {
        for page in &mut self.pages {
            if let Some(pos) = page.fields.iter().position(|f| f.id == field_id) {
                return Some(page.fields.remove(pos));
            }
        }
        None
    }
}

fn is_present(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::String(s)) => !s.is_empty(),
        Some(serde_json::Value::Bool(b)) => *b,
        Some(_) => true,
    }
}

fn correct_answer_fits(field_type: FieldType, answer: &AnswerValue) -> bool {
    match field_type {
        FieldType::Checkbox | FieldType::MultiSelect => {
            matches!(answer, AnswerValue::List(_) | AnswerValue::Text(_))
        }
        FieldType::Ranking => match answer {
            AnswerValue::Ranks(_) => true,
            AnswerValue::Text(raw) => {
                serde_json::from_str::<AnswerValue>(raw)
                    .map(|parsed| matches!(parsed, AnswerValue::Ranks(_)))
                    .unwrap_or(false)
            }
            _ => false,
        },
        _ => answer.scalar_string().is_some(),
    }
}

/// Stored form document ("forms" collection): the schema plus publication
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub form_config: FormSchema,
    #[serde(default)]
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub submitted_user_ids: Vec<String>,
}

impl FormDocument {
    pub fn new(schema: FormSchema, created_by: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            form_config: schema,
            published: false,
            created_at: now,
            updated_at: now,
            published_at: None,
            created_by,
            submitted_user_ids: Vec::new(),
        }
    }

    pub fn has_submissions(&self) -> bool {
        !self.submitted_user_ids.is_empty()
    }

    pub fn has_submitted(&self, user_id: &str) -> bool {
        self.submitted_user_ids.iter().any(|id| id == user_id)
    }
}

/// Listing view of a form, with the per-user "already submitted" flag the
/// form list shows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSummary {
    pub id: String,
    pub form_title: String,
    pub published: bool,
    pub page_count: usize,
    pub field_count: usize,
    pub submission_count: usize,
    pub editable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_submitted: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

impl FormSummary {
    pub fn from_doc(doc: &FormDocument, viewer: Option<&str>) -> Self {
        Self {
            id: doc.id.clone(),
            form_title: doc.form_config.form_title.clone(),
            published: doc.published,
            page_count: doc.form_config.pages.len(),
            field_count: doc.form_config.fields().count(),
            submission_count: doc.submitted_user_ids.len(),
            editable: !doc.has_submissions(),
            already_submitted: viewer.map(|user_id| doc.has_submitted(user_id)),
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFormRequest {
    #[validate(length(max = 128, message = "createdBy must be at most 128 characters"))]
    pub created_by: Option<String>,
    pub form_config: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFormRequest {
    pub form_config: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    #[validate(length(max = 500, message = "Message must be at most 500 characters"))]
    pub message: Option<String>,
    #[serde(default = "default_notify")]
    pub notify: bool,
}

fn default_notify() -> bool {
    true
}

impl Default for PublishRequest {
    fn default() -> Self {
        Self {
            message: None,
            notify: default_notify(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFormsQuery {
    #[serde(default)]
    pub published: bool,
    pub user_id: Option<String>,
}
