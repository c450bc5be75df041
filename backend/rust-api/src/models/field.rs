use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::answer::AnswerValue;

/// Closed set of input types a form field can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    MultiText,
    Select,
    MultiSelect,
    Radio,
    Checkbox,
    Boolean,
    Slider,
    Rating,
    File,
    Image,
    Ranking,
}

impl FieldType {
    pub const ALL: [FieldType; 13] = [
        FieldType::Text,
        FieldType::Textarea,
        FieldType::MultiText,
        FieldType::Select,
        FieldType::MultiSelect,
        FieldType::Radio,
        FieldType::Checkbox,
        FieldType::Boolean,
        FieldType::Slider,
        FieldType::Rating,
        FieldType::File,
        FieldType::Image,
        FieldType::Ranking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::MultiText => "multi-text",
            FieldType::Select => "select",
            FieldType::MultiSelect => "multi-select",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Boolean => "boolean",
            FieldType::Slider => "slider",
            FieldType::Rating => "rating",
            FieldType::File => "file",
            FieldType::Image => "image",
            FieldType::Ranking => "ranking",
        }
    }

    /// Capitalised type name, as used in default labels ("Multi-text Field").
    pub fn display_name(&self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Lenient parse used for stored schemas: anything unknown is a text field.
    pub fn from_str_lossy(value: &str) -> Self {
        FieldType::from_str(value).unwrap_or_else(|_| {
            tracing::debug!("Unknown field type {:?}, treating as text", value);
            FieldType::Text
        })
    }

    pub fn is_option_bearing(&self) -> bool {
        matches!(
            self,
            FieldType::Select
                | FieldType::MultiSelect
                | FieldType::Radio
                | FieldType::Checkbox
                | FieldType::Ranking
                | FieldType::Boolean
        )
    }

    pub fn is_numeric_range(&self) -> bool {
        matches!(self, FieldType::Slider)
    }

    pub fn is_multi_valued(&self) -> bool {
        matches!(self, FieldType::Checkbox | FieldType::MultiSelect)
    }

    pub fn is_file_upload(&self) -> bool {
        matches!(self, FieldType::File | FieldType::Image)
    }

    /// Whether a declared correct answer can be compared against submissions.
    pub fn is_scorable(&self) -> bool {
        !matches!(self, FieldType::File | FieldType::Image | FieldType::MultiText)
    }

    /// Whether answers tally into a discrete distribution for analytics.
    pub fn is_summarizable(&self) -> bool {
        matches!(
            self,
            FieldType::Radio
                | FieldType::Select
                | FieldType::Checkbox
                | FieldType::Boolean
                | FieldType::Ranking
        )
    }

    /// New fields of answerable types start with a correct-answer slot enabled.
    pub fn has_answer_by_default(&self) -> bool {
        self.is_scorable()
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace('_', "-");
        FieldType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Invalid field type: {}", value))
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(FieldType::from_str_lossy(&raw))
    }
}

/// Type-specific attribute skeleton for a newly added field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldAttributes {
    pub options: Option<Vec<String>>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub textbox_count: Option<u32>,
    pub multiple: Option<bool>,
}

pub const DEFAULT_SLIDER_MIN: f64 = 0.0;
pub const DEFAULT_SLIDER_MAX: f64 = 100.0;
pub const DEFAULT_TEXTBOX_COUNT: u32 = 2;

pub fn default_attributes_for(field_type: FieldType) -> FieldAttributes {
    match field_type {
        FieldType::Boolean => FieldAttributes {
            options: Some(vec!["Yes".to_string(), "No".to_string()]),
            ..Default::default()
        },
        t if t.is_option_bearing() => FieldAttributes {
            options: Some(vec!["Option 1".to_string(), "Option 2".to_string()]),
            ..Default::default()
        },
        FieldType::Slider => FieldAttributes {
            min: Some(DEFAULT_SLIDER_MIN),
            max: Some(DEFAULT_SLIDER_MAX),
            ..Default::default()
        },
        FieldType::MultiText => FieldAttributes {
            textbox_count: Some(DEFAULT_TEXTBOX_COUNT),
            ..Default::default()
        },
        FieldType::File | FieldType::Image => FieldAttributes {
            multiple: Some(false),
            ..Default::default()
        },
        _ => FieldAttributes::default(),
    }
}

/// One question on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub textbox_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple: Option<bool>,
    #[serde(default)]
    pub has_correct_answer: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<AnswerValue>,
}

impl Field {
    /// A field of the given type with its default label and attributes.
    pub fn new(field_type: FieldType) -> Self {
        let attrs = default_attributes_for(field_type);
        let has_answer = field_type.has_answer_by_default();
        Self {
            id: format!("field_{}", Uuid::new_v4().simple()),
            field_type,
            label: default_label(field_type),
            placeholder: Some(String::new()),
            required: false,
            options: attrs.options,
            min: attrs.min,
            max: attrs.max,
            textbox_count: attrs.textbox_count,
            multiple: attrs.multiple,
            has_correct_answer: has_answer,
            correct_answer: has_answer.then(|| AnswerValue::text("")),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_correct_answer(mut self, answer: impl Into<AnswerValue>) -> Self {
        self.has_correct_answer = true;
        self.correct_answer = Some(answer.into());
        self
    }

    pub fn without_correct_answer(mut self) -> Self {
        self.set_answer_flag(false);
        self
    }

    pub fn options(&self) -> &[String] {
        self.options.as_deref().unwrap_or(&[])
    }

    pub fn textbox_count(&self) -> u32 {
        self.textbox_count.unwrap_or(DEFAULT_TEXTBOX_COUNT).max(1)
    }

    pub fn slider_bounds(&self) -> (f64, f64) {
        (
            self.min.unwrap_or(DEFAULT_SLIDER_MIN),
            self.max.unwrap_or(DEFAULT_SLIDER_MAX),
        )
    }

    /// Switches the field to another type. The label resets to the new
    /// type's default, attributes the new type does not use are cleared, and
    /// attributes it does use survive when already set.
    pub fn change_type(&mut self, new_type: FieldType) {
        let defaults = default_attributes_for(new_type);
        let has_answer = new_type.has_answer_by_default();

        self.field_type = new_type;
        self.label = default_label(new_type);
        self.has_correct_answer = has_answer;
        self.correct_answer = if has_answer {
            self.correct_answer
                .take()
                .or_else(|| Some(AnswerValue::text("")))
        } else {
            Some(AnswerValue::text(""))
        };

        self.options = match new_type {
            FieldType::Boolean => defaults.options,
            t if t.is_option_bearing() => self
                .options
                .take()
                .filter(|o| !o.is_empty())
                .or(defaults.options),
            _ => Some(Vec::new()),
        };

        if new_type.is_numeric_range() {
            self.min = self.min.or(defaults.min);
            self.max = self.max.or(defaults.max);
        } else {
            self.min = None;
            self.max = None;
        }

        self.textbox_count = if new_type == FieldType::MultiText {
            self.textbox_count.or(defaults.textbox_count)
        } else {
            None
        };

        self.multiple = if new_type.is_file_upload() {
            self.multiple.or(defaults.multiple)
        } else {
            None
        };
    }

    /// Toggles whether the field is graded; turning it off discards the
    /// stored answer.
    pub fn set_answer_flag(&mut self, has_answer: bool) {
        self.has_correct_answer = has_answer;
        if !has_answer {
            self.correct_answer = Some(AnswerValue::text(""));
        }
    }

    pub fn set_textbox_count(&mut self, count: u32) {
        self.textbox_count = Some(count.max(1));
    }
}

pub fn default_label(field_type: FieldType) -> String {
    format!("{} Field", field_type.display_name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_types_and_falls_back_to_text() {
        assert_eq!(FieldType::from_str("multi-select").unwrap(), FieldType::MultiSelect);
        assert_eq!(FieldType::from_str("Multi_Text").unwrap(), FieldType::MultiText);
        assert!(FieldType::from_str("signature").is_err());
        assert_eq!(FieldType::from_str_lossy("signature"), FieldType::Text);

        let parsed: FieldType = serde_json::from_str("\"date\"").unwrap();
        assert_eq!(parsed, FieldType::Text);
    }

    #[test]
    fn serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&FieldType::MultiText).unwrap(),
            "\"multi-text\""
        );
        for t in FieldType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json.trim_matches('"'), t.as_str());
        }
    }

    #[test]
    fn registry_classification() {
        assert!(FieldType::Boolean.is_option_bearing());
        assert!(!FieldType::Slider.is_option_bearing());
        assert!(FieldType::Slider.is_numeric_range());
        for t in [FieldType::File, FieldType::Image, FieldType::MultiText] {
            assert!(!t.is_scorable(), "{} should not be scorable", t.as_str());
        }
        assert!(FieldType::Ranking.is_scorable());
        assert!(FieldType::Ranking.is_summarizable());
        assert!(!FieldType::MultiSelect.is_summarizable());
    }

    #[test]
    fn default_attributes_per_type() {
        assert_eq!(
            default_attributes_for(FieldType::Radio).options,
            Some(vec!["Option 1".to_string(), "Option 2".to_string()])
        );
        assert_eq!(
            default_attributes_for(FieldType::Boolean).options,
            Some(vec!["Yes".to_string(), "No".to_string()])
        );
        let slider = default_attributes_for(FieldType::Slider);
        assert_eq!((slider.min, slider.max), (Some(0.0), Some(100.0)));
        assert_eq!(
            default_attributes_for(FieldType::MultiText).textbox_count,
            Some(2)
        );
        assert_eq!(default_attributes_for(FieldType::Text), FieldAttributes::default());
    }

    #[test]
    fn new_field_uses_default_label_and_answer_slot() {
        let field = Field::new(FieldType::MultiText);
        assert_eq!(field.label, "Multi-text Field");
        assert!(!field.has_correct_answer);
        assert!(field.id.starts_with("field_"));

        let radio = Field::new(FieldType::Radio);
        assert!(radio.has_correct_answer);
        assert_eq!(radio.options().len(), 2);
    }

    #[test]
    fn change_type_keeps_compatible_attributes() {
        let mut field = Field::new(FieldType::Radio).with_options(["Red", "Blue", "Green"]);
        field.correct_answer = Some(AnswerValue::text("Red"));

        field.change_type(FieldType::Checkbox);
        assert_eq!(field.options().len(), 3);
        assert_eq!(field.correct_answer, Some(AnswerValue::text("Red")));
        assert_eq!(field.label, "Checkbox Field");

        field.change_type(FieldType::Slider);
        assert!(field.options().is_empty());
        assert_eq!(field.slider_bounds(), (0.0, 100.0));

        field.change_type(FieldType::File);
        assert_eq!(field.min, None);
        assert_eq!(field.multiple, Some(false));
        assert!(!field.has_correct_answer);
    }

    #[test]
    fn textbox_count_never_below_one() {
        let mut field = Field::new(FieldType::MultiText);
        field.set_textbox_count(0);
        assert_eq!(field.textbox_count(), 1);
    }
}
