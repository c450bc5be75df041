pub mod analytics;
pub mod answer;
pub mod field;
pub mod form;
pub mod scoring;

pub use answer::{AnswerSet, AnswerValue, Submission};
pub use field::{Field, FieldType};
pub use form::{FormDocument, FormSchema, Page, SchemaError};
