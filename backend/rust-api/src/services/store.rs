//! Persistence for form documents, submissions and notification tokens.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::{Collection, Database};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::models::answer::Submission;
use crate::models::form::{FormDocument, FormSchema};

pub const FORMS_COLLECTION: &str = "forms";
pub const SUBMISSIONS_COLLECTION: &str = "formSubmissions";
pub const TOKENS_COLLECTION: &str = "userTokens";

#[async_trait]
pub trait FormStore: Send + Sync {
    async fn insert_form(&self, form: &FormDocument) -> Result<()>;

    async fn get_form(&self, form_id: &str) -> Result<Option<FormDocument>>;

    /// Newest first.
    async fn list_forms(&self, published_only: bool) -> Result<Vec<FormDocument>>;

    /// Swaps the schema of a form that nobody has submitted to, provided its
    /// publication state is still `published`. Returns the updated document,
    /// or `None` when no form matches those conditions.
    async fn replace_schema(
        &self,
        form_id: &str,
        schema: &FormSchema,
        published: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<FormDocument>>;

    async fn set_published(
        &self,
        form_id: &str,
        published: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<FormDocument>>;

    /// Adds a user to the form's submitter list. Returns false if the user
    /// was already on it (or the form is gone).
    async fn record_submitter(&self, form_id: &str, user_id: &str) -> Result<bool>;

    async fn release_submitter(&self, form_id: &str, user_id: &str) -> Result<()>;

    async fn insert_submission(&self, submission: &Submission) -> Result<()>;

    /// Oldest first.
    async fn list_submissions(&self, form_id: &str) -> Result<Vec<Submission>>;

    async fn get_submission(&self, form_id: &str, submission_id: &str)
        -> Result<Option<Submission>>;

    async fn count_submissions(&self, form_id: &str) -> Result<u64>;

    /// Push tokens of every user who enabled notifications.
    async fn notification_tokens(&self) -> Result<Vec<String>>;

    async fn ping(&self) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct TokenRecord {
    #[serde(default)]
    token: Option<String>,
}

pub struct MongoFormStore {
    mongo: Database,
}

impl MongoFormStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn forms(&self) -> Collection<FormDocument> {
        self.mongo.collection::<FormDocument>(FORMS_COLLECTION)
    }

    fn submissions(&self) -> Collection<Submission> {
        self.mongo.collection::<Submission>(SUBMISSIONS_COLLECTION)
    }

    /// Indexes used by the submission listing and the one-per-user check.
    pub async fn ensure_indexes(&self) -> Result<()> {
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        let by_form = IndexModel::builder()
            .keys(doc! { "formId": 1, "submittedAt": 1 })
            .build();
        let one_per_user = IndexModel::builder()
            .keys(doc! { "formId": 1, "submitter.userId": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.submissions()
            .create_indexes([by_form, one_per_user])
            .await
            .context("Failed to create submission indexes")?;
        Ok(())
    }
}

#[async_trait]
impl FormStore for MongoFormStore {
    async fn insert_form(&self, form: &FormDocument) -> Result<()> {
        self.forms()
            .insert_one(form)
            .await
            .context("Failed to insert form")?;
        Ok(())
    }

    async fn get_form(&self, form_id: &str) -> Result<Option<FormDocument>> {
        self.forms()
            .find_one(doc! { "_id": form_id })
            .await
            .context("Failed to query form")
    }

    async fn list_forms(&self, published_only: bool) -> Result<Vec<FormDocument>> {
        let filter = if published_only {
            doc! { "published": true }
        } else {
            doc! {}
        };
        let cursor = self
            .forms()
            .find(filter)
            .sort(doc! { "createdAt": -1 })
            .await
            .context("Failed to query forms")?;
        cursor
            .try_collect()
            .await
            .context("Failed to read forms cursor")
    }

    async fn replace_schema(
        &self,
        form_id: &str,
        schema: &FormSchema,
        published: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<FormDocument>> {
        let schema = mongodb::bson::to_bson(schema).context("Failed to encode form schema")?;
        let at = mongodb::bson::to_bson(&at).context("Failed to encode timestamp")?;

        // Matches missing and empty submitter lists alike
        let filter = doc! {
            "_id": form_id,
            "published": published,
            "submittedUserIds.0": { "$exists": false },
        };
        let result = self
            .forms()
            .update_one(
                filter,
                doc! { "$set": { "formConfig": schema, "updatedAt": at } },
            )
            .await
            .context("Failed to update form schema")?;
        if result.matched_count == 0 {
            return Ok(None);
        }
        self.get_form(form_id).await
    }

    async fn set_published(
        &self,
        form_id: &str,
        published: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<FormDocument>> {
        let at = mongodb::bson::to_bson(&at).context("Failed to encode timestamp")?;
        let mut set = Document::new();
        set.insert("published", published);
        set.insert("updatedAt", at.clone());
        if published {
            set.insert("publishedAt", at);
        }

        let result = self
            .forms()
            .update_one(doc! { "_id": form_id }, doc! { "$set": set })
            .await
            .context("Failed to update publication state")?;
        if result.matched_count == 0 {
            return Ok(None);
        }
        self.get_form(form_id).await
    }

    async fn record_submitter(&self, form_id: &str, user_id: &str) -> Result<bool> {
        let result = self
            .forms()
            .update_one(
                doc! { "_id": form_id },
                doc! { "$addToSet": { "submittedUserIds": user_id } },
            )
            .await
            .context("Failed to record submitter")?;
        Ok(result.modified_count > 0)
    }

    async fn release_submitter(&self, form_id: &str, user_id: &str) -> Result<()> {
        self.forms()
            .update_one(
                doc! { "_id": form_id },
                doc! { "$pull": { "submittedUserIds": user_id } },
            )
            .await
            .context("Failed to release submitter")?;
        Ok(())
    }

    async fn insert_submission(&self, submission: &Submission) -> Result<()> {
        self.submissions()
            .insert_one(submission)
            .await
            .context("Failed to insert submission")?;
        Ok(())
    }

    async fn list_submissions(&self, form_id: &str) -> Result<Vec<Submission>> {
        let cursor = self
            .submissions()
            .find(doc! { "formId": form_id })
            .sort(doc! { "submittedAt": 1 })
            .await
            .context("Failed to query submissions")?;
        cursor
            .try_collect()
            .await
            .context("Failed to read submissions cursor")
    }

    async fn get_submission(
        &self,
        form_id: &str,
        submission_id: &str,
    ) -> Result<Option<Submission>> {
        self.submissions()
            .find_one(doc! { "_id": submission_id, "formId": form_id })
            .await
            .context("Failed to query submission")
    }

    async fn count_submissions(&self, form_id: &str) -> Result<u64> {
        self.submissions()
            .count_documents(doc! { "formId": form_id })
            .await
            .context("Failed to count submissions")
    }

    async fn notification_tokens(&self) -> Result<Vec<String>> {
        let records: Vec<TokenRecord> = self
            .mongo
            .collection::<TokenRecord>(TOKENS_COLLECTION)
            .find(doc! {})
            .await
            .context("Failed to query user tokens")?
            .try_collect()
            .await
            .context("Failed to read user tokens cursor")?;

        Ok(records
            .into_iter()
            .filter_map(|r| r.token)
            .filter(|t| !t.is_empty())
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.mongo
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        Ok(())
    }
}

/// Process-local store used by tests and `STORAGE_BACKEND=memory`.
#[derive(Default)]
pub struct MemoryFormStore {
    forms: RwLock<HashMap<String, FormDocument>>,
    submissions: RwLock<Vec<Submission>>,
    tokens: RwLock<Vec<String>>,
}

impl MemoryFormStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: RwLock::new(tokens.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub async fn add_token(&self, token: impl Into<String>) {
        self.tokens.write().await.push(token.into());
    }
}

#[async_trait]
impl FormStore for MemoryFormStore {
    async fn insert_form(&self, form: &FormDocument) -> Result<()> {
        let mut forms = self.forms.write().await;
        if forms.contains_key(&form.id) {
            anyhow::bail!("Form {} already exists", form.id);
        }
        forms.insert(form.id.clone(), form.clone());
        Ok(())
    }

    async fn get_form(&self, form_id: &str) -> Result<Option<FormDocument>> {
        Ok(self.forms.read().await.get(form_id).cloned())
    }

    async fn list_forms(&self, published_only: bool) -> Result<Vec<FormDocument>> {
        let forms = self.forms.read().await;
        let mut list: Vec<FormDocument> = forms
            .values()
            .filter(|f| !published_only || f.published)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    async fn replace_schema(
        &self,
        form_id: &str,
        schema: &FormSchema,
        published: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<FormDocument>> {
        let mut forms = self.forms.write().await;
        Ok(forms
            .get_mut(form_id)
            .filter(|form| form.published == published && !form.has_submissions())
            .map(|form| {
                form.form_config = schema.clone();
                form.updated_at = at;
                form.clone()
            }))
    }

    async fn set_published(
        &self,
        form_id: &str,
        published: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<FormDocument>> {
        let mut forms = self.forms.write().await;
        Ok(forms.get_mut(form_id).map(|form| {
            form.published = published;
            form.updated_at = at;
            if published {
                form.published_at = Some(at);
            }
            form.clone()
        }))
    }

    async fn record_submitter(&self, form_id: &str, user_id: &str) -> Result<bool> {
        let mut forms = self.forms.write().await;
        match forms.get_mut(form_id) {
            Some(form) if !form.has_submitted(user_id) => {
                form.submitted_user_ids.push(user_id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_submitter(&self, form_id: &str, user_id: &str) -> Result<()> {
        if let Some(form) = self.forms.write().await.get_mut(form_id) {
            form.submitted_user_ids.retain(|id| id != user_id);
        }
        Ok(())
    }

    async fn insert_submission(&self, submission: &Submission) -> Result<()> {
        self.submissions.write().await.push(submission.clone());
        Ok(())
    }

    async fn list_submissions(&self, form_id: &str) -> Result<Vec<Submission>> {
        let submissions = self.submissions.read().await;
        let mut list: Vec<Submission> = submissions
            .iter()
            .filter(|s| s.form_id == form_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(list)
    }

    async fn get_submission(
        &self,
        form_id: &str,
        submission_id: &str,
    ) -> Result<Option<Submission>> {
        Ok(self
            .submissions
            .read()
            .await
            .iter()
            .find(|s| s.form_id == form_id && s.id == submission_id)
            .cloned())
    }

    async fn count_submissions(&self, form_id: &str) -> Result<u64> {
        Ok(self
            .submissions
            .read()
            .await
            .iter()
            .filter(|s| s.form_id == form_id)
            .count() as u64)
    }

    async fn notification_tokens(&self) -> Result<Vec<String>> {
        Ok(self.tokens.read().await.clone())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::answer::SubmitterIdentity;
    use crate::models::form::FormSchema;

    fn submission(form_id: &str, id: &str, user: &str) -> Submission {
        Submission {
            id: id.to_string(),
            form_id: form_id.to_string(),
            form_title: "Survey".to_string(),
            answers: Default::default(),
            submitted_at: Utc::now(),
            submitter: SubmitterIdentity {
                user_id: user.to_string(),
                name: None,
            },
        }
    }

    #[tokio::test]
    async fn memory_store_round_trips_forms() {
        let store = MemoryFormStore::new();
        let form = FormDocument::new(FormSchema::new("Survey"), None);
        store.insert_form(&form).await.unwrap();

        assert!(store.insert_form(&form).await.is_err());
        let loaded = store.get_form(&form.id).await.unwrap().unwrap();
        assert_eq!(loaded.form_config, form.form_config);
        assert!(store.list_forms(true).await.unwrap().is_empty());

        let published = store
            .set_published(&form.id, true, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert!(published.published);
        assert!(published.published_at.is_some());
        assert_eq!(store.list_forms(true).await.unwrap().len(), 1);
        assert!(store.set_published("missing", true, Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn submitter_is_recorded_once() {
        let store = MemoryFormStore::new();
        let form = FormDocument::new(FormSchema::new("Survey"), None);
        store.insert_form(&form).await.unwrap();

        assert!(store.record_submitter(&form.id, "u1").await.unwrap());
        assert!(!store.record_submitter(&form.id, "u1").await.unwrap());
        assert!(!store.record_submitter("missing", "u1").await.unwrap());

        store.release_submitter(&form.id, "u1").await.unwrap();
        let loaded = store.get_form(&form.id).await.unwrap().unwrap();
        assert!(!loaded.has_submissions());
    }

    #[tokio::test]
    async fn schema_replacement_requires_untouched_form() {
        let store = MemoryFormStore::new();
        let form = FormDocument::new(FormSchema::new("Survey"), None);
        store.insert_form(&form).await.unwrap();

        let updated = store
            .replace_schema(&form.id, &FormSchema::new("Edited"), false, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.form_config.form_title, "Edited");

        // publication state changed since the caller loaded the form
        assert!(store
            .replace_schema(&form.id, &FormSchema::new("Stale"), true, Utc::now())
            .await
            .unwrap()
            .is_none());

        store.record_submitter(&form.id, "u1").await.unwrap();
        assert!(store
            .replace_schema(&form.id, &FormSchema::new("Late"), false, Utc::now())
            .await
            .unwrap()
            .is_none());
        let loaded = store.get_form(&form.id).await.unwrap().unwrap();
        assert_eq!(loaded.form_config.form_title, "Edited");
        assert!(loaded.has_submitted("u1"));
    }

    #[tokio::test]
    async fn submissions_are_scoped_to_their_form() {
        let store = MemoryFormStore::new();
        store.insert_submission(&submission("a", "s1", "u1")).await.unwrap();
        store.insert_submission(&submission("a", "s2", "u2")).await.unwrap();
        store.insert_submission(&submission("b", "s3", "u1")).await.unwrap();

        assert_eq!(store.count_submissions("a").await.unwrap(), 2);
        let ids: Vec<_> = store
            .list_submissions("a")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert!(store.get_submission("b", "s1").await.unwrap().is_none());
        assert!(store.get_submission("b", "s3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn tokens_are_returned_as_seeded() {
        let store = MemoryFormStore::with_tokens(["t1"]);
        store.add_token("t2").await;
        assert_eq!(store.notification_tokens().await.unwrap(), vec!["t1", "t2"]);
    }
}
