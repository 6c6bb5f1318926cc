use std::env;

use async_trait::async_trait;
use quiz_core::model::{Question, Subject, SubjectId};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use storage::repository::{QuestionBank, StorageError};
use tracing::debug;

use crate::error::RemoteBankError;

#[derive(Clone, Debug)]
pub struct RemoteBankConfig {
    pub base_url: String,
}

impl RemoteBankConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Read `QUIZ_BANK_URL`; `None` when unset or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("QUIZ_BANK_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        Some(Self::new(base_url.trim()))
    }
}

/// Question bank served over HTTP.
///
/// `GET <base>?action=subjects` lists the catalog and
/// `GET <base>?action=questions&subject=<id>` returns one subject's questions.
/// Both answer with a `{ success, data, error }` envelope.
#[derive(Clone, Debug)]
pub struct RemoteQuestionBank {
    client: Client,
    config: RemoteBankConfig,
}

impl RemoteQuestionBank {
    #[must_use]
    pub fn new(config: RemoteBankConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn fetch<T: DeserializeOwned>(&self, query: &[(&str, &str)]) -> Result<T, RemoteBankError> {
        debug!(url = %self.config.base_url, ?query, "question bank request");
        let response = self
            .client
            .get(&self.config.base_url)
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RemoteBankError::HttpStatus(response.status()));
        }

        let body: Envelope<T> = response.json().await?;
        unwrap_envelope(body)
    }
}

#[async_trait]
impl QuestionBank for RemoteQuestionBank {
    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError> {
        Ok(self.fetch(&[("action", "subjects")]).await?)
    }

    async fn get_questions(&self, subject_id: &SubjectId) -> Result<Vec<Question>, StorageError> {
        Ok(self
            .fetch(&[("action", "questions"), ("subject", subject_id.as_str())])
            .await?)
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

fn unwrap_envelope<T>(body: Envelope<T>) -> Result<T, RemoteBankError> {
    if !body.success {
        return Err(RemoteBankError::Rejected(
            body.error.unwrap_or_else(|| "unknown error".to_string()),
        ));
    }
    body.data.ok_or(RemoteBankError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse<T: DeserializeOwned>(raw: &str) -> Result<T, RemoteBankError> {
        unwrap_envelope(serde_json::from_str::<Envelope<T>>(raw).unwrap())
    }

    #[test]
    fn success_envelope_yields_questions() {
        let raw = r#"{
            "success": true,
            "data": [
                {"question": "2 + 2?", "options": ["3", "4"], "correctAnswer": 1, "explanation": "math"}
            ]
        }"#;
        let questions: Vec<Question> = parse(raw).unwrap();
        assert_eq!(questions.len(), 1);
        assert!(questions[0].is_correct(1));
        assert_eq!(questions[0].hint(), "math");
    }

    #[test]
    fn failure_envelope_carries_message() {
        let err = parse::<Vec<Subject>>(r#"{"success": false, "error": "sheet missing"}"#)
            .unwrap_err();
        assert!(matches!(err, RemoteBankError::Rejected(ref m) if m == "sheet missing"));
        assert!(matches!(StorageError::from(err), StorageError::Serialization(_)));
    }

    #[test]
    fn success_without_data_is_empty_response() {
        let err = parse::<Vec<Subject>>(r#"{"success": true}"#).unwrap_err();
        assert!(matches!(err, RemoteBankError::EmptyResponse));
    }

    #[test]
    fn not_found_status_maps_to_not_found() {
        let err = RemoteBankError::HttpStatus(reqwest::StatusCode::NOT_FOUND);
        assert!(matches!(StorageError::from(err), StorageError::NotFound));
    }
}
