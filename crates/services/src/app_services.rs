use std::sync::Arc;

use quiz_core::model::{Subject, filter_subjects};
use storage::repository::{QuestionBank, Storage};
use tracing::info;

use crate::Clock;
use crate::error::{LoadError, QuizError, QuizServicesError};
use crate::remote_bank::{RemoteBankConfig, RemoteQuestionBank};
use crate::sessions::{ControllerSettings, SessionController, SharedController};

/// Assembles the controller and the subject catalog over one storage backend.
#[derive(Clone)]
pub struct QuizServices {
    controller: SharedController,
    catalog: Arc<dyn QuestionBank>,
}

impl QuizServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// Questions come from `remote` when given, otherwise from the database.
    ///
    /// # Errors
    ///
    /// Returns `QuizServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: ControllerSettings,
        remote: Option<RemoteBankConfig>,
    ) -> Result<Self, QuizServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::assemble(storage, clock, settings, remote))
    }

    /// Build services over a fresh in-memory store.
    #[must_use]
    pub fn in_memory(clock: Clock, settings: ControllerSettings) -> Self {
        Self::assemble(Storage::in_memory(), clock, settings, None)
    }

    /// Build services over an existing storage aggregate.
    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, settings: ControllerSettings) -> Self {
        Self::assemble(storage, clock, settings, None)
    }

    fn assemble(
        mut storage: Storage,
        clock: Clock,
        settings: ControllerSettings,
        remote: Option<RemoteBankConfig>,
    ) -> Self {
        if let Some(config) = remote {
            info!(url = %config.base_url, "using remote question bank");
            storage.questions = Arc::new(RemoteQuestionBank::new(config));
        }
        let catalog = Arc::clone(&storage.questions);
        let controller = SessionController::from_storage(clock, &storage)
            .with_settings(settings)
            .into_shared();
        Self {
            controller,
            catalog,
        }
    }

    #[must_use]
    pub fn controller(&self) -> SharedController {
        SharedController::clone(&self.controller)
    }

    /// Subjects in catalog order, optionally filtered by a name query.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Load` if the catalog cannot be read.
    pub async fn list_subjects(&self, query: Option<&str>) -> Result<Vec<Subject>, QuizError> {
        let subjects = self
            .catalog
            .list_subjects()
            .await
            .map_err(LoadError::Unavailable)?;
        Ok(match query {
            Some(q) => filter_subjects(&subjects, q).into_iter().cloned().collect(),
            None => subjects,
        })
    }
}
