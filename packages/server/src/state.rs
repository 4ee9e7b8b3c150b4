use std::sync::Arc;

use common::{KeyedMutex, storage::ObjectStore};

use crate::config::AppConfig;
use crate::document::{CoordinatorOptions, DocumentCoordinator, DocumentRepository, UploadPolicy};

#[derive(Clone)]
pub struct AppState {
    pub documents: Arc<DocumentCoordinator>,
    pub config: AppConfig,
}

impl AppState {
    /// Wire a document coordinator from `config` over the given backends.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn ObjectStore>,
        repository: Arc<dyn DocumentRepository>,
    ) -> Self {
        let documents = DocumentCoordinator::new(
            store,
            repository,
            KeyedMutex::new(),
            UploadPolicy::from_config(&config.documents),
            CoordinatorOptions::from_config(&config.documents, &config.storage),
        );
        Self {
            documents: Arc::new(documents),
            config,
        }
    }
}
