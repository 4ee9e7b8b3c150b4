use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tempfile::TempDir;
use uuid::Uuid;

use common::storage::{BoxReader, FilesystemObjectStore, ObjectKey, ObjectStore, StorageError};
use common::{KeyedMutex, StorageAppConfig};
use server::config::{AppConfig, CorsConfig, DatabaseConfig, DocumentConfig, ServerConfig};
use server::document::{
    CoordinatorOptions, DocumentCoordinator, DocumentRecord, DocumentRepository, MetadataError,
    UploadPolicy,
};
use server::state::AppState;

pub const PDF: &[u8] = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n1 0 obj\n<< /Type /Catalog >>\nendobj\n";
pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01";

/// In-memory metadata store with switchable failures.
///
/// A write delay is applied before the write takes effect, so a caller that
/// stops waiting leaves the rows untouched. A commit delay is applied after,
/// so the write lands even when the caller has given up.
#[derive(Default)]
pub struct MemoryDocumentRepository {
    rows: Mutex<HashMap<Uuid, DocumentRecord>>,
    pub fail_create: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_delete: AtomicBool,
    /// Once a write has landed, every read fails.
    pub fail_reads_after_write: AtomicBool,
    reads_failing: AtomicBool,
    write_delay_ms: AtomicU64,
    commit_delay_ms: AtomicU64,
}

impl MemoryDocumentRepository {
    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_commit_delay(&self, delay: Duration) {
        self.commit_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn get(&self, id: Uuid) -> Option<DocumentRecord> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    async fn before_write(&self, fail: &AtomicBool) -> Result<(), MetadataError> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if fail.load(Ordering::SeqCst) {
            return Err(MetadataError::Database("injected failure".into()));
        }
        Ok(())
    }

    async fn after_write(&self) {
        if self.fail_reads_after_write.load(Ordering::SeqCst) {
            self.reads_failing.store(true, Ordering::SeqCst);
        }
        let delay = self.commit_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

#[async_trait]
impl DocumentRepository for MemoryDocumentRepository {
    async fn create(&self, record: &DocumentRecord) -> Result<(), MetadataError> {
        self.before_write(&self.fail_create).await?;
        {
            let mut rows = self.rows.lock().unwrap();
            if rows.contains_key(&record.id) {
                return Err(MetadataError::Conflict(record.id));
            }
            rows.insert(record.id, record.clone());
        }
        self.after_write().await;
        Ok(())
    }

    async fn update(&self, record: &DocumentRecord) -> Result<(), MetadataError> {
        self.before_write(&self.fail_update).await?;
        let updated = match self.rows.lock().unwrap().get_mut(&record.id) {
            Some(row) => {
                *row = record.clone();
                true
            }
            None => false,
        };
        if !updated {
            return Err(MetadataError::NotFound(record.id));
        }
        self.after_write().await;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), MetadataError> {
        self.before_write(&self.fail_delete).await?;
        let removed = self.rows.lock().unwrap().remove(&id);
        if removed.is_none() {
            return Err(MetadataError::NotFound(id));
        }
        self.after_write().await;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<DocumentRecord, MetadataError> {
        if self.reads_failing.load(Ordering::SeqCst) {
            return Err(MetadataError::Database("injected read failure".into()));
        }
        self.get(id).ok_or(MetadataError::NotFound(id))
    }
}

/// Filesystem store that can be told to fail writes or deletes, or to answer
/// existence checks slowly.
pub struct FaultyStore {
    inner: FilesystemObjectStore,
    pub fail_save: AtomicBool,
    /// Deletes of keys starting with this prefix fail.
    fail_delete_prefix: Mutex<Option<String>>,
    exists_delay_ms: AtomicU64,
}

impl FaultyStore {
    pub fn set_exists_delay(&self, delay: Duration) {
        self.exists_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn fail_deletes_under(&self, prefix: &str) {
        *self.fail_delete_prefix.lock().unwrap() = Some(prefix.to_string());
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn save(&self, key: &ObjectKey, reader: BoxReader) -> Result<String, StorageError> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected save failure".into()));
        }
        self.inner.save(key, reader).await
    }

    async fn open(&self, key: &ObjectKey) -> Result<BoxReader, StorageError> {
        self.inner.open(key).await
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StorageError> {
        let failing = self
            .fail_delete_prefix
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|prefix| key.as_str().starts_with(prefix));
        if failing {
            return Err(StorageError::Backend("injected delete failure".into()));
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool, StorageError> {
        let delay = self.exists_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.exists(key).await
    }

    fn url(&self, key: &ObjectKey) -> String {
        self.inner.url(key)
    }
}

/// A coordinator over a temporary directory and an in-memory repository.
pub struct TestCoordinator {
    pub coordinator: DocumentCoordinator,
    pub store: Arc<FaultyStore>,
    pub repo: Arc<MemoryDocumentRepository>,
    pub root: PathBuf,
    _dir: TempDir,
}

impl TestCoordinator {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = dir.path().join("documents");
        let inner = FilesystemObjectStore::new(root.clone(), None)
            .await
            .expect("Failed to create object store");
        let store = Arc::new(FaultyStore {
            inner,
            fail_save: AtomicBool::new(false),
            fail_delete_prefix: Mutex::new(None),
            exists_delay_ms: AtomicU64::new(0),
        });
        let repo = Arc::new(MemoryDocumentRepository::default());

        let coordinator = DocumentCoordinator::new(
            store.clone(),
            repo.clone(),
            KeyedMutex::new(),
            UploadPolicy::from_config(&DocumentConfig::default()),
            CoordinatorOptions::default(),
        );

        Self {
            coordinator,
            store,
            repo,
            root,
            _dir: dir,
        }
    }

    /// Stored objects below `prefix`, as keys.
    pub fn objects_under(&self, prefix: &str) -> Vec<String> {
        let mut found = Vec::new();
        collect_files(&self.root, &self.root.join(prefix), &mut found);
        found.sort();
        found
    }

    pub fn object_bytes(&self, key: &ObjectKey) -> Option<Vec<u8>> {
        std::fs::read(self.root.join(key.as_str())).ok()
    }
}

fn collect_files(root: &Path, dir: &Path, found: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.file_name().is_some_and(|name| name == ".tmp") {
            continue;
        }
        if path.is_dir() {
            collect_files(root, &path, found);
        } else {
            let relative = path.strip_prefix(root).unwrap();
            let key: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            found.push(key.join("/"));
        }
    }
}

pub mod routes {
    pub const UPLOAD: &str = "/api/v1/documents/upload";

    pub fn document(id: &str) -> String {
        format!("/api/v1/documents/{id}")
    }

    pub fn download(id: &str) -> String {
        format!("/api/v1/documents/{id}/download")
    }

    pub fn file(id: &str) -> String {
        format!("/api/v1/documents/{id}/file")
    }
}

/// Upload limit used by the HTTP tests, small enough to exceed cheaply.
pub const TEST_MAX_UPLOAD: usize = 4 * 1024;

/// A running test server.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub repo: Arc<MemoryDocumentRepository>,
    pub root: PathBuf,
    _dir: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestResponse {
    async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }

    pub fn id(&self) -> String {
        self.body["id"]
            .as_str()
            .expect("Response should contain an id")
            .to_string()
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = dir.path().join("documents");

        let app_config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors: CorsConfig {
                    allow_origins: vec![],
                    max_age: 3600,
                },
            },
            database: DatabaseConfig {
                url: "postgres://unused".to_string(),
            },
            storage: StorageAppConfig {
                root: root.to_string_lossy().into_owned(),
                ..Default::default()
            },
            documents: DocumentConfig {
                max_upload_size: TEST_MAX_UPLOAD,
                ..Default::default()
            },
        };

        let store = common::storage::open_object_store(&app_config.storage)
            .await
            .expect("Failed to open object store");
        let repo = Arc::new(MemoryDocumentRepository::default());
        let state = AppState::new(app_config, store, repo.clone());

        let app = server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            repo,
            root,
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    /// GET returning the raw body and selected headers.
    pub async fn download(&self, path: &str) -> (u16, Option<String>, Option<String>, Vec<u8>) {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        let status = res.status().as_u16();
        let header = |name: &str| {
            res.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let content_type = header("content-type");
        let disposition = header("content-disposition");
        let bytes = res.bytes().await.expect("Failed to read body").to_vec();
        (status, content_type, disposition, bytes)
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    pub async fn upload(
        &self,
        owner_type: &str,
        owner_id: &str,
        document_type: &str,
        file_name: &str,
        file_bytes: Vec<u8>,
    ) -> TestResponse {
        let form = reqwest::multipart::Form::new()
            .text("owner_type", owner_type.to_string())
            .text("owner_id", owner_id.to_string())
            .text("type", document_type.to_string())
            .part("file", file_part(file_name, file_bytes));

        let res = self
            .client
            .post(self.url(routes::UPLOAD))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    pub async fn replace_file(&self, id: &str, file_name: &str, file_bytes: Vec<u8>) -> TestResponse {
        let form = reqwest::multipart::Form::new().part("file", file_part(file_name, file_bytes));

        let res = self
            .client
            .put(self.url(&routes::file(id)))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart replace request");

        TestResponse::from_response(res).await
    }

    /// Upload a PDF for a fresh employee and return the document `id`.
    pub async fn create_document(&self, file_name: &str) -> String {
        let owner = Uuid::now_v7().to_string();
        let res = self
            .upload("employee", &owner, "BI", file_name, PDF.to_vec())
            .await;
        assert_eq!(res.status, 201, "create_document failed: {}", res.text);
        res.id()
    }

    pub fn object_count(&self) -> usize {
        let mut found = Vec::new();
        collect_files(&self.root, &self.root, &mut found);
        found.len()
    }
}

fn file_part(file_name: &str, file_bytes: Vec<u8>) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(file_bytes).file_name(file_name.to_string())
}
