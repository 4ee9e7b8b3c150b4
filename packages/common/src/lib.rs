pub mod config;
pub mod lock;
pub mod storage;

pub use config::{StorageAppConfig, StorageBackend};
pub use lock::{KeyedGuard, KeyedMutex};
