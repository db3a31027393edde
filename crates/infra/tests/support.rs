use std::sync::Arc;

use tempfile::TempDir;
use veriscan_domain::ScanIdentity;
use veriscan_infra::database::DbManager;

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new temporary database with the schema applied.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("test.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("schema should apply");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical invoice token; `n` keeps identities distinct within a test.
pub fn identity(n: u8) -> ScanIdentity {
    let token = format!("{n:08x}-0000-7000-8000-000000000000");
    ScanIdentity::extract(&token).expect("test identity is canonical")
}

/// A capture payload carrying `host` as its verification domain.
pub fn payload(host: &str, identity: &ScanIdentity) -> String {
    format!("https://{host}/fr/verification/{identity}")
}
