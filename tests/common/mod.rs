// Shared integration-test scaffolding. Each SQLite pool is a private
// in-memory database (`sqlite::memory:` never shares state across
// connections in the same process the way a file path would once more than
// one pool opens it), so every test gets its own isolated store.

use std::sync::Arc;

use aurora_dual_engine::store::sqlite::SqliteStore;
use aurora_dual_engine::store::Store;

pub const TEST_USERNAME: &str = "test-operator";

/// Connects a fresh in-memory store, migrates it, and seeds one user.
/// Returns the store and the seeded user's id.
pub async fn memory_store() -> (Arc<dyn Store>, String) {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::connect("sqlite::memory:").await.expect("connect in-memory store"));
    let user = store.create_user(TEST_USERNAME, "unset").await.expect("seed user");
    (store, user.id)
}
