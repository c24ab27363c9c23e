use tempfile::TempDir;

fn test_runtime(database_dsn: String) -> agentgate::app::RuntimeConfig {
    agentgate::app::RuntimeConfig {
        listen: "127.0.0.1:0".to_string(),
        metrics_path: "/metrics".to_string(),
        database_dsn,
        access_secret: None,
    }
}

#[tokio::test]
async fn sqlite_file_created_for_runtime_dsn() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("data").join("agentgate.db");
    assert!(!db_path.exists());

    let runtime = test_runtime(format!("sqlite://{}", db_path.display()));
    let _state = agentgate::app::load_state_with_runtime(runtime)
        .await
        .expect("load state");

    assert!(db_path.exists());
}

#[tokio::test]
async fn sqlite_memory_dsn_starts_without_files() {
    let runtime = test_runtime("sqlite::memory:".to_string());
    let _state = agentgate::app::load_state_with_runtime(runtime)
        .await
        .expect("load state");
}

#[tokio::test]
async fn token_records_survive_reload() {
    let temp_dir = TempDir::new().expect("temp dir");
    let dsn = format!("sqlite://{}", temp_dir.path().join("agentgate.db").display());

    let state = agentgate::app::load_state_with_runtime(test_runtime(dsn.clone()))
        .await
        .expect("load state");
    state
        .pool
        .put(agentgate::pool::TokenRecord {
            token: "tok_persisted".to_string(),
            tenant_url: "https://tenant.example.com/".to_string(),
            issued_at: 1_700_000_000,
        })
        .await
        .expect("put token");
    drop(state);

    let state = agentgate::app::load_state_with_runtime(test_runtime(dsn))
        .await
        .expect("reload state");
    let records = state.pool.list().await.expect("list");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].token, "tok_persisted");
}
