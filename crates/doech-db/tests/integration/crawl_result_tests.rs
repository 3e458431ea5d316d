use doech_core::models::{CrawlResult, DomainTask, QueryOutcome, RunId};
use doech_core::{AppError, BatchSink};

use crate::integration::common::setup_test_db;

fn result(domain: &str, run_id: RunId) -> CrawlResult {
    let mut result = CrawlResult::started(&DomainTask::new(domain, run_id, "node-0"));
    result.dns_a = Some(QueryOutcome::Ok(vec!["192.0.2.1".parse().unwrap()]));
    result.dns_aaaa = Some(Err(AppError::Timeout(std::time::Duration::from_secs(5))).into());
    result.dns_https = Some(QueryOutcome::Ok(vec![]));
    result.seal()
}

#[tokio::test]
async fn insert_batch_stores_every_row() {
    let (db, _container) = setup_test_db().await;
    let repo = db.results_repo();
    let run_id = RunId::new();

    repo.insert_batch(&[result("b.example", run_id), result("a.example", run_id)])
        .await
        .unwrap();

    assert_eq!(repo.count_for_run(run_id).await.unwrap(), 2);

    let stored = repo.list_for_run(run_id).await.unwrap();
    let domains: Vec<&str> = stored.iter().map(|r| r.domain.as_str()).collect();
    assert_eq!(domains, vec!["a.example", "b.example"]);

    let a = &stored[0];
    assert_eq!(a.run_id, run_id.as_uuid());
    assert_eq!(a.worker_id, "node-0");
    assert!(a.started_at <= a.ended_at);
    assert_eq!(a.dns_a, Some(serde_json::json!({"ok": ["192.0.2.1"]})));
    assert_eq!(
        a.dns_aaaa,
        Some(serde_json::json!({"error": {"kind": "timeout", "message": "Request timed out after 5s"}}))
    );
    assert_eq!(a.dns_https, Some(serde_json::json!({"ok": []})));
    assert!(a.dns_svcb.is_none());
    assert!(a.probe.is_none());
}

#[tokio::test]
async fn empty_batch_is_noop() {
    let (db, _container) = setup_test_db().await;
    let repo = db.results_repo();
    let run_id = RunId::new();

    repo.insert_batch(&[]).await.unwrap();
    assert_eq!(repo.count_for_run(run_id).await.unwrap(), 0);
}

#[tokio::test]
async fn runs_are_kept_apart() {
    let (db, _container) = setup_test_db().await;
    let repo = db.results_repo();
    let first = RunId::new();
    let second = RunId::new();

    repo.insert_batch(&[result("a.example", first)]).await.unwrap();
    repo.insert_batch(&[result("a.example", second), result("b.example", second)])
        .await
        .unwrap();

    assert_eq!(repo.count_for_run(first).await.unwrap(), 1);
    assert_eq!(repo.count_for_run(second).await.unwrap(), 2);

    let latest = repo
        .get_latest("a.example")
        .await
        .unwrap()
        .expect("Should find a.example");
    assert_eq!(latest.run_id, second.as_uuid());
    assert!(repo.get_latest("missing.example").await.unwrap().is_none());
}

#[tokio::test]
async fn batch_sink_flushes_into_postgres() {
    let (db, _container) = setup_test_db().await;
    let repo = db.results_repo();
    let run_id = RunId::new();
    let mut batch = BatchSink::new(repo.clone(), 2).unwrap();

    for domain in ["a.example", "b.example", "c.example"] {
        batch.accept(result(domain, run_id)).await.unwrap();
    }
    assert_eq!(repo.count_for_run(run_id).await.unwrap(), 2);

    batch.flush().await.unwrap();
    assert_eq!(repo.count_for_run(run_id).await.unwrap(), 3);
}

#[tokio::test]
async fn health_check_succeeds() {
    let (db, _container) = setup_test_db().await;
    db.health_check().await.unwrap();
}
