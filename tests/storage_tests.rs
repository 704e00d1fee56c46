use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use file_panel::storage::models::{FileRecord, FileUpdate, PageQuery, SortField, SortOrder};
use file_panel::storage::{
    AllocationError, IdAllocator, JsonFileLog, LockFile, LogStore, RetryPolicy, StoreError,
};

fn test_log() -> (tempfile::TempDir, JsonFileLog) {
    let dir = tempfile::tempdir().unwrap();
    let log = JsonFileLog::new(dir.path().join("data").join("uploadLog.json"));
    (dir, log)
}

fn sample_record(id: u64, original_name: &str, file_size: u64) -> FileRecord {
    FileRecord {
        id,
        file_name: format!("1700000000000-{id:09}-{original_name}"),
        original_name: original_name.to_string(),
        file_type: "png".to_string(),
        upload_date: Utc.timestamp_opt(1_700_000_000 + id as i64, 0).unwrap(),
        file_size,
        uploader_name: "System".to_string(),
        status: "complete".to_string(),
    }
}

fn query(page: u32, per_page: u32, sort_by: SortField, sort_order: SortOrder) -> PageQuery {
    PageQuery {
        page,
        per_page,
        sort_by,
        sort_order,
    }
}

// ============================================================================
// Upload log
// ============================================================================

#[tokio::test]
async fn test_ensure_creates_empty_log() {
    let (_dir, log) = test_log();

    log.ensure().await.unwrap();

    let raw = std::fs::read_to_string(log.path()).unwrap();
    assert_eq!(raw, "[]");
    assert!(log.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ensure_keeps_existing_log() {
    let (_dir, log) = test_log();
    log.append(vec![sample_record(1, "a.png", 10)]).await.unwrap();

    log.ensure().await.unwrap();

    assert_eq!(log.load().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_append_preserves_order_and_format() {
    let (_dir, log) = test_log();

    log.append(vec![sample_record(1, "a.png", 10)]).await.unwrap();
    log.append(vec![sample_record(2, "b.png", 20), sample_record(3, "c.png", 30)])
        .await
        .unwrap();

    let ids: Vec<u64> = log.load().await.unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let raw = std::fs::read_to_string(log.path()).unwrap();
    assert!(raw.contains("\n  {"), "log should be pretty-printed");
    assert!(raw.contains("\"originalName\": \"b.png\""));
}

#[tokio::test]
async fn test_load_heals_corrupt_log() {
    let (_dir, log) = test_log();
    std::fs::create_dir_all(log.path().parent().unwrap()).unwrap();
    std::fs::write(log.path(), "{ this is not json").unwrap();

    assert!(log.load().await.unwrap().is_empty());
    assert_eq!(std::fs::read_to_string(log.path()).unwrap(), "[]");
}

#[tokio::test]
async fn test_load_heals_non_array_log() {
    let (_dir, log) = test_log();
    std::fs::create_dir_all(log.path().parent().unwrap()).unwrap();
    std::fs::write(log.path(), r#"{"id": 1}"#).unwrap();

    assert!(log.load().await.unwrap().is_empty());
    assert_eq!(std::fs::read_to_string(log.path()).unwrap(), "[]");
}

#[tokio::test]
async fn test_load_keeps_array_with_undecodable_record() {
    let (_dir, log) = test_log();
    std::fs::create_dir_all(log.path().parent().unwrap()).unwrap();
    let mut legacy = serde_json::to_value(sample_record(2, "b.png", 20)).unwrap();
    legacy["uploadDate"] = serde_json::json!("2024-01-02");
    let raw = serde_json::to_string_pretty(&serde_json::json!([
        sample_record(1, "a.png", 10),
        legacy
    ]))
    .unwrap();
    std::fs::write(log.path(), &raw).unwrap();

    let result = log.load().await;
    assert!(matches!(
        result,
        Err(StoreError::InvalidRecord { index: 1, .. })
    ));
    assert!(log
        .list_page(query(1, 7, SortField::Id, SortOrder::Desc))
        .await
        .is_err());
    assert!(log.append(vec![sample_record(3, "c.png", 30)]).await.is_err());

    assert_eq!(std::fs::read_to_string(log.path()).unwrap(), raw);
}

#[tokio::test]
async fn test_load_missing_log_creates_it() {
    let (_dir, log) = test_log();

    assert!(log.load().await.unwrap().is_empty());
    assert!(log.path().exists());
}

#[tokio::test]
async fn test_load_tolerates_bom_and_blank() {
    let (_dir, log) = test_log();
    std::fs::create_dir_all(log.path().parent().unwrap()).unwrap();

    std::fs::write(log.path(), "   \n").unwrap();
    assert!(log.load().await.unwrap().is_empty());

    let body = serde_json::to_string(&vec![sample_record(4, "d.png", 40)]).unwrap();
    std::fs::write(log.path(), format!("\u{feff}{body}\n")).unwrap();
    let records = log.load().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, 4);
}

#[tokio::test]
async fn test_find_replace_remove() {
    let (_dir, log) = test_log();
    log.append(vec![sample_record(1, "a.png", 10), sample_record(2, "b.png", 20)])
        .await
        .unwrap();

    assert_eq!(log.find_by_id(2).await.unwrap().unwrap().original_name, "b.png");
    assert!(log.find_by_id(9).await.unwrap().is_none());

    let updated = log
        .replace(
            2,
            FileUpdate {
                status: Some("archived".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .expect("record 2 should exist");
    assert_eq!(updated.status, "archived");
    assert_eq!(updated.file_name, sample_record(2, "b.png", 20).file_name);
    assert_eq!(updated.file_size, 20);

    assert!(log
        .replace(9, FileUpdate::default())
        .await
        .unwrap()
        .is_none());

    let removed = log.remove(1).await.unwrap().expect("record 1 should exist");
    assert_eq!(removed.id, 1);
    assert!(log.remove(1).await.unwrap().is_none());

    let remaining = log.load().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].status, "archived");
}

#[tokio::test]
async fn test_list_page_sorting_and_paging() {
    let (_dir, log) = test_log();
    log.append(vec![
        sample_record(1, "b.png", 300),
        sample_record(2, "c.png", 100),
        sample_record(3, "a.png", 200),
    ])
    .await
    .unwrap();

    let page = log
        .list_page(query(2, 1, SortField::Id, SortOrder::Desc))
        .await
        .unwrap();
    assert_eq!(page.files.len(), 1);
    assert_eq!(page.files[0].id, 2);
    assert_eq!(page.total, 3);
    assert_eq!(page.total_pages, 3);

    let by_size = log
        .list_page(query(1, 10, SortField::FileSize, SortOrder::Asc))
        .await
        .unwrap();
    let ids: Vec<u64> = by_size.files.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![2, 3, 1]);

    let by_name = log
        .list_page(query(1, 2, SortField::OriginalName, SortOrder::Desc))
        .await
        .unwrap();
    let names: Vec<&str> = by_name.files.iter().map(|r| r.original_name.as_str()).collect();
    assert_eq!(names, vec!["c.png", "b.png"]);
    assert_eq!(by_name.total_pages, 2);
}

#[tokio::test]
async fn test_list_page_past_end() {
    let (_dir, log) = test_log();
    log.append(vec![sample_record(1, "a.png", 10), sample_record(2, "b.png", 20)])
        .await
        .unwrap();

    let unclamped = log
        .list_page(query(5, 1, SortField::Id, SortOrder::Desc))
        .await
        .unwrap();
    assert!(unclamped.files.is_empty());
    assert_eq!(unclamped.page, 5);

    let clamped = log
        .list_page_clamped(query(5, 1, SortField::Id, SortOrder::Desc))
        .await
        .unwrap();
    assert_eq!(clamped.page, 2);
    assert_eq!(clamped.files[0].id, 1);
}

#[tokio::test]
async fn test_list_page_clamped_empty_log() {
    let (_dir, log) = test_log();

    let page = log
        .list_page_clamped(query(3, 7, SortField::Id, SortOrder::Desc))
        .await
        .unwrap();
    assert_eq!(page.page, 1);
    assert_eq!(page.total, 0);
    assert_eq!(page.total_pages, 0);
    assert!(page.files.is_empty());
}

// ============================================================================
// Id allocator
// ============================================================================

#[tokio::test]
async fn test_id_allocator_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let ids = IdAllocator::new(dir.path().join("idCounter.json"));

    assert_eq!(ids.current().await, 0);
    assert_eq!(ids.next_id().await.unwrap(), 1);
    assert_eq!(ids.next_id().await.unwrap(), 2);
    assert_eq!(ids.next_id().await.unwrap(), 3);

    let raw = std::fs::read_to_string(ids.path()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value, serde_json::json!({ "currentId": 3 }));
}

#[tokio::test]
async fn test_id_allocator_reset() {
    let dir = tempfile::tempdir().unwrap();
    let ids = IdAllocator::new(dir.path().join("idCounter.json"));
    ids.next_id().await.unwrap();
    ids.next_id().await.unwrap();

    ids.reset(0).await.unwrap();

    assert_eq!(ids.current().await, 0);
    assert_eq!(ids.next_id().await.unwrap(), 1);
}

#[tokio::test]
async fn test_id_allocator_corrupt_counter_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("idCounter.json");
    std::fs::write(&path, "garbage").unwrap();
    let ids = IdAllocator::new(&path);

    assert_eq!(ids.current().await, 0);
    assert_eq!(ids.next_id().await.unwrap(), 1);
}

#[tokio::test]
async fn test_id_allocator_custom_key() {
    let dir = tempfile::tempdir().unwrap();
    let ids = IdAllocator::with_key(dir.path().join("counter.json"), "currentIndexPartId");
    ids.next_id().await.unwrap();

    let raw = std::fs::read_to_string(ids.path()).unwrap();
    assert!(raw.contains("\"currentIndexPartId\":1"));
}

#[tokio::test]
async fn test_id_allocator_exhausted_counter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("idCounter.json");
    let full = serde_json::json!({ "currentId": u64::MAX }).to_string();
    std::fs::write(&path, &full).unwrap();
    let ids = IdAllocator::new(&path);

    assert!(matches!(
        ids.next_id().await,
        Err(AllocationError::Exhausted { .. })
    ));
    assert_eq!(ids.current().await, u64::MAX);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), full);
}

#[tokio::test]
async fn test_id_allocator_persist_failure() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the counter file should be makes the write fail.
    let path = dir.path().join("idCounter.json");
    std::fs::create_dir_all(&path).unwrap();
    let ids = IdAllocator::new(&path);

    assert!(ids.next_id().await.is_err());
}

// ============================================================================
// Lock file
// ============================================================================

#[tokio::test]
async fn test_lock_is_exclusive() {
    let dir = tempfile::tempdir().unwrap();
    let lock = LockFile::new(dir.path().join("upload.lock"));

    assert!(lock.try_acquire().await.unwrap());
    assert!(lock.is_held());
    assert_eq!(std::fs::read_to_string(lock.path()).unwrap(), "locked");
    assert!(!lock.try_acquire().await.unwrap());

    lock.release().await;
    assert!(!lock.is_held());
    assert!(lock.try_acquire().await.unwrap());
}

#[tokio::test]
async fn test_lock_create_failure_is_not_busy() {
    let dir = tempfile::tempdir().unwrap();
    let lock = LockFile::new(dir.path().join("missing").join("upload.lock"));

    assert!(lock.try_acquire().await.is_err());
    assert!(lock
        .acquire_with_retry(3, Duration::from_millis(10))
        .await
        .is_err());
}

#[tokio::test]
async fn test_lock_release_without_marker_is_quiet() {
    let dir = tempfile::tempdir().unwrap();
    let lock = LockFile::new(dir.path().join("upload.lock"));

    lock.release().await;
    assert!(!lock.is_held());
}

#[tokio::test]
async fn test_lock_retry_waits_for_release() {
    let dir = tempfile::tempdir().unwrap();
    let lock = LockFile::new(dir.path().join("upload.lock"));
    assert!(lock.try_acquire().await.unwrap());

    let holder = lock.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        holder.release().await;
    });

    let guard = lock
        .lock(RetryPolicy {
            max_attempts: 20,
            interval: Duration::from_millis(20),
        })
        .await
        .unwrap()
        .expect("lock should be acquired after release");
    assert!(lock.is_held());

    guard.release().await;
    assert!(!lock.is_held());
}

#[tokio::test]
async fn test_lock_retry_gives_up() {
    let dir = tempfile::tempdir().unwrap();
    let lock = LockFile::new(dir.path().join("upload.lock"));
    assert!(lock.try_acquire().await.unwrap());

    let start = Instant::now();
    let acquired = lock
        .acquire_with_retry(4, Duration::from_millis(10))
        .await
        .unwrap();

    assert!(!acquired);
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert!(lock.is_held());
}
