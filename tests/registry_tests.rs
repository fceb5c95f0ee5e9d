use upload_progress::registry::{ProgressRegistry, RegistryError, UploadProgress, Visit};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn test_new_progress() {
    let progress = UploadProgress::new("a.bin", 100);
    assert_eq!(progress.id, "a.bin");
    assert_eq!(progress.total_size, 100);
    assert_eq!(progress.bytes_transferred, 0);
    assert!(!progress.done);
    assert!(progress.done_at.is_none());
}

#[test]
fn test_done_at_is_set_once() {
    let mut progress = UploadProgress::new("a.bin", 100);
    progress.complete();
    let first = progress.done_at;
    assert!(first.is_some());

    // a later failure does not rewrite a finished entry
    std::thread::sleep(Duration::from_millis(5));
    progress.fail("late error");
    assert_eq!(progress.done_at, first);
    assert_eq!(progress.status_message, "Upload complete");
    assert!(!progress.failed);
}

#[test]
fn test_percent() {
    let mut progress = UploadProgress::new("a.bin", 400);
    assert_eq!(progress.percent(), 0.0);
    progress.record_chunk(100);
    assert_eq!(progress.percent(), 25.0);

    // zero-length uploads are complete by definition
    assert_eq!(UploadProgress::new("empty", 0).percent(), 100.0);

    // a declared size that turned out too small never goes past 100
    let mut over = UploadProgress::new("over", 10);
    over.record_chunk(20);
    assert_eq!(over.percent(), 100.0);
}

#[test]
fn test_is_expired() {
    let grace = Duration::from_secs(2);
    let mut progress = UploadProgress::new("a.bin", 10);
    assert!(!progress.is_expired(Instant::now() + Duration::from_secs(60), grace));

    progress.complete();
    let done_at = progress.done_at.unwrap();
    assert!(!progress.is_expired(done_at, grace));
    assert!(!progress.is_expired(done_at + grace, grace));
    assert!(progress.is_expired(done_at + grace + Duration::from_millis(1), grace));
}

#[test]
fn test_upsert_and_get() {
    let registry = ProgressRegistry::new();
    assert!(registry.is_empty());

    let mut progress = UploadProgress::new("a.bin", 100);
    registry.upsert(progress.clone());
    progress.record_chunk(40);
    registry.upsert(progress.clone());

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("a.bin").unwrap().bytes_transferred, 40);
    assert!(registry.get("missing").is_none());
}

#[test]
fn test_claim_rejects_second_upload() {
    let registry = ProgressRegistry::new();
    let claim = registry.claim("a.bin").unwrap();
    assert_eq!(claim.id(), "a.bin");
    assert!(registry.is_claimed("a.bin"));

    let result = registry.claim("a.bin");
    assert_eq!(result.unwrap_err(), RegistryError::UploadInProgress("a.bin".to_string()));

    // other ids are unaffected
    assert!(registry.claim("b.bin").is_ok());
}

#[test]
fn test_claim_is_not_published() {
    let registry = ProgressRegistry::new();
    let _claim = registry.claim("a.bin").unwrap();

    assert!(registry.is_empty());
    assert!(registry.get("a.bin").is_none());
    assert!(registry.snapshot().is_empty());
}

#[test]
fn test_claim_released_on_drop() {
    let registry = ProgressRegistry::new();
    {
        let _claim = registry.claim("a.bin").unwrap();
        registry.upsert(UploadProgress::new("a.bin", 100));
    }
    assert!(!registry.is_claimed("a.bin"));

    // the published entry outlives the claim, and the id can be uploaded again
    assert!(registry.get("a.bin").is_some());
    assert!(registry.claim("a.bin").is_ok());
}

#[test]
fn test_remove_absent_is_noop() {
    let registry = ProgressRegistry::new();
    assert!(registry.remove("nothing").is_none());

    registry.upsert(UploadProgress::new("a.bin", 1));
    assert!(registry.remove("a.bin").is_some());
    assert!(registry.remove("a.bin").is_none());
    assert!(registry.is_empty());
}

#[test]
fn test_for_each_visits_and_removes() {
    let registry = ProgressRegistry::new();
    registry.upsert(UploadProgress::new("keep", 1));
    registry.upsert(UploadProgress::new("drop", 1));

    let mut seen = Vec::new();
    registry.for_each(|progress| {
        seen.push(progress.id.clone());
        if progress.id == "drop" { Visit::Remove } else { Visit::Keep }
    });

    seen.sort();
    assert_eq!(seen, vec!["drop".to_string(), "keep".to_string()]);
    assert!(registry.get("keep").is_some());
    assert!(registry.get("drop").is_none());
}

#[test]
fn test_for_each_does_not_remove_republished_entry() {
    let registry = ProgressRegistry::new();
    registry.upsert(UploadProgress::new("a.bin", 100));

    registry.for_each(|progress| {
        // a new snapshot lands while the visitor is looking at the old one
        let mut newer = progress.clone();
        newer.record_chunk(10);
        registry.upsert(newer);
        Visit::Remove
    });

    assert_eq!(registry.get("a.bin").unwrap().bytes_transferred, 10);
}

#[test]
fn test_concurrent_upserts_on_distinct_ids() {
    let registry = Arc::new(ProgressRegistry::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                let mut progress = UploadProgress::new(format!("file{}", i), 1000);
                for _ in 0..100 {
                    progress.record_chunk(10);
                    registry.upsert(progress.clone());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.len(), 8);
    for progress in registry.snapshot() {
        assert_eq!(progress.bytes_transferred, 1000);
    }
}
