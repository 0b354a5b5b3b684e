//! Session tests

use super::*;
use crate::error::Error;
use chrono::{Duration, Utc};
use std::fs;
use uuid::Uuid;

fn store(dir: &std::path::Path) -> SessionStore {
    SessionStore::new(dir.join(".vbg_sessions"), dir)
}

#[test]
fn test_entry_token_count() {
    let entry = ContextEntry::task("Explain the session store", "analyze");
    assert_eq!(entry.role(), EntryRole::TaskIssuer);
    assert!(entry.agent_id().is_none());
    assert!(entry.token_count() > 0);
    assert_eq!(entry.speaker(), "user");

    let entry = ContextEntry::agent("claude", "It writes JSON.", "analyze");
    assert_eq!(entry.agent_id(), Some("claude"));
    assert_eq!(entry.speaker(), "claude");
}

#[test]
fn test_token_count_is_sum_of_entries() {
    let mut session = Session::new("/tmp/project", Duration::hours(24));
    session.push(ContextEntry::task("first question", "analyze"));
    session.push(ContextEntry::agent("claude", "first answer", "analyze"));

    let sum: usize = session.entries().iter().map(|e| e.token_count()).sum();
    assert_eq!(session.token_count(), sum);
}

#[test]
fn test_enforce_token_budget_evicts_oldest() {
    let mut session = Session::new("/tmp/project", Duration::hours(24));
    for i in 0..5 {
        session.push(ContextEntry::task(format!("question number {}", i), "analyze"));
    }
    let per_entry = session.entries()[0].token_count();
    let limits = SessionLimits {
        max_context_tokens: per_entry * 3,
        max_entries: 100,
    };

    let evicted = session.enforce_limits(limits);

    assert!(evicted >= 2);
    assert!(session.token_count() <= limits.max_context_tokens);
    assert_eq!(session.entries().last().unwrap().content(), "question number 4");
    let sum: usize = session.entries().iter().map(|e| e.token_count()).sum();
    assert_eq!(session.token_count(), sum);
}

#[test]
fn test_enforce_entry_cap() {
    let mut session = Session::new("/tmp/project", Duration::hours(24));
    for i in 0..25 {
        session.push(ContextEntry::task(format!("q{}", i), "analyze"));
    }
    session.enforce_limits(SessionLimits {
        max_context_tokens: 1_000_000,
        max_entries: 20,
    });

    assert_eq!(session.entries().len(), 20);
    assert_eq!(session.entries()[0].content(), "q5");
}

#[test]
fn test_oversized_single_entry_is_evicted() {
    let mut session = Session::new("/tmp/project", Duration::hours(24));
    session.push(ContextEntry::task("word ".repeat(200), "analyze"));
    session.enforce_limits(SessionLimits {
        max_context_tokens: 10,
        max_entries: 20,
    });
    assert!(session.entries().is_empty());
    assert_eq!(session.token_count(), 0);
}

#[test]
fn test_recent_entries() {
    let mut session = Session::new("/tmp/project", Duration::hours(24));
    for i in 0..4 {
        session.push(ContextEntry::task(format!("q{}", i), "analyze"));
    }
    let recent: Vec<_> = session.recent(2).iter().map(|e| e.content()).collect();
    assert_eq!(recent, vec!["q2", "q3"]);
    assert_eq!(session.recent(10).len(), 4);
}

#[test]
fn test_stats() {
    let mut stats = SessionStats::default();
    stats.record_invocation("claude", 100);
    stats.record_invocation("claude", 50);
    stats.record_invocation("gemini", 10);
    assert_eq!(stats.agent_calls["claude"], 2);
    assert_eq!(stats.total_calls(), 3);
    assert_eq!(stats.estimated_tokens_sent, 160);
}

#[test]
fn test_create_and_load_current() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    let mut session = store.create().unwrap();
    session.push(ContextEntry::task("hello", "analyze"));
    store.save(&mut session).unwrap();

    let loaded = store.load(SessionRef::Current).unwrap();
    assert_eq!(loaded.id(), session.id());
    assert_eq!(loaded.entries().len(), 1);
    assert_eq!(loaded.token_count(), session.token_count());
    assert_eq!(store.current_id().unwrap(), Some(session.id()));
}

#[test]
fn test_load_current_without_pointer_creates() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    let session = store.load(SessionRef::Current).unwrap();
    assert!(session.entries().is_empty());
    assert_eq!(store.current_id().unwrap(), Some(session.id()));
    assert!(store.dir().join(format!("{}.json", session.id())).exists());
}

#[test]
fn test_load_unknown_id_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let id = Uuid::new_v4();

    let err = store.load(SessionRef::Id(id)).unwrap_err();
    assert!(matches!(err, Error::SessionNotFound(found) if found == id));
}

#[test]
fn test_load_by_id_moves_pointer() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    let first = store.create().unwrap();
    let second = store.create().unwrap();
    assert_eq!(store.current_id().unwrap(), Some(second.id()));

    let loaded = store.load(SessionRef::Id(first.id())).unwrap();
    assert_eq!(loaded.id(), first.id());
    assert_eq!(store.current_id().unwrap(), Some(first.id()));
}

#[test]
fn test_expired_session_yields_fresh_one() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path()).with_expiry(Duration::hours(1));

    let mut old = store.create().unwrap();
    old.push(ContextEntry::task("stale", "analyze"));
    old.set_last_used_at(Utc::now() - Duration::hours(2));
    store.save(&mut old).unwrap();
    assert!(store.is_expired(&old));

    let fresh = store.load(SessionRef::Current).unwrap();
    assert_ne!(fresh.id(), old.id());
    assert!(fresh.entries().is_empty());

    let by_id = store.load(SessionRef::Id(old.id())).unwrap();
    assert_ne!(by_id.id(), old.id());
}

#[test]
fn test_corrupt_session_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    let session = store.create().unwrap();
    fs::write(
        store.dir().join(format!("{}.json", session.id())),
        "{ definitely not json",
    )
    .unwrap();

    let loaded = store.load(SessionRef::Current).unwrap();
    assert_ne!(loaded.id(), session.id());
    assert_eq!(store.current_id().unwrap(), Some(loaded.id()));
}

#[test]
fn test_malformed_pointer_creates() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    fs::create_dir_all(store.dir()).unwrap();
    fs::write(store.dir().join(CURRENT_POINTER), "not-a-uuid").unwrap();

    assert_eq!(store.current_id().unwrap(), None);
    let session = store.load(SessionRef::Current).unwrap();
    assert_eq!(store.current_id().unwrap(), Some(session.id()));
}

#[test]
fn test_save_enforces_limits() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path()).with_limits(SessionLimits {
        max_context_tokens: 1_000_000,
        max_entries: 3,
    });

    let mut session = store.create().unwrap();
    for i in 0..6 {
        session.push(ContextEntry::task(format!("q{}", i), "analyze"));
    }
    store.save(&mut session).unwrap();
    assert_eq!(session.entries().len(), 3);

    let loaded = store.load(SessionRef::Current).unwrap();
    let contents: Vec<_> = loaded.entries().iter().map(|e| e.content()).collect();
    assert_eq!(contents, vec!["q3", "q4", "q5"]);
}

#[test]
fn test_list_newest_first_without_expired() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path()).with_expiry(Duration::hours(1));

    let mut expired = store.create().unwrap();
    expired.set_last_used_at(Utc::now() - Duration::hours(3));
    store.save(&mut expired).unwrap();

    let mut older = store.create().unwrap();
    older.set_last_used_at(Utc::now() - Duration::minutes(30));
    older.push(ContextEntry::task("q", "analyze"));
    store.save(&mut older).unwrap();

    let newest = store.create().unwrap();
    fs::write(store.dir().join("garbage.json"), "[]").unwrap();

    let listed = store.list().unwrap();
    let ids: Vec<_> = listed.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![newest.id(), older.id()]);
    assert_eq!(listed[1].entry_count, 1);
}

#[test]
fn test_list_missing_dir_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    assert!(store(dir.path()).list().unwrap().is_empty());
}
