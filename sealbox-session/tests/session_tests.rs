use pretty_assertions::assert_eq;
use sealbox_container::{ContainerEngine, JsonSupport};
use sealbox_crypto::KdfParams;
use sealbox_session::{
    try_acquire, EditSession, LockState, PasswordUnlock, SessionMode, UnlockCapability,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const SECRET: &str = "secret";

fn params() -> KdfParams {
    KdfParams::insecure_fast()
}

fn new_container(path: &Path, payload: &[u8]) -> ContainerEngine {
    let engine = ContainerEngine::new(Box::new(JsonSupport::new(path)));
    engine.create(SECRET, false, &params()).unwrap();
    engine.write(payload, SECRET, &params()).unwrap();
    engine
}

fn capability(path: &Path) -> Arc<dyn UnlockCapability> {
    let engine = ContainerEngine::new(Box::new(JsonSupport::new(path)));
    Arc::new(PasswordUnlock::new(engine, SECRET, params()))
}

fn read_container(path: &Path) -> Vec<u8> {
    ContainerEngine::new(Box::new(JsonSupport::new(path)))
        .read(SECRET, &params())
        .unwrap()
}

#[test]
fn command_sees_the_plaintext_and_staging_is_cleaned_up() {
    let dir = TempDir::new().unwrap();
    let container = dir.path().join("doc.sealed");
    new_container(&container, b"the plaintext");

    let out = dir.path().join("copied.txt");
    let session = EditSession::new(
        capability(&container),
        &format!("cp {{filename}} {}", out.display()),
    );
    let report = session.run().unwrap();

    assert_eq!(report.mode, SessionMode::Writer);
    assert_eq!(report.exit_status, Some(0));
    assert_eq!(fs::read(&out).unwrap(), b"the plaintext");
    assert!(!report.staged_path.exists());
}

#[test]
fn bracket_placeholder_works_too() {
    let dir = TempDir::new().unwrap();
    let container = dir.path().join("doc.sealed");
    new_container(&container, b"bracketed");

    let out = dir.path().join("copied.txt");
    let session = EditSession::new(
        capability(&container),
        &format!("cp [ filename ] {}", out.display()),
    );
    session.run().unwrap();

    assert_eq!(fs::read(&out).unwrap(), b"bracketed");
}

#[test]
fn path_is_appended_when_no_placeholder_given() {
    let dir = TempDir::new().unwrap();
    let container = dir.path().join("doc.sealed");
    new_container(&container, b"appended");

    // `cat <staged>` exits 0 only if the trailing path argument exists.
    let session = EditSession::new(capability(&container), "cat");
    let report = session.run().unwrap();
    assert_eq!(report.exit_status, Some(0));
}

#[test]
fn edits_are_encrypted_back_into_the_container() {
    let dir = TempDir::new().unwrap();
    let container = dir.path().join("doc.sealed");
    new_container(&container, b"before edit");

    let replacement = dir.path().join("replacement.txt");
    fs::write(&replacement, b"after edit").unwrap();

    // The "editor" replaces the staged plaintext and exits; the watcher
    // must sync the change back before the session finishes.
    let session = EditSession::new(
        capability(&container),
        &format!("cp {} {{filename}}", replacement.display()),
    );
    let report = session.run().unwrap();

    assert_eq!(report.mode, SessionMode::Writer);
    assert_eq!(read_container(&container), b"after edit");
    assert!(!report.staged_path.exists());
}

#[test]
fn several_writes_during_one_session_all_land() {
    let dir = TempDir::new().unwrap();
    let container = dir.path().join("doc.sealed");
    new_container(&container, b"v0");

    let session = EditSession::new(
        capability(&container),
        "sh -c 'printf v1 > $0; sleep 1; printf v2 > $0' {filename}",
    );
    session.run().unwrap();

    assert_eq!(read_container(&container), b"v2");
}

#[test]
fn failing_command_still_cleans_up() {
    let dir = TempDir::new().unwrap();
    let container = dir.path().join("doc.sealed");
    new_container(&container, b"content");

    let session = EditSession::new(capability(&container), "false");
    let report = session.run().unwrap();

    assert_eq!(report.exit_status, Some(1));
    assert!(!report.staged_path.exists());

    // The lock was released on the way out.
    assert!(matches!(
        try_acquire(&container).unwrap(),
        LockState::Locked(_)
    ));
}

#[test]
fn staging_failure_aborts_before_the_command_runs() {
    let dir = TempDir::new().unwrap();
    let container = dir.path().join("doc.sealed");
    new_container(&container, b"content");

    // Wrong credential: decrypt fails, so the command must never run.
    let engine = ContainerEngine::new(Box::new(JsonSupport::new(&container)));
    let bad = Arc::new(PasswordUnlock::new(engine, "wrong password", params()));

    let marker = dir.path().join("ran.marker");
    let session = EditSession::new(bad, &format!("touch {}", marker.display()));

    assert!(session.run().is_err());
    assert!(!marker.exists());

    // And the lock is free again.
    assert!(matches!(
        try_acquire(&container).unwrap(),
        LockState::Locked(_)
    ));
}

#[test]
fn second_session_falls_back_to_reader_mode() {
    let dir = TempDir::new().unwrap();
    let container = dir.path().join("doc.sealed");
    new_container(&container, b"shared content");
    let container_bytes = fs::read(&container).unwrap();

    // Simulate a writer session elsewhere by holding the lock directly.
    let guard = try_acquire(&container).unwrap();
    assert!(matches!(&guard, LockState::Locked(_)));

    let out = dir.path().join("reader-copy.txt");
    let session = EditSession::new(
        capability(&container),
        &format!("cp {{filename}} {}", out.display()),
    );
    let report = session.run().unwrap();

    assert_eq!(report.mode, SessionMode::Reader);
    assert_eq!(fs::read(&out).unwrap(), b"shared content");
    assert!(!report.staged_path.exists());

    // Reader mode never wrote the container.
    assert_eq!(fs::read(&container).unwrap(), container_bytes);
    drop(guard);
}

#[test]
fn reader_follows_the_writers_changes() {
    let dir = TempDir::new().unwrap();
    let container = dir.path().join("doc.sealed");
    new_container(&container, b"original");

    let updated = dir.path().join("updated.txt");
    fs::write(&updated, b"updated by writer").unwrap();

    let writer_container: PathBuf = container.clone();
    let writer_updated = updated.clone();
    let writer = thread::spawn(move || {
        // Writes the new plaintext after a delay, then keeps the session
        // (and the lock) alive long enough for the reader to notice.
        let session = EditSession::new(
            capability(&writer_container),
            &format!(
                "sh -c 'sleep 1; cp {} $0; sleep 3' {{filename}}",
                writer_updated.display()
            ),
        );
        session.run().unwrap()
    });

    // Give the writer time to take the lock.
    thread::sleep(Duration::from_millis(400));

    let reader_out = dir.path().join("reader-view.txt");
    let reader_session = EditSession::new(
        capability(&container),
        &format!(
            "sh -c 'sleep 3; cp $0 {}' {{filename}}",
            reader_out.display()
        ),
    );
    let reader_report = reader_session.run().unwrap();
    let writer_report = writer.join().unwrap();

    assert_eq!(writer_report.mode, SessionMode::Writer);
    assert_eq!(reader_report.mode, SessionMode::Reader);

    // The reader's staged copy was refreshed from the writer's change
    // before its command copied it out.
    assert_eq!(fs::read(&reader_out).unwrap(), b"updated by writer");
    assert_eq!(read_container(&container), b"updated by writer");
}
