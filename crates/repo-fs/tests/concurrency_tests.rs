//! Concurrent access tests for write_atomic
//!
//! Store snapshots are rewritten on every commit, so concurrent writers to
//! the same file must never leave interleaved content behind.

use repo_fs::{NormalizedPath, io};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

#[test]
fn test_concurrent_writes_no_corruption() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("memorystore.json");
    let path = Arc::new(NormalizedPath::new(&file_path));

    let num_threads = 8;
    let writes_per_thread = 20;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let path = Arc::clone(&path);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait();
                for i in 0..writes_per_thread {
                    let content = format!("thread{}:write{}\n", thread_id, i);
                    io::write_text(&path, &content).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread should not panic");
    }

    let content = std::fs::read_to_string(&file_path).unwrap();
    assert!(content.starts_with("thread"), "got: {}", content);
    assert_eq!(
        content.matches("thread").count(),
        1,
        "Content should be exactly one complete write"
    );
}

#[test]
fn test_no_temp_files_left_behind() {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join("out.json"));

    for i in 0..5 {
        io::write_text(&path, &format!("{{\"n\": {}}}", i)).unwrap();
    }

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left: {:?}", leftovers);
}
