use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use passage_index::{
    DocAddress, Document, Index, IndexConfig, IndexReader, OpenMode, QueryTree, SearchError, evaluate,
    directory::{Directory, DirectoryLock, FsDirectory, RamDirectory},
    postings::Term,
};

fn passage(id: &str, text: &str) -> Document {
    Document::builder()
        .token("passage_ID", id)
        .text("passage_text", text)
        .text("url", format!("http://example.com/{}", id))
        .build()
}

fn hit_ids(reader: &IndexReader, query: &str) -> Vec<String> {
    let mut ids: Vec<String> = reader
        .searcher()
        .search(query, &["passage_text"], 100)
        .unwrap()
        .hits
        .into_iter()
        .map(|hit| hit.document.get("passage_ID").unwrap().to_string())
        .collect();
    ids.sort();
    ids
}

/// A RAM directory whose manifest replacement can be made to fail.
#[derive(Debug, Default)]
struct FailingDirectory {
    inner: RamDirectory,
    fail_atomic_writes: AtomicBool,
}

impl Directory for FailingDirectory {
    fn read(&self, name: &str) -> passage_index::Result<Arc<[u8]>> {
        self.inner.read(name)
    }

    fn write(&self, name: &str, data: &[u8]) -> passage_index::Result<()> {
        self.inner.write(name, data)
    }

    fn atomic_write(&self, name: &str, data: &[u8]) -> passage_index::Result<()> {
        if self.fail_atomic_writes.load(Ordering::SeqCst) {
            return Err(SearchError::io(
                format!("replacing {}", name),
                std::io::Error::other("disk full"),
            ));
        }
        self.inner.atomic_write(name, data)
    }

    fn delete(&self, name: &str) -> passage_index::Result<()> {
        self.inner.delete(name)
    }

    fn exists(&self, name: &str) -> passage_index::Result<bool> {
        self.inner.exists(name)
    }

    fn list(&self) -> passage_index::Result<Vec<String>> {
        self.inner.list()
    }

    fn acquire_lock(&self, name: &str) -> passage_index::Result<DirectoryLock> {
        self.inner.acquire_lock(name)
    }
}

#[test]
fn stored_fields_round_trip() {
    let index = Index::create_in_ram(IndexConfig::default()).unwrap();
    let mut writer = index.writer(OpenMode::Create).unwrap();
    let documents = vec![
        passage("1", "first passage"),
        Document::builder()
            .token("query_id", "9")
            .text("query", "what is rust")
            .text("answers", "a language")
            .text("answers", "an oxide")
            .stored("note", "not indexed")
            .build(),
        passage("2", ""),
    ];
    let mut ids = Vec::new();
    for document in &documents {
        ids.push(writer.add_document(document.clone()).unwrap());
    }
    let segment_id = writer.commit().unwrap().unwrap();

    let reader = index.reader().unwrap();
    for (document, id) in documents.iter().zip(ids) {
        let stored = reader
            .fetch_stored_fields(DocAddress::from_document_id(segment_id, id))
            .unwrap();
        assert_eq!(&stored, document);
    }
}

#[test]
fn long_field_names_survive_commit() {
    let field = "f".repeat(70_000);
    let directory = Arc::new(RamDirectory::new());
    let index = Index::open(directory.clone(), IndexConfig::default()).unwrap();
    let mut writer = index.writer(OpenMode::Create).unwrap();
    let document = Document::builder()
        .token("passage_ID", "1")
        .text(field.as_str(), "distant words")
        .build();
    let id = writer.add_document(document.clone()).unwrap();
    let segment_id = writer.commit().unwrap().unwrap();

    // a fresh index decodes the segment files instead of reusing cached readers
    let reader = Index::open(directory, IndexConfig::default())
        .unwrap()
        .reader()
        .unwrap();
    let stored = reader
        .fetch_stored_fields(DocAddress::from_document_id(segment_id, id))
        .unwrap();
    assert_eq!(stored, document);
    let top = evaluate(&QueryTree::term(field.as_str(), "distant"), &reader, 10).unwrap();
    assert_eq!(top.total_hits, 1);
}

#[test]
fn readers_are_isolated_from_later_commits() {
    let index = Index::create_in_ram(IndexConfig::default()).unwrap();
    let mut writer = index.writer(OpenMode::Create).unwrap();
    writer.add_document(passage("A", "shared words here")).unwrap();
    let r0 = index.reader().unwrap();
    writer.commit().unwrap();
    let r1 = index.reader().unwrap();
    writer.add_document(passage("B", "shared words there")).unwrap();
    writer.commit().unwrap();
    let r2 = index.reader().unwrap();

    assert!(hit_ids(&r0, "shared").is_empty());
    assert_eq!(hit_ids(&r1, "shared"), vec!["A"]);
    assert_eq!(hit_ids(&r2, "shared"), vec!["A", "B"]);
    assert_eq!(hit_ids(&r1.reload().unwrap(), "shared"), vec!["A", "B"]);
}

#[test]
fn deletes_and_updates_are_invisible_to_older_readers() {
    let index = Index::create_in_ram(IndexConfig::default()).unwrap();
    let mut writer = index.writer(OpenMode::Create).unwrap();
    writer.add_document(passage("1", "old text")).unwrap();
    writer.add_document(passage("2", "old text")).unwrap();
    writer.commit().unwrap();
    let before = index.reader().unwrap();

    writer.delete_term(Term::new("passage_ID", "1"));
    writer
        .update_document(Term::new("passage_ID", "2"), passage("2", "new text"))
        .unwrap();
    writer.commit().unwrap();
    let after = index.reader().unwrap();

    assert_eq!(hit_ids(&before, "old"), vec!["1", "2"]);
    assert!(hit_ids(&before, "new").is_empty());
    assert!(hit_ids(&after, "old").is_empty());
    assert_eq!(hit_ids(&after, "new"), vec!["2"]);
    assert_eq!(after.num_docs(), 1);
}

#[test]
fn failed_commit_leaves_index_unchanged_and_can_be_retried() {
    let directory = Arc::new(FailingDirectory::default());
    let index = Index::open(directory.clone(), IndexConfig::default()).unwrap();
    let mut writer = index.writer(OpenMode::Create).unwrap();
    writer.add_document(passage("1", "committed")).unwrap();
    writer.commit().unwrap();
    let files_before = directory.list().unwrap();

    writer.add_document(passage("2", "pending")).unwrap();
    writer.delete_term(Term::new("passage_ID", "1"));
    directory.fail_atomic_writes.store(true, Ordering::SeqCst);
    assert!(matches!(writer.commit(), Err(SearchError::Io { .. })));

    assert_eq!(directory.list().unwrap(), files_before);
    let reader = index.reader().unwrap();
    assert_eq!(hit_ids(&reader, "committed"), vec!["1"]);
    assert!(hit_ids(&reader, "pending").is_empty());

    directory.fail_atomic_writes.store(false, Ordering::SeqCst);
    assert!(writer.commit().unwrap().is_some());
    let reader = index.reader().unwrap();
    assert!(hit_ids(&reader, "committed").is_empty());
    assert_eq!(hit_ids(&reader, "pending"), vec!["2"]);
}

#[test]
fn only_one_writer_per_directory() {
    let dir = tempfile::tempdir().unwrap();
    let first = Index::open_in_dir(dir.path(), IndexConfig::default()).unwrap();
    let second = Index::open_in_dir(dir.path(), IndexConfig::default()).unwrap();

    let writer = first.writer(OpenMode::CreateOrAppend).unwrap();
    assert!(matches!(
        second.writer(OpenMode::CreateOrAppend),
        Err(SearchError::LockHeld(_))
    ));
    drop(writer);
    assert!(second.writer(OpenMode::Append).is_ok());
}

#[test]
fn index_survives_reopening_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    {
        let index = Index::open_in_dir(dir.path(), IndexConfig::default()).unwrap();
        let mut writer = index.writer(OpenMode::Create).unwrap();
        writer.add_document(passage("1", "persistent passage")).unwrap();
        writer.add_document(passage("2", "another passage")).unwrap();
        writer.close().unwrap();
    }

    let directory = Arc::new(FsDirectory::open(dir.path()).unwrap());
    let index = Index::open(directory, IndexConfig::default()).unwrap();
    let reader = index.reader().unwrap();
    assert_eq!(reader.num_docs(), 2);
    assert_eq!(hit_ids(&reader, "persistent"), vec!["1"]);
    assert_eq!(hit_ids(&reader, "passage"), vec!["1", "2"]);
}

#[test]
fn force_merge_preserves_search_results() {
    let index = Index::create_in_ram(IndexConfig {
        chunk_size: 4,
        ..IndexConfig::default()
    })
    .unwrap();
    let mut writer = index.writer(OpenMode::Create).unwrap();
    for batch in 0..4 {
        for i in 0..10 {
            let text = if i % 3 == 0 { "rare common" } else { "common filler words" };
            writer.add_document(passage(&format!("{}-{}", batch, i), text)).unwrap();
        }
        writer.commit().unwrap();
    }
    writer.delete_term(Term::new("passage_ID", "2-3"));
    writer.commit().unwrap();

    let before = index.reader().unwrap();
    let rare_before = hit_ids(&before, "rare");
    let common_before = hit_ids(&before, "common");

    writer.force_merge().unwrap();
    let after = index.reader().unwrap();
    assert_eq!(after.segment_count(), 1);
    assert_eq!(after.num_docs(), 39);
    assert_eq!(hit_ids(&after, "rare"), rare_before);
    assert_eq!(hit_ids(&after, "common"), common_before);
    assert_eq!(hit_ids(&after, "\"rare common\"").len(), rare_before.len());
    // old snapshots keep working after their segments are collected
    assert_eq!(hit_ids(&before, "rare"), rare_before);
}

#[test]
fn concurrent_readers_see_whole_commits() {
    const BATCHES: usize = 8;
    const BATCH_SIZE: usize = 5;

    let index = Index::create_in_ram(IndexConfig::default()).unwrap();
    let mut writer = index.writer(OpenMode::Create).unwrap();
    writer.commit().unwrap();

    thread::scope(|scope| {
        scope.spawn(move || {
            for batch in 0..BATCHES {
                for i in 0..BATCH_SIZE {
                    writer
                        .add_document(passage(&format!("{}-{}", batch, i), "concurrent"))
                        .unwrap();
                }
                writer.commit().unwrap();
            }
        });
        for _ in 0..3 {
            let index = index.clone();
            scope.spawn(move || {
                for _ in 0..20 {
                    let reader = index.reader().unwrap();
                    let num_docs = reader.num_docs() as usize;
                    assert_eq!(num_docs % BATCH_SIZE, 0);
                    assert_eq!(hit_ids(&reader, "concurrent").len(), num_docs);
                }
            });
        }
    });

    assert_eq!(index.reader().unwrap().num_docs() as usize, BATCHES * BATCH_SIZE);
}
