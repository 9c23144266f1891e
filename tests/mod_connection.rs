use noteful::query::Filter;
use noteful::runner::QueryRunner;
use noteful::{DbError, Note, NoteDraft, connect, numbered_id, with_connection};
use std::io::Write;

fn file_uri(path: &std::path::Path) -> String {
    format!("file://{}", path.display())
}

#[test]
fn file_store_survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let uri = file_uri(&dir.path().join("notes.journal"));
    with_connection(&uri, |conn| {
        let runner = QueryRunner::<Note>::new(conn)?;
        noteful::seed::reseed(&runner)?;
        runner.find_by_id_and_remove(&numbered_id(17))?;
        Ok(())
    })
    .unwrap();
    let count = with_connection(&uri, |conn| QueryRunner::<Note>::new(conn)?.count(&Filter::True)).unwrap();
    assert_eq!(count, 19);
}

#[test]
fn updates_are_replayed() {
    let dir = tempfile::tempdir().unwrap();
    let uri = file_uri(&dir.path().join("notes.journal"));
    let conn = connect(&uri).unwrap();
    let runner = QueryRunner::<Note>::new(&conn).unwrap();
    runner.insert_one(NoteDraft::new("a", "b").with_id(numbered_id(1))).unwrap();
    runner
        .update_many(&Filter::True, &noteful::Patch::new().unset("content"))
        .unwrap();
    drop(runner);
    conn.close().unwrap();

    let conn = connect(&uri).unwrap();
    let note = QueryRunner::<Note>::new(&conn).unwrap().find_by_id(&numbered_id(1)).unwrap().unwrap();
    assert_eq!(note.title.as_deref(), Some("a"));
    assert_eq!(note.content, None);
}

#[test]
fn missing_directory_is_a_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let uri = file_uri(&dir.path().join("nope").join("notes.journal"));
    assert!(matches!(connect(&uri), Err(DbError::Connection(_))));
}

#[test]
fn corrupt_journal_fails_to_connect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.journal");
    let uri = file_uri(&path);
    with_connection(&uri, |conn| {
        QueryRunner::<Note>::new(conn)?.insert_one(NoteDraft::new("a", "b"))?;
        Ok(())
    })
    .unwrap();
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x55;
    std::fs::File::create(&path).unwrap().write_all(&bytes).unwrap();
    assert!(matches!(connect(&uri), Err(DbError::Connection(_))));
}

#[test]
fn operations_after_close_fail() {
    let conn = connect("memory://closed").unwrap();
    let col = conn.collection("notes").unwrap();
    conn.close().unwrap();
    let err = noteful::query::count_docs(&col, &Filter::True).unwrap_err();
    assert!(matches!(err, DbError::Connection(_)));
}

#[test]
fn unknown_scheme_is_rejected() {
    assert!(matches!(connect("mongodb://localhost/noteful"), Err(DbError::Connection(_))));
}

#[test]
fn writes_after_a_torn_tail_survive_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.journal");
    let uri = file_uri(&path);
    let insert = |title: &'static str| {
        with_connection(&uri, |conn| {
            QueryRunner::<Note>::new(conn)?.insert_one(NoteDraft::new(title, "body"))?;
            Ok(())
        })
        .unwrap();
    };
    insert("a");
    std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .unwrap()
        .write_all(&[200, 0, 0, 0, 1, 2, 3, 4, 9, 9])
        .unwrap();
    insert("c");
    insert("d");

    let titles = with_connection(&uri, |conn| {
        let notes = QueryRunner::<Note>::new(conn)?.find_many(&Filter::True, &Default::default())?;
        Ok(notes.into_iter().filter_map(|n| n.title).collect::<Vec<_>>())
    })
    .unwrap();
    assert_eq!(titles, vec!["a", "c", "d"]);
}
