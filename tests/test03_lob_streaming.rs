use std::time::Duration;

use futures_util::{StreamExt, stream};
use sql_bridge::engine::{ColumnDescriptor, LobKind, LobRef};
use sql_bridge::prelude::*;
use sql_bridge::value::{BlobValue, ClobValue, EngineValue};
use tokio_util::bytes::Bytes;

async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test(flavor = "multi_thread")]
async fn blob_chunks_stream_into_the_engine_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let session = StubSession::new();
    let handle = session.handle();
    let sql = "INSERT INTO files (data) VALUES (?1)";
    session.on_update(sql, 1);

    let conn = BridgeConnection::connect(session)?;
    let chunks = stream::iter(
        ["foo", "bar", "baz"]
            .map(|part| Ok::<_, SqlBridgeError>(Bytes::from_static(part.as_bytes()))),
    );
    let mut insert = conn.statement(sql);
    insert.bind(0, Blob::from_stream(chunks))?;
    assert_eq!(insert.execute().total_rows_affected().await?, 1);

    // The engine saw the concatenation, all nine bytes, in order.
    assert_eq!(handle.lob_bytes(1).as_deref(), Some(b"foobarbaz".as_slice()));
    // The created object was registered for cleanup.
    assert_eq!(handle.temporary_lobs(), vec![1]);
    // The binding itself carried the engine-side reference, not the content.
    let expected = LobRef {
        id: 1,
        kind: LobKind::Binary,
        length: Some(9),
    };
    assert_eq!(
        handle.commands()[0].bound,
        vec![(0, EngineValue::Blob(BlobValue::Ref(expected)))]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn clob_content_survives_the_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let session = StubSession::new();
    let handle = session.handle();
    session.on_update("INSERT INTO notes (body) VALUES (?1)", 1);
    session.on_query(
        "SELECT body FROM notes",
        vec![ColumnDescriptor::new("body", TypeTag::Clob)],
        vec![vec![EngineValue::Clob(ClobValue::Ref(LobRef {
            id: 1,
            kind: LobKind::Character,
            length: Some(9),
        }))]],
    );

    let conn = BridgeConnection::connect(session)?;
    let parts =
        stream::iter(["foo", "bar", "baz"].map(|part| Ok::<_, SqlBridgeError>(part.to_owned())));
    let mut insert = conn.statement("INSERT INTO notes (body) VALUES (?1)");
    insert.bind(0, Clob::from_stream(parts))?;
    assert_eq!(insert.execute().total_rows_affected().await?, 1);

    let rows = conn
        .statement("SELECT body FROM notes")
        .execute()
        .into_rows()
        .await?
        .collect_rows()
        .await?;
    let clob: Clob = rows[0].get(0)?;
    assert_eq!(clob.read_all().await?, "foobarbaz");
    // Draining to the end released the engine-side source.
    assert_eq!(handle.source_closes(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn engine_blob_references_demand_the_streaming_handle()
-> Result<(), Box<dyn std::error::Error>> {
    let session = StubSession::new();
    session.on_update("INSERT INTO files (data) VALUES (?1)", 1);
    session.on_query(
        "SELECT data FROM files",
        vec![ColumnDescriptor::new("data", TypeTag::Blob)],
        vec![vec![EngineValue::Blob(BlobValue::Ref(LobRef {
            id: 1,
            kind: LobKind::Binary,
            length: Some(9),
        }))]],
    );

    let conn = BridgeConnection::connect(session)?;
    let chunks = stream::iter([Ok::<_, SqlBridgeError>(Bytes::from_static(b"foobarbaz"))]);
    let mut insert = conn.statement("INSERT INTO files (data) VALUES (?1)");
    insert.bind(0, Blob::from_stream(chunks))?;
    insert.execute().total_rows_affected().await?;

    let rows = conn
        .statement("SELECT data FROM files")
        .execute()
        .into_rows()
        .await?
        .collect_rows()
        .await?;

    // An untyped read refuses to buffer an engine-side object silently.
    let err = rows[0].value(0).expect_err("reference should not buffer");
    assert!(matches!(err, SqlBridgeError::ConversionError(_)));

    // The handle streams it.
    let blob: Blob = rows[0].get(0)?;
    assert_eq!(blob.read_all().await?, b"foobarbaz".to_vec());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn dropping_a_reader_closes_the_source_once() -> Result<(), Box<dyn std::error::Error>> {
    let session = StubSession::new();
    let handle = session.handle();
    session.on_update("INSERT INTO files (data) VALUES (?1)", 1);
    session.on_query(
        "SELECT data FROM files",
        vec![ColumnDescriptor::new("data", TypeTag::Blob)],
        vec![vec![EngineValue::Blob(BlobValue::Ref(LobRef {
            id: 1,
            kind: LobKind::Binary,
            length: Some(3000),
        }))]],
    );

    let conn = BridgeConnection::connect(session)?;
    let payload = Bytes::from(vec![7u8; 3000]);
    let chunks = stream::iter([Ok::<_, SqlBridgeError>(payload)]);
    let mut insert = conn.statement("INSERT INTO files (data) VALUES (?1)");
    insert.bind(0, Blob::from_stream(chunks))?;
    insert.execute().total_rows_affected().await?;

    let rows = conn
        .statement("SELECT data FROM files")
        .execute()
        .into_rows()
        .await?
        .collect_rows()
        .await?;
    let blob: Blob = rows[0].get(0)?;

    let mut reader = blob.stream();
    let first = reader.next().await.expect("one chunk")?;
    assert!(!first.is_empty());
    assert!(first.len() < 3000, "demand-driven reads stay chunked");
    drop(reader);

    wait_for("the abandoned source to close", || handle.source_closes() == 1).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn abandoned_row_streams_release_their_cursors() -> Result<(), Box<dyn std::error::Error>> {
    let session = StubSession::new();
    let handle = session.handle();
    session.on_query(
        "SELECT name FROM people",
        vec![ColumnDescriptor::new("name", TypeTag::Varchar)],
        vec![
            vec![EngineValue::Text("alice".into())],
            vec![EngineValue::Text("bob".into())],
        ],
    );

    let conn = BridgeConnection::connect(session)?;
    let mut rows = conn
        .statement("SELECT name FROM people")
        .execute()
        .into_rows()
        .await?;
    // Take one row of two, then walk away.
    assert!(rows.try_next().await?.is_some());
    drop(rows);

    wait_for("the abandoned cursor to close", || handle.cursor_closes() == 1).await;
    Ok(())
}
