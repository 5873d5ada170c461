use sql_bridge::engine::ColumnDescriptor;
use sql_bridge::prelude::*;
use sql_bridge::value::EngineValue;

fn scripted_queries() -> (StubSession, StubHandle) {
    let session = StubSession::new();
    let handle = session.handle();
    session.on_query(
        "SELECT 1",
        vec![ColumnDescriptor::new("1", TypeTag::Integer)],
        vec![vec![EngineValue::Integer(1)]],
    );
    session.on_query(
        "SELECT 2",
        vec![ColumnDescriptor::new("2", TypeTag::Integer)],
        vec![vec![EngineValue::Integer(2)]],
    );
    (session, handle)
}

#[tokio::test(flavor = "multi_thread")]
async fn batched_bindings_run_the_statement_once_per_set() -> Result<(), Box<dyn std::error::Error>>
{
    let session = StubSession::new();
    let handle = session.handle();
    let sql = "INSERT INTO people (name) VALUES (?1)";
    session.on_update(sql, 1);

    let conn = BridgeConnection::connect(session)?;
    let mut insert = conn.statement(sql);
    insert.bind(0, "alice")?.add();
    // add() with nothing bound since the last one changes nothing.
    insert.add();
    insert.bind(0, "bob")?.add();
    assert_eq!(insert.execute().total_rows_affected().await?, 2);

    let commands = handle.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].bound, vec![(0, EngineValue::Text("alice".into()))]);
    assert_eq!(commands[1].bound, vec![(0, EngineValue::Text("bob".into()))]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn compound_commands_yield_results_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let (session, handle) = scripted_queries();
    let conn = BridgeConnection::connect(session)?;

    let mut results = conn.statement("SELECT 1; SELECT 2").execute();

    let first = results.try_next().await?.expect("first result");
    let SqlResult::Query(rows) = first else {
        panic!("expected rows from the first piece");
    };
    let collected = rows.collect_rows().await?;
    assert_eq!(collected[0].get::<i32>(0)?, 1);

    let second = results.try_next().await?.expect("second result");
    let SqlResult::Query(rows) = second else {
        panic!("expected rows from the second piece");
    };
    let collected = rows.collect_rows().await?;
    assert_eq!(collected[0].get::<i32>(0)?, 2);

    assert!(results.try_next().await?.is_none());

    let sqls: Vec<String> = handle.commands().into_iter().map(|c| c.sql).collect();
    assert_eq!(sqls, ["SELECT 1", "SELECT 2"]);
    // Both cursors were drained to exhaustion and released on the engine side.
    assert_eq!(handle.cursor_closes(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn later_pieces_never_run_when_the_stream_is_dropped()
-> Result<(), Box<dyn std::error::Error>> {
    let (session, handle) = scripted_queries();
    let conn = BridgeConnection::connect(session)?;

    let mut results = conn.statement("SELECT 1; SELECT 2").execute();
    let first = results.try_next().await?.expect("first result");
    drop(first);
    drop(results);

    let sqls: Vec<String> = handle.commands().into_iter().map(|c| c.sql).collect();
    assert_eq!(sqls, ["SELECT 1"]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn placeholder_names_map_to_zero_based_positions() -> Result<(), Box<dyn std::error::Error>>
{
    let session = StubSession::new();
    let handle = session.handle();
    let sql = "INSERT INTO t VALUES (?1, ?2)";
    session.on_update(sql, 1);

    let conn = BridgeConnection::connect(session)?;
    let mut insert = conn.statement(sql);
    insert.bind_named("?2", "second")?;
    insert.bind_named("$1", "first")?;
    assert_eq!(insert.execute().total_rows_affected().await?, 1);

    // Bound entries come back in position order, not bind-call order.
    assert_eq!(
        handle.commands()[0].bound,
        vec![
            (0, EngineValue::Text("first".into())),
            (1, EngineValue::Text("second".into())),
        ]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_placeholders_are_binding_errors() -> Result<(), Box<dyn std::error::Error>> {
    let session = StubSession::new();
    let conn = BridgeConnection::connect(session)?;
    let mut stmt = conn.statement("INSERT INTO t VALUES (?1)");

    for name in ["name", "?", "$", "?0", "1"] {
        let err = stmt.bind_named(name, "x").expect_err(name);
        assert!(matches!(err, SqlBridgeError::BindingError(_)), "{name}");
        assert!(err.to_string().contains("1-based ordinal"), "{err}");
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn untyped_null_literals_are_rejected_at_bind_time()
-> Result<(), Box<dyn std::error::Error>> {
    let session = StubSession::new();
    let conn = BridgeConnection::connect(session)?;
    let mut stmt = conn.statement("INSERT INTO t VALUES (?1)");

    let err = stmt.bind(0, HostValue::Null).expect_err("null literal");
    assert!(matches!(err, SqlBridgeError::BindingError(_)));
    assert!(err.to_string().contains("bind_null"), "{err}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn engine_failures_keep_their_code_and_state() -> Result<(), Box<dyn std::error::Error>> {
    let session = StubSession::new();
    session.on_error(
        "SELECT * FROM missing",
        EngineError::new(EngineErrorKind::BadGrammar, 1001, "42S02", "table missing not found"),
    );

    let conn = BridgeConnection::connect(session)?;
    let mut results = conn.statement("SELECT * FROM missing").execute();

    match results.try_next().await {
        Err(SqlBridgeError::Engine(engine)) => {
            assert_eq!(engine.kind, EngineErrorKind::BadGrammar);
            assert_eq!(engine.code, 1001);
            assert_eq!(engine.sql_state, "42S02");
        }
        other => panic!("expected an engine error, got {other:?}"),
    }
    // The failure ends the stream; nothing further runs.
    assert!(results.try_next().await?.is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn misreading_a_result_kind_is_a_conversion_error() -> Result<(), Box<dyn std::error::Error>>
{
    let session = StubSession::new();
    session.on_update("DELETE FROM t", 3);

    let conn = BridgeConnection::connect(session)?;
    let err = conn
        .statement("DELETE FROM t")
        .execute()
        .into_rows()
        .await
        .expect_err("update counts are not rows");
    assert!(matches!(err, SqlBridgeError::ConversionError(_)));

    let update = conn.statement("DELETE FROM t").execute().into_update().await?;
    assert_eq!(update.rows_affected(), 3);
    Ok(())
}
