#![cfg(feature = "sqlite")]

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sql_bridge::prelude::*;
use tempfile::tempdir;
use uuid::Uuid;

const CREATE_ITEMS: &str = "CREATE TABLE items (
    id INTEGER PRIMARY KEY,
    flag BOOLEAN,
    n INT,
    big BIGINT,
    price DECIMAL(10,2),
    ratio DOUBLE,
    name TEXT,
    raw BLOB,
    tag UUID,
    day DATE,
    at TIMESTAMP
)";

#[tokio::test(flavor = "multi_thread")]
async fn typed_values_round_trip_through_a_file_database()
-> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let conn = BridgeConnection::open_sqlite(dir.path().join("roundtrip.db"))?;
    conn.statement(CREATE_ITEMS).execute().total_rows_affected().await?;

    let tag = Uuid::new_v4();
    let day = NaiveDate::from_ymd_opt(2024, 5, 17).expect("valid date");
    let at = day.and_hms_opt(10, 30, 0).expect("valid time");
    let price: Decimal = "19.99".parse()?;

    let mut insert = conn.statement(
        "INSERT INTO items (flag, n, big, price, ratio, name, raw, tag, day, at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    );
    insert
        .bind(0, true)?
        .bind(1, 41_i32)?
        .bind(2, 9_000_000_000_i64)?
        .bind(3, price)?
        .bind(4, 2.5_f64)?
        .bind(5, "alice")?
        .bind(6, vec![0xAB_u8, 0xCD])?
        .bind(7, tag)?
        .bind(8, day)?
        .bind(9, at)?;
    assert_eq!(insert.execute().total_rows_affected().await?, 1);

    let rows = conn
        .statement("SELECT flag, n, big, price, ratio, name, raw, tag, day, at FROM items")
        .execute()
        .into_rows()
        .await?
        .collect_rows()
        .await?;
    assert_eq!(rows.len(), 1);
    let row = &rows[0];

    assert!(row.get::<bool>(0)?);
    assert_eq!(row.get::<i32>(1)?, 41);
    assert_eq!(row.get::<i64>(2)?, 9_000_000_000);
    assert_eq!(row.get::<Decimal>(3)?, price);
    assert_eq!(row.get::<f64>(4)?, 2.5);
    assert_eq!(row.get::<String>(5)?, "alice");
    assert_eq!(row.get::<Vec<u8>>(6)?, vec![0xAB, 0xCD]);
    assert_eq!(row.get::<Uuid>(7)?, tag);
    assert_eq!(row.get::<NaiveDate>(8)?, day);
    assert_eq!(row.get::<NaiveDateTime>(9)?, at);

    // Declared types drive the column metadata.
    let metadata = row.metadata();
    assert_eq!(metadata.column(0).map(ColumnMetadata::tag), Some(TypeTag::Boolean));
    assert_eq!(metadata.column(3).map(ColumnMetadata::tag), Some(TypeTag::Decimal));
    assert_eq!(metadata.column(3).and_then(ColumnMetadata::precision), Some(10));
    assert_eq!(metadata.column(3).and_then(ColumnMetadata::scale), Some(2));
    assert_eq!(metadata.column(7).map(ColumnMetadata::tag), Some(TypeTag::Uuid));

    conn.close().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn undeclared_columns_infer_their_tag_from_the_data()
-> Result<(), Box<dyn std::error::Error>> {
    let conn = BridgeConnection::open_sqlite_in_memory()?;

    let mut results = conn.statement("SELECT 1; SELECT 2").execute();

    let first = results.try_next().await?.expect("first result");
    let SqlResult::Query(rows) = first else {
        panic!("expected rows");
    };
    let collected = rows.collect_rows().await?;
    assert_eq!(collected[0].get::<i64>(0)?, 1);

    let second = results.try_next().await?.expect("second result");
    let SqlResult::Query(rows) = second else {
        panic!("expected rows");
    };
    assert_eq!(rows.metadata().column(0).map(ColumnMetadata::tag), Some(TypeTag::BigInt));
    let collected = rows.collect_rows().await?;
    // Narrowing reads work on inferred integer columns.
    assert_eq!(collected[0].get::<i32>(0)?, 2);

    assert!(results.try_next().await?.is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn generated_keys_come_from_the_rowid() -> Result<(), Box<dyn std::error::Error>> {
    let conn = BridgeConnection::open_sqlite_in_memory()?;
    conn.statement("CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT)")
        .execute()
        .total_rows_affected()
        .await?;

    let mut insert = conn.statement("INSERT INTO people (name) VALUES (?1)");
    insert.bind(0, "alice")?.return_generated_values();
    let update = insert.execute().into_update().await?;
    assert_eq!(update.rows_affected(), 1);
    let keys = update.into_generated_keys().expect("generated keys");
    assert_eq!(keys.metadata().columns()[0].name(), "rowid");
    assert_eq!(keys.rows()[0].get::<i64>(0)?, 1);

    // A named request narrows to the same single rowid column.
    let mut insert = conn.statement("INSERT INTO people (name) VALUES (?1)");
    insert.bind(0, "bob")?.return_generated_columns(["id"]);
    let update = insert.execute().into_update().await?;
    let keys = update.into_generated_keys().expect("generated keys");
    assert_eq!(keys.rows()[0].get::<i64>(0)?, 2);

    // No request, no keys.
    let mut insert = conn.statement("INSERT INTO people (name) VALUES (?1)");
    insert.bind(0, "carol")?;
    let update = insert.execute().into_update().await?;
    assert!(update.generated_keys().is_none());

    // Non-insert commands never report keys, requested or not.
    let mut update_stmt = conn.statement("UPDATE people SET name = ?1");
    update_stmt.bind(0, "dave")?.return_generated_values();
    let update = update_stmt.execute().into_update().await?;
    assert_eq!(update.rows_affected(), 3);
    assert!(update.generated_keys().is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn engine_errors_carry_kind_code_and_state() -> Result<(), Box<dyn std::error::Error>> {
    let conn = BridgeConnection::open_sqlite_in_memory()?;
    conn.statement("CREATE TABLE u (name TEXT UNIQUE)")
        .execute()
        .total_rows_affected()
        .await?;

    let mut insert = conn.statement("INSERT INTO u (name) VALUES (?1)");
    insert.bind(0, "alice")?;
    insert.execute().total_rows_affected().await?;

    let mut insert = conn.statement("INSERT INTO u (name) VALUES (?1)");
    insert.bind(0, "alice")?;
    let err = insert
        .execute()
        .total_rows_affected()
        .await
        .expect_err("duplicate key");
    match err {
        SqlBridgeError::Engine(engine) => {
            assert_eq!(engine.kind, EngineErrorKind::DataIntegrity);
            // SQLITE_CONSTRAINT_UNIQUE
            assert_eq!(engine.code, 2067);
            assert_eq!(engine.sql_state, "HY000");
            assert!(engine.message.contains("UNIQUE"), "{engine}");
        }
        other => panic!("expected an engine error, got {other:?}"),
    }

    let err = conn
        .statement("SELECT * FROM missing")
        .execute()
        .into_rows()
        .await
        .expect_err("missing table");
    match err {
        SqlBridgeError::Engine(engine) => {
            assert!(engine.message.contains("no such table"), "{engine}");
        }
        other => panic!("expected an engine error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn intervals_round_trip_as_typed_literals() -> Result<(), Box<dyn std::error::Error>> {
    // Multi-field qualifiers contain TO, a reserved word SQLite rejects in a
    // declared column type, so the table declares a single-field one.
    let conn = BridgeConnection::open_sqlite_in_memory()?;
    conn.statement("CREATE TABLE spans (dur INTERVAL SECOND)")
        .execute()
        .total_rows_affected()
        .await?;

    // 2 hours, 5 minutes, 3.5 seconds.
    let span = SqlInterval::new(
        IntervalQualifier::Second,
        false,
        2 * 3600 + 5 * 60 + 3,
        500_000_000,
    );
    let mut insert = conn.statement("INSERT INTO spans (dur) VALUES (?1)");
    insert.bind(0, span)?;
    assert_eq!(insert.execute().total_rows_affected().await?, 1);

    let rows = conn
        .statement("SELECT dur FROM spans")
        .execute()
        .into_rows()
        .await?
        .collect_rows()
        .await?;
    assert_eq!(
        rows[0].metadata().column(0).map(ColumnMetadata::tag),
        Some(TypeTag::Interval(IntervalQualifier::Second))
    );
    assert_eq!(rows[0].get::<SqlInterval>(0)?, span);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn inline_blobs_also_stream_on_request() -> Result<(), Box<dyn std::error::Error>> {
    let conn = BridgeConnection::open_sqlite_in_memory()?;
    conn.statement("CREATE TABLE files (data BLOB)")
        .execute()
        .total_rows_affected()
        .await?;

    let mut insert = conn.statement("INSERT INTO files (data) VALUES (?1)");
    insert.bind(0, b"foobarbaz".to_vec())?;
    insert.execute().total_rows_affected().await?;

    let rows = conn
        .statement("SELECT data FROM files")
        .execute()
        .into_rows()
        .await?
        .collect_rows()
        .await?;
    // Buffered and streamed reads see the same nine bytes.
    assert_eq!(rows[0].get::<Vec<u8>>(0)?, b"foobarbaz".to_vec());
    let blob: Blob = rows[0].get(0)?;
    assert_eq!(blob.read_all().await?, b"foobarbaz".to_vec());
    Ok(())
}
