//! Live Postgres round trips. Skipped unless `DATABASE_URL` is set.

#![cfg(feature = "postgres")]

use sqlbind::migrate::{Migrator, MigratorConfig};
use sqlbind::{Db, Record, Value};
use std::time::{SystemTime, UNIX_EPOCH};

async fn try_connect() -> Option<tokio_postgres::Client> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").ok()?;
    let (client, connection) = tokio_postgres::connect(&database_url, tokio_postgres::NoTls)
        .await
        .expect("Failed to connect to DATABASE_URL with NoTls");
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("tokio-postgres connection error: {e}");
        }
    });
    Some(client)
}

fn unique(prefix: &str) -> String {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    format!("{prefix}_{nonce}")
}

#[derive(Record)]
struct Person {
    #[db("first_name")]
    first: String,
    email: String,
    age: i32,
}

#[tokio::test]
async fn named_exec_and_query_in() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let db = Db::new(client);
    db.exec(
        "CREATE TEMP TABLE person (id SERIAL PRIMARY KEY, first_name TEXT, email TEXT, age INT)",
        &[],
    )
    .await
    .unwrap();

    let people = [
        Person {
            first: "Jane".into(),
            email: "jane@example.com".into(),
            age: 31,
        },
        Person {
            first: "John".into(),
            email: "john@example.com".into(),
            age: 40,
        },
    ];
    let inserted = db
        .named_exec_batch(
            "INSERT INTO person (first_name, email, age) VALUES (:first_name, :email, :age)",
            &people,
        )
        .await
        .unwrap();
    assert_eq!(inserted, 2);

    let rows = db
        .query_in(
            "SELECT first_name, age FROM person WHERE first_name IN (?) AND email <> '?' ORDER BY age",
            vec![Value::list(["Jane", "John"])],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("first_name"), Some(&Value::Text("Jane".into())));
    assert_eq!(rows[1].get("age"), Some(&Value::Int(40)));

    let rows = db
        .named_query(
            "SELECT email FROM person WHERE first_name = :first_name",
            &people[1],
        )
        .await
        .unwrap();
    assert_eq!(
        rows[0].get("email"),
        Some(&Value::Text("john@example.com".into()))
    );
}

#[tokio::test]
async fn transactions_commit_and_roll_back() {
    let Some(client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let mut db = Db::new(client);
    db.exec("CREATE TEMP TABLE counter (n INT)", &[]).await.unwrap();

    let tx = db.begin().await.unwrap();
    tx.exec("INSERT INTO counter (n) VALUES (?)", &[Value::Int(1)])
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    let tx = db.begin().await.unwrap();
    tx.exec("INSERT INTO counter (n) VALUES (?)", &[Value::Int(2)])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let rows = db.query("SELECT n FROM counter", &[]).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("n"), Some(&Value::Int(2)));
}

#[tokio::test]
async fn migrations_run_once() {
    let Some(mut client) = try_connect().await else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };

    let version_table = unique("sqlbind_versions");
    let data_table = unique("sqlbind_data");
    let mut migrator = Migrator::new(
        MigratorConfig::new()
            .table(&version_table)
            .dialect("postgres")
            .context(serde_json::json!({ "table": &data_table })),
    );
    migrator.add(sqlbind::Migration::template(
        "001_create",
        "CREATE TABLE {table} (id INT)",
    ));

    let report = migrator.run(&mut client).await.unwrap();
    assert_eq!(report.applied, ["001_create"]);
    let report = migrator.run(&mut client).await.unwrap();
    assert_eq!(report.skipped, ["001_create"]);

    client
        .batch_execute(&format!("DROP TABLE {data_table}; DROP TABLE {version_table};"))
        .await
        .unwrap();
}
