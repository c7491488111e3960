use profile_store::{
    ingest_batch, parse_profile_text, IngestOutcome, ProfileQueries, Record, SchemaRegistry,
    StoreError, UploadUnit,
};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

async fn memory_pool() -> SqlitePool {
    // One connection: each in-memory SQLite connection is its own database.
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

async fn setup() -> (SchemaRegistry, ProfileQueries) {
    let registry = SchemaRegistry::new(memory_pool().await);
    let queries = ProfileQueries::new(registry.clone());
    (registry, queries)
}

fn unit(name: &str, rows: &[(&str, &str, u32)]) -> UploadUnit {
    UploadUnit {
        table_name: name.to_string(),
        data: rows
            .iter()
            .map(|(core, task, usaged)| Record {
                core: core.to_string(),
                task: task.to_string(),
                usaged: *usaged,
            })
            .collect(),
    }
}

#[tokio::test]
async fn upload_creates_one_table_per_unit() {
    let (registry, queries) = setup().await;

    let report = ingest_batch(
        &registry,
        &[
            unit("p1", &[("c1", "t1", 10), ("c1", "t2", 20)]),
            unit("p2", &[("c2", "t1", 5)]),
        ],
    )
    .await
    .unwrap();

    assert_eq!(report.created, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.outcome(), IngestOutcome::Success);

    assert_eq!(queries.list_datasets().await.unwrap(), vec!["p1", "p2"]);
    assert_eq!(queries.fetch_rows("p1").await.unwrap().len(), 2);
    assert_eq!(queries.fetch_rows("p2").await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_upload_is_a_noop() {
    let (registry, queries) = setup().await;

    let first = unit("p1", &[("c1", "t1", 10), ("c1", "t1", 20)]);
    ingest_batch(&registry, std::slice::from_ref(&first))
        .await
        .unwrap();

    // Second upload of the same name: neither overwrite nor append.
    let second = unit("p1", &[("c9", "t9", 999)]);
    let report = ingest_batch(&registry, &[second]).await.unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.outcome(), IngestOutcome::NoOp);

    let rows = queries.fetch_rows("p1").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.core == "c1"));
}

#[tokio::test]
async fn invalid_and_empty_units_are_skipped() {
    let (registry, queries) = setup().await;

    let report = ingest_batch(
        &registry,
        &[
            unit("", &[("c1", "t1", 1)]),
            unit("bad name!", &[("c1", "t1", 1)]),
            unit("empty", &[]),
        ],
    )
    .await
    .unwrap();

    assert_eq!(report.created, 0);
    assert_eq!(report.skipped, 3);
    assert_eq!(report.outcome(), IngestOutcome::NoOp);
    assert!(queries.list_datasets().await.unwrap().is_empty());
}

#[tokio::test]
async fn records_with_invalid_labels_are_dropped() {
    let (registry, queries) = setup().await;

    let long = "x".repeat(21);
    let report = ingest_batch(
        &registry,
        &[unit("p1", &[(long.as_str(), "t1", 1), ("", "t1", 2), ("c1", "t1", 3)])],
    )
    .await
    .unwrap();

    assert_eq!(report.created, 1);
    let rows = queries.fetch_rows("p1").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].usaged, 3);
}

#[tokio::test]
async fn table_names_are_case_normalized() {
    let (registry, queries) = setup().await;

    ingest_batch(&registry, &[unit("Profile_A", &[("c1", "t1", 1)])])
        .await
        .unwrap();
    assert_eq!(queries.list_datasets().await.unwrap(), vec!["profile_a"]);

    // Same name in a different case is the same dataset.
    let report = ingest_batch(&registry, &[unit("PROFILE_A", &[("c2", "t2", 2)])])
        .await
        .unwrap();
    assert_eq!(report.created, 0);
    assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn get_or_create_reports_creation_exactly_once() {
    let (registry, _) = setup().await;

    let (h1, created) = registry.get_or_create("p1").await.unwrap();
    assert!(created);
    let (h2, created) = registry.get_or_create("p1").await.unwrap();
    assert!(!created);
    assert_eq!(h1, h2);
    assert!(registry.exists("p1").await.unwrap());
    assert!(!registry.exists("p2").await.unwrap());
}

#[tokio::test]
async fn overall_stats_match_known_values() {
    let (registry, queries) = setup().await;

    ingest_batch(
        &registry,
        &[unit("p1", &[("c1", "t1", 10), ("c1", "t1", 20)])],
    )
    .await
    .unwrap();

    let stats = queries.overall_stats("p1").await.unwrap();
    assert_eq!(stats.total_count, 2);
    assert_eq!(stats.min, 10.0);
    assert_eq!(stats.max, 20.0);
    assert!((stats.avg - 15.0).abs() < 1e-9);
    // Population stddev of {10, 20}.
    let stddev = stats.stddev.unwrap();
    assert!((stddev - 5.0).abs() < 1e-9);
}

#[tokio::test]
async fn stats_bounds_hold() {
    let (registry, queries) = setup().await;

    ingest_batch(
        &registry,
        &[unit(
            "p1",
            &[("c1", "t1", 3), ("c2", "t2", 17), ("c1", "t3", 8), ("c3", "t1", 11)],
        )],
    )
    .await
    .unwrap();

    let stats = queries.overall_stats("p1").await.unwrap();
    assert!(stats.min <= stats.avg);
    assert!(stats.avg <= stats.max);
}

#[tokio::test]
async fn single_row_stddev_is_null() {
    let (registry, queries) = setup().await;

    ingest_batch(&registry, &[unit("p1", &[("c1", "t1", 42)])])
        .await
        .unwrap();

    let stats = queries.overall_stats("p1").await.unwrap();
    assert_eq!(stats.total_count, 1);
    assert_eq!(stats.stddev, None);

    let by_core = queries.stats_by_core("p1").await.unwrap();
    assert_eq!(by_core[0].stddev, None);
}

#[tokio::test]
async fn group_counts_partition_the_dataset() {
    let (registry, queries) = setup().await;

    ingest_batch(
        &registry,
        &[unit(
            "p1",
            &[
                ("c1", "t1", 1),
                ("c1", "t2", 2),
                ("c2", "t1", 3),
                ("c2", "t2", 4),
                ("c2", "t3", 5),
            ],
        )],
    )
    .await
    .unwrap();

    let total = queries.overall_stats("p1").await.unwrap().total_count;
    let by_core = queries.stats_by_core("p1").await.unwrap();
    assert_eq!(by_core.iter().map(|g| g.count).sum::<i64>(), total);

    let by_task = queries.stats_by_task("p1").await.unwrap();
    assert_eq!(by_task.iter().map(|g| g.count).sum::<i64>(), total);
}

#[tokio::test]
async fn grouped_stats_are_sorted_ascending() {
    let (registry, queries) = setup().await;

    ingest_batch(
        &registry,
        &[unit(
            "p1",
            &[("c2", "t3", 7), ("c1", "t1", 1), ("c3", "t2", 4)],
        )],
    )
    .await
    .unwrap();

    let cores: Vec<_> = queries
        .stats_by_core("p1")
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.label)
        .collect();
    assert_eq!(cores, vec!["c1", "c2", "c3"]);

    let tasks: Vec<_> = queries
        .stats_by_task("p1")
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.label)
        .collect();
    assert_eq!(tasks, vec!["t1", "t2", "t3"]);
}

#[tokio::test]
async fn fetch_rows_is_ordered_by_core_then_task() {
    let (registry, queries) = setup().await;

    ingest_batch(
        &registry,
        &[unit(
            "p1",
            &[("c2", "t1", 1), ("c1", "t2", 2), ("c1", "t1", 3)],
        )],
    )
    .await
    .unwrap();

    let rows = queries.fetch_rows("p1").await.unwrap();
    let order: Vec<_> = rows
        .iter()
        .map(|r| (r.core.as_str(), r.task.as_str()))
        .collect();
    assert_eq!(order, vec![("c1", "t1"), ("c1", "t2"), ("c2", "t1")]);
}

#[tokio::test]
async fn drop_removes_table_and_handle() {
    let (registry, queries) = setup().await;

    ingest_batch(&registry, &[unit("p1", &[("c1", "t1", 1)])])
        .await
        .unwrap();
    registry.drop("p1").await.unwrap();

    assert!(queries.list_datasets().await.unwrap().is_empty());
    match queries.fetch_rows("p1").await {
        Err(StoreError::NotFound(name)) => assert_eq!(name, "p1"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn drop_of_unknown_name_is_not_found() {
    let (registry, _) = setup().await;
    assert!(registry.drop("missing").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn drop_works_for_tables_never_touched_in_process() {
    let (registry, _) = setup().await;

    // Table created outside the registry, as if by a previous process.
    sqlx::query("CREATE TABLE legacy (core VARCHAR(20) NOT NULL, task VARCHAR(20) NOT NULL, usaged INT UNSIGNED NOT NULL)")
        .execute(registry.pool())
        .await
        .unwrap();

    registry.drop("legacy").await.unwrap();
    assert!(!registry.exists("legacy").await.unwrap());
}

#[tokio::test]
async fn reads_on_unknown_tables_are_not_found() {
    let (_, queries) = setup().await;
    assert!(queries.overall_stats("nope").await.unwrap_err().is_not_found());
    assert!(queries.stats_by_core("nope").await.unwrap_err().is_not_found());
    assert!(queries.stats_by_task("nope").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn reserved_tables_are_never_listed() {
    let (registry, queries) = setup().await;

    sqlx::query("CREATE TABLE _sqlx_migrations (version BIGINT PRIMARY KEY)")
        .execute(registry.pool())
        .await
        .unwrap();
    ingest_batch(&registry, &[unit("p1", &[("c1", "t1", 1)])])
        .await
        .unwrap();

    assert_eq!(queries.list_datasets().await.unwrap(), vec!["p1"]);
}

#[tokio::test]
async fn parsed_text_flows_through_ingestion() {
    let (registry, queries) = setup().await;

    let text = "core task usaged\nc1 t1 10\nc1 t2 bogus\nc2 t1 30\n";
    let units = vec![parse_profile_text("Bench_Run.txt", text)];
    let report = ingest_batch(&registry, &units).await.unwrap();

    assert_eq!(report.created, 1);
    let rows = queries.fetch_rows("bench_run").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].usaged, 10);
    assert_eq!(rows[1].usaged, 30);
}
