#[allow(unused)]
mod support;

use soundshelf::cache::compute_key;
use soundshelf::db::Dialect;
use soundshelf::params;
use soundshelf::query::{PaginatedQuery, QueryOptions};
use soundshelf::Error;
use std::time::Duration;
use support::{audio_rows, ids, TestStack};

const LISTING: &str = "SELECT id, title FROM audios WHERE category = ? ORDER BY created_at DESC";

fn options(page: u32, limit: u32) -> QueryOptions {
    QueryOptions::default().with_page(page).with_limit(limit)
}

// ---------------------------------------------------------------------------
// Envelope shape
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_page_of_five_rows() -> anyhow::Result<()> {
    let stack = TestStack::new(audio_rows(5));
    let opts = options(1, 2);

    let page = stack
        .paginator
        .paginate(LISTING, &params!["science"], &opts)
        .await?;

    assert_eq!(ids(&page.items), vec![1, 2]);
    assert_eq!(page.total, 5);
    assert_eq!(page.page, 1);
    assert_eq!(page.limit, 2);
    assert!(page.has_more);

    let plan = PaginatedQuery::build(Dialect::MySql, LISTING, &params!["science"], 1, 2)?;
    let data_key = compute_key(&plan.data_sql, &plan.data_params, &opts);
    let count_key = compute_key(&plan.count_sql, &plan.count_params, &opts);
    assert!(stack.cache.contains_key(&data_key).await);
    assert!(stack.cache.contains_key(&count_key).await);
    assert_eq!(stack.cache.len().await, 2);
    Ok(())
}

#[tokio::test]
async fn has_more_flips_on_last_page() -> anyhow::Result<()> {
    let stack = TestStack::new(audio_rows(25));

    let last = stack.paginator.paginate(LISTING, &params!["science"], &options(3, 10)).await?;
    assert_eq!(last.items.len(), 5);
    assert_eq!(last.total, 25);
    assert!(!last.has_more);

    let middle = stack.paginator.paginate(LISTING, &params!["science"], &options(2, 10)).await?;
    assert_eq!(middle.items.len(), 10);
    assert_eq!(ids(&middle.items).first(), Some(&11));
    assert!(middle.has_more);
    Ok(())
}

#[tokio::test]
async fn empty_result_has_no_more_pages() -> anyhow::Result<()> {
    let stack = TestStack::new(Vec::new());
    let page = stack.paginator.paginate(LISTING, &params!["science"], &options(1, 10)).await?;
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
    assert!(!page.has_more);
    Ok(())
}

#[tokio::test]
async fn numeric_string_totals_are_accepted() -> anyhow::Result<()> {
    let stack = TestStack::new(audio_rows(7));
    stack.backend.set_count_as_text(true);
    let page = stack.paginator.paginate(LISTING, &params!["science"], &options(1, 5)).await?;
    assert_eq!(page.total, 7);
    assert!(page.has_more);
    Ok(())
}

// ---------------------------------------------------------------------------
// Caching
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_call_within_ttl_is_served_from_cache() -> anyhow::Result<()> {
    let stack = TestStack::new(audio_rows(12));
    let opts = options(2, 5);

    let first = stack.paginator.paginate(LISTING, &params!["science"], &opts).await?;
    assert_eq!(stack.backend.call_count(), 2);

    let second = stack.paginator.paginate(LISTING, &params!["science"], &opts).await?;
    assert_eq!(stack.backend.call_count(), 2, "second call must not reach the backend");
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn expired_entries_are_recomputed() -> anyhow::Result<()> {
    let stack = TestStack::new(audio_rows(3));
    let opts = options(1, 10).with_ttl(Duration::from_secs(1));

    stack.paginator.paginate(LISTING, &params!["science"], &opts).await?;
    tokio::time::advance(Duration::from_millis(1001)).await;
    stack.paginator.paginate(LISTING, &params!["science"], &opts).await?;

    assert_eq!(stack.backend.call_count(), 4);
    Ok(())
}

#[tokio::test]
async fn invalidation_while_in_flight_discards_results() -> anyhow::Result<()> {
    let stack = TestStack::new(audio_rows(4));
    let opts = options(1, 10);

    // The invalidation completes while both statements wait on the backend.
    let science = params!["science"];
    let (page, removed) = tokio::join!(
        stack.paginator.paginate(LISTING, &science, &opts),
        stack.cache.invalidate_prefix("query:"),
    );
    assert_eq!(page?.total, 4);
    assert_eq!(removed, 0);
    assert!(stack.cache.is_empty().await);

    stack.paginator.paginate(LISTING, &params!["science"], &opts).await?;
    assert_eq!(stack.cache.len().await, 2);
    Ok(())
}

#[tokio::test]
async fn disabled_cache_always_executes() -> anyhow::Result<()> {
    let stack = TestStack::new(audio_rows(3));
    let opts = options(1, 10).without_cache();

    stack.paginator.paginate(LISTING, &params!["science"], &opts).await?;
    stack.paginator.paginate(LISTING, &params!["science"], &opts).await?;

    assert_eq!(stack.backend.call_count(), 4);
    assert!(stack.cache.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn globally_disabled_cache_ignores_options() -> anyhow::Result<()> {
    let stack = TestStack::new(audio_rows(3));
    let paginator = stack.paginator.clone().with_cache_enabled(false);

    paginator.paginate(LISTING, &params!["science"], &options(1, 10)).await?;
    paginator.paginate(LISTING, &params!["science"], &options(1, 10)).await?;

    assert_eq!(stack.backend.call_count(), 4);
    assert!(stack.cache.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn different_parameters_do_not_share_entries() -> anyhow::Result<()> {
    let stack = TestStack::new(audio_rows(3));
    stack.paginator.paginate(LISTING, &params!["science"], &options(1, 10)).await?;
    stack.paginator.paginate(LISTING, &params!["history"], &options(1, 10)).await?;
    assert_eq!(stack.backend.call_count(), 4);
    assert_eq!(stack.cache.len().await, 4);
    Ok(())
}

#[tokio::test]
async fn count_is_shared_across_pages() -> anyhow::Result<()> {
    let stack = TestStack::new(audio_rows(30));
    stack.paginator.paginate(LISTING, &params!["science"], &options(1, 10)).await?;
    stack.paginator.paginate(LISTING, &params!["science"], &options(2, 10)).await?;

    let counts = stack.backend.calls().iter().filter(|c| c.is_count()).count();
    assert_eq!(counts, 1, "count query does not depend on the page");
    assert_eq!(stack.backend.call_count(), 3);
    Ok(())
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_count_fails_the_page_and_caches_nothing() -> anyhow::Result<()> {
    let stack = TestStack::new(audio_rows(5));
    stack.backend.set_fail_counts(true);

    let err = stack
        .paginator
        .paginate(LISTING, &params!["science"], &options(1, 2))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Query { .. }));
    assert!(err.to_string().contains("statement timeout"));
    assert!(stack.cache.is_empty().await);

    stack.backend.set_fail_counts(false);
    let page = stack.paginator.paginate(LISTING, &params!["science"], &options(1, 2)).await?;
    assert_eq!(page.total, 5);
    Ok(())
}

#[tokio::test]
async fn data_and_count_are_dispatched_together() -> anyhow::Result<()> {
    let stack = TestStack::new(audio_rows(5));
    stack.backend.set_fail_data(true);

    let result = stack.paginator.paginate(LISTING, &params!["science"], &options(1, 2)).await;
    assert!(result.is_err());

    // The count query was already in flight when the data query failed.
    let calls = stack.backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().any(|c| c.is_count()));
    assert!(stack.cache.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn invalid_paging_never_reaches_backend() -> anyhow::Result<()> {
    let stack = TestStack::new(audio_rows(5));
    let opts = QueryOptions {
        limit: 0,
        ..QueryOptions::default()
    };
    let err = stack
        .paginator
        .paginate(LISTING, &params!["science"], &opts)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPagination(_)));

    let err = stack
        .paginator
        .paginate(LISTING, &[], &options(1, 10))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ParameterMismatch { expected: 1, actual: 0 }));
    assert_eq!(stack.backend.call_count(), 0);
    Ok(())
}

// ---------------------------------------------------------------------------
// Dialects and cached reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn postgres_receives_numbered_placeholders() -> anyhow::Result<()> {
    let stack = TestStack::with_dialect(Dialect::Postgres, audio_rows(4));
    let page = stack.paginator.paginate(LISTING, &params!["science"], &options(2, 3)).await?;
    assert_eq!(ids(&page.items), vec![4]);

    let calls = stack.backend.calls();
    let data = calls.iter().find(|c| !c.is_count()).expect("data call");
    assert!(data.sql.ends_with("ORDER BY created_at DESC LIMIT $2 OFFSET $3"));
    let count = calls.iter().find(|c| c.is_count()).expect("count call");
    assert_eq!(count.sql, "SELECT COUNT(*) AS total FROM audios WHERE category = $1");
    assert_eq!(count.params, params!["science"]);
    Ok(())
}

#[tokio::test]
async fn execute_cached_skips_backend_on_hit_but_not_for_writes() -> anyhow::Result<()> {
    let stack = TestStack::new(audio_rows(2));
    let opts = QueryOptions::default();

    let sql = "SELECT id, title FROM audios";
    let first = stack.paginator.execute_cached(sql, &[], &opts).await?;
    let second = stack.paginator.execute_cached(sql, &[], &opts).await?;
    assert_eq!(first.rows, second.rows);
    assert_eq!(stack.backend.call_count(), 1);

    let insert = "INSERT INTO audios (title) VALUES (?)";
    stack.paginator.execute_cached(insert, &params!["New"], &opts).await?;
    stack.paginator.execute_cached(insert, &params!["New"], &opts).await?;
    assert_eq!(stack.backend.call_count(), 3);
    Ok(())
}

#[tokio::test]
async fn postgres_backslash_literal_paginates() -> anyhow::Result<()> {
    let stack = TestStack::with_dialect(Dialect::Postgres, audio_rows(3));
    let sql = r"SELECT id FROM audios WHERE path <> 'C:\' AND category = ? ORDER BY id";

    let page = stack.paginator.paginate(sql, &params!["science"], &options(1, 2)).await?;
    assert_eq!(ids(&page.items), vec![1, 2]);
    assert_eq!(page.total, 3);

    let calls = stack.backend.calls();
    let count = calls.iter().find(|c| c.is_count()).expect("count call");
    assert_eq!(
        count.sql,
        r"SELECT COUNT(*) AS total FROM audios WHERE path <> 'C:\' AND category = $1"
    );
    Ok(())
}

#[tokio::test]
async fn commented_select_is_cached() -> anyhow::Result<()> {
    let stack = TestStack::new(audio_rows(2));
    let opts = QueryOptions::default();

    for sql in [
        "/* catalog listing */ SELECT id FROM audios",
        "-- catalog listing\nSELECT id, title FROM audios",
    ] {
        stack.paginator.execute_cached(sql, &[], &opts).await?;
        stack.paginator.execute_cached(sql, &[], &opts).await?;
    }
    assert_eq!(stack.backend.call_count(), 2);
    assert_eq!(stack.cache.len().await, 2);
    Ok(())
}
