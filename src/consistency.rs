//! Counter consistency check.
//!
//! `view_count` / `click_count` on content links and advertisements are
//! cached copies of event-row counts. The check recounts the event tables
//! grouped by foreign key and reports every counter that disagrees.

use sqlx::SqlitePool;

use crate::models::CounterDiscrepancy;

/// One counter column and the event table that is its ground truth.
struct CounterSource {
    table: &'static str,
    counter: &'static str,
    events: &'static str,
    foreign_key: &'static str,
}

const COUNTERS: &[CounterSource] = &[
    CounterSource {
        table: "content_links",
        counter: "view_count",
        events: "ad_impressions",
        foreign_key: "content_link_id",
    },
    CounterSource {
        table: "content_links",
        counter: "click_count",
        events: "content_clicks",
        foreign_key: "content_link_id",
    },
    CounterSource {
        table: "advertisements",
        counter: "view_count",
        events: "ad_impressions",
        foreign_key: "advertisement_id",
    },
    CounterSource {
        table: "advertisements",
        counter: "click_count",
        events: "content_clicks",
        foreign_key: "advertisement_id",
    },
];

/// Compare every stored counter against its event rows. An empty result
/// means all counters are consistent.
pub async fn check_counters(pool: &SqlitePool) -> Result<Vec<CounterDiscrepancy>, sqlx::Error> {
    let mut found = Vec::new();

    for source in COUNTERS {
        let sql = format!(
            "SELECT r.id, r.{counter}, COALESCE(e.n, 0)
             FROM {table} r
             LEFT JOIN (
                 SELECT {fk} AS owner_id, COUNT(*) AS n
                 FROM {events}
                 WHERE {fk} IS NOT NULL
                 GROUP BY {fk}
             ) e ON e.owner_id = r.id
             WHERE r.{counter} != COALESCE(e.n, 0)
             ORDER BY r.id",
            counter = source.counter,
            table = source.table,
            fk = source.foreign_key,
            events = source.events,
        );

        let rows: Vec<(String, i64, i64)> = sqlx::query_as(&sql).fetch_all(pool).await?;
        found.extend(rows.into_iter().map(|(record_id, stored_count, actual_count)| {
            CounterDiscrepancy {
                table_name: source.table.to_owned(),
                counter: source.counter.to_owned(),
                record_id,
                stored_count,
                actual_count,
                discrepancy: stored_count - actual_count,
            }
        }));
    }

    if found.is_empty() {
        tracing::info!("Counter check: all counters consistent");
    } else {
        tracing::warn!("Counter check: {} inconsistent counter(s)", found.len());
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{self, testing},
        models::{NewClick, NewImpression},
    };

    #[tokio::test]
    async fn trigger_maintained_counters_are_consistent() {
        let pool = testing::pool().await;
        let provider = testing::provider(&pool, "p@example.com").await;
        let advertiser = testing::advertiser(&pool, "a@example.com").await;
        let link = testing::link(&pool, &provider.id, "Ab3xY9zK").await;
        let ad = testing::image_ad(&pool, &advertiser.id, "Banner").await;

        for _ in 0..3 {
            db::log_impression(
                &pool,
                &NewImpression {
                    advertisement_id: ad.id.clone(),
                    content_link_id: link.id.clone(),
                    user_agent: None,
                },
            )
            .await
            .unwrap();
        }
        db::log_click(
            &pool,
            &NewClick {
                content_link_id: link.id.clone(),
                advertisement_id: None,
                user_agent: None,
            },
        )
        .await
        .unwrap();

        assert!(check_counters(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn drifted_counters_are_reported() {
        let pool = testing::pool().await;
        let provider = testing::provider(&pool, "p@example.com").await;
        let advertiser = testing::advertiser(&pool, "a@example.com").await;
        let link = testing::link(&pool, &provider.id, "Ab3xY9zK").await;
        let ad = testing::image_ad(&pool, &advertiser.id, "Banner").await;

        db::log_impression(
            &pool,
            &NewImpression {
                advertisement_id: ad.id.clone(),
                content_link_id: link.id.clone(),
                user_agent: None,
            },
        )
        .await
        .unwrap();

        sqlx::query("UPDATE content_links SET view_count = 5 WHERE id = ?1")
            .bind(&link.id)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("UPDATE advertisements SET click_count = 2 WHERE id = ?1")
            .bind(&ad.id)
            .execute(&pool)
            .await
            .unwrap();

        let found = check_counters(&pool).await.unwrap();
        assert_eq!(
            found,
            vec![
                CounterDiscrepancy {
                    table_name: "content_links".into(),
                    counter: "view_count".into(),
                    record_id: link.id.clone(),
                    stored_count: 5,
                    actual_count: 1,
                    discrepancy: 4,
                },
                CounterDiscrepancy {
                    table_name: "advertisements".into(),
                    counter: "click_count".into(),
                    record_id: ad.id.clone(),
                    stored_count: 2,
                    actual_count: 0,
                    discrepancy: 2,
                },
            ]
        );
    }

    #[tokio::test]
    async fn missing_counter_increment_shows_negative_discrepancy() {
        let pool = testing::pool().await;
        let provider = testing::provider(&pool, "p@example.com").await;
        let link = testing::link(&pool, &provider.id, "Ab3xY9zK").await;

        db::log_click(
            &pool,
            &NewClick {
                content_link_id: link.id.clone(),
                advertisement_id: None,
                user_agent: None,
            },
        )
        .await
        .unwrap();
        sqlx::query("UPDATE content_links SET click_count = 0")
            .execute(&pool)
            .await
            .unwrap();

        let found = check_counters(&pool).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].counter, "click_count");
        assert_eq!(found[0].discrepancy, -1);
    }
}
