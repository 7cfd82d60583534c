//! Category associations for content links and advertisements.
//!
//! Every association set is written with set-replacement semantics: after a
//! save, the stored set equals the submitted set exactly, whatever was there
//! before. The delete and the inserts run in one transaction, so a failure
//! part-way through leaves the previous set intact instead of an empty one.

use std::collections::BTreeSet;

use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::models::Category;

/// One of the three many-to-many join tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Association {
    /// Content link ↔ category "tags".
    LinkTags,
    /// Content link ↔ category brand-safety exclusions.
    LinkBlocked,
    /// Advertisement ↔ category.
    AdCategories,
}

impl Association {
    fn table(self) -> &'static str {
        match self {
            Association::LinkTags => "content_link_categories",
            Association::LinkBlocked => "content_link_blocked_categories",
            Association::AdCategories => "advertisement_categories",
        }
    }

    fn owner_column(self) -> &'static str {
        match self {
            Association::LinkTags | Association::LinkBlocked => "content_link_id",
            Association::AdCategories => "advertisement_id",
        }
    }
}

/// Every category, alphabetically.
pub async fn list_categories(pool: &SqlitePool) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as("SELECT id, name, slug FROM categories ORDER BY name")
        .fetch_all(pool)
        .await
}

/// Category ids currently associated with `owner_id`, sorted.
pub async fn category_ids(
    pool: &SqlitePool,
    association: Association,
    owner_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(&format!(
        "SELECT category_id FROM {} WHERE {} = ?1 ORDER BY category_id",
        association.table(),
        association.owner_column()
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

/// Replace the association set of `owner_id` with `category_ids`.
///
/// Duplicates and ordering in the input are ignored. An unknown category or
/// owner id fails the foreign-key check and rolls the whole save back.
pub async fn replace(
    pool: &SqlitePool,
    association: Association,
    owner_id: &str,
    category_ids: &[String],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    let count = write_set(&mut *tx, association, owner_id, category_ids).await?;
    tx.commit().await?;

    tracing::debug!(
        association = ?association,
        owner_id,
        count,
        "Category associations replaced"
    );
    Ok(())
}

/// Delete-then-insert on a connection the caller already holds, usually a
/// transaction that also writes the owner row. Returns the stored set size.
pub async fn write_set(
    conn: &mut SqliteConnection,
    association: Association,
    owner_id: &str,
    category_ids: &[String],
) -> Result<usize, sqlx::Error> {
    let wanted: BTreeSet<&str> = category_ids.iter().map(String::as_str).collect();
    let table = association.table();
    let owner = association.owner_column();

    sqlx::query(&format!("DELETE FROM {table} WHERE {owner} = ?1"))
        .bind(owner_id)
        .execute(&mut *conn)
        .await?;

    let insert = format!("INSERT INTO {table} (id, {owner}, category_id) VALUES (?1, ?2, ?3)");
    for category_id in &wanted {
        sqlx::query(&insert)
            .bind(Uuid::new_v4().to_string())
            .bind(owner_id)
            .bind(*category_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(wanted.len())
}

/// Replace a content link's tag set.
pub async fn set_tags(
    pool: &SqlitePool,
    content_link_id: &str,
    category_ids: &[String],
) -> Result<(), sqlx::Error> {
    replace(pool, Association::LinkTags, content_link_id, category_ids).await
}

/// Replace a content link's blocked (brand-safety) set.
pub async fn set_blocked(
    pool: &SqlitePool,
    content_link_id: &str,
    category_ids: &[String],
) -> Result<(), sqlx::Error> {
    replace(pool, Association::LinkBlocked, content_link_id, category_ids).await
}

/// Replace an advertisement's category set.
pub async fn set_ad_categories(
    pool: &SqlitePool,
    advertisement_id: &str,
    category_ids: &[String],
) -> Result<(), sqlx::Error> {
    replace(pool, Association::AdCategories, advertisement_id, category_ids).await
}
