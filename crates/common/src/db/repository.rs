//! PostgreSQL article store
//!
//! Entity queries go through SeaORM; the array set-unions and the allocation
//! lock use raw SQL because SeaORM has no builder for them.

use crate::article::{ArticleId, ArticleMetadata, ArticleRecord, SectionText};
use crate::db::models::*;
use crate::db::{create_tables, ArticleStore, DbPool};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr, Statement, TransactionTrait,
};
use std::collections::BTreeSet;
use tracing::debug;

/// Advisory lock serializing id allocation across crawl processes
const ALLOCATION_LOCK_KEY: i64 = 0x6369_7465_666f_7267;

/// Article store backed by PostgreSQL
pub struct PgArticleStore {
    pool: DbPool,
}

impl PgArticleStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    /// Create the tables this store reads and writes
    pub async fn create_tables(&self) -> Result<()> {
        create_tables(self.conn()).await
    }

    async fn exec_on_article(&self, id: ArticleId, sql: &str, values: Vec<sea_orm::Value>) -> Result<()> {
        let result = self
            .conn()
            .execute(Statement::from_sql_and_values(DbBackend::Postgres, sql, values))
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ArticleNotFound { id });
        }
        Ok(())
    }
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn max_id(&self) -> Result<Option<ArticleId>> {
        let row = self
            .conn()
            .query_one(Statement::from_string(
                DbBackend::Postgres,
                "SELECT MAX(id) AS max_id FROM metadata",
            ))
            .await?;

        match row {
            Some(row) => Ok(row.try_get::<Option<i64>>("", "max_id")?),
            None => Ok(None),
        }
    }

    async fn insert_next(&self, meta: &ArticleMetadata) -> Result<ArticleId> {
        let txn = self.conn().begin().await?;

        // Held until commit, so the MAX below sees every earlier allocation
        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT pg_advisory_xact_lock($1)",
            vec![ALLOCATION_LOCK_KEY.into()],
        ))
        .await?;

        let row = txn
            .query_one(Statement::from_string(
                DbBackend::Postgres,
                "SELECT COALESCE(MAX(id) + 1, 0) AS next_id FROM metadata",
            ))
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "id allocation query returned no row".to_string(),
            })?;
        let id: i64 = row.try_get("", "next_id")?;

        let article = ArticleActiveModel {
            id: Set(id),
            url: Set(meta.url.clone()),
            journal: Set(meta.journal.clone()),
            year: Set(meta.year),
            volume: Set(meta.volume),
            issue: Set(meta.issue),
            title: Set(meta.title.clone()),
            authors: Set(meta.authors.clone()),
            doi: Set(meta.doi.clone()),
            citations: Set(Vec::new()),
            cited_by: Set(Vec::new()),
            scraped: Set(false),
        };
        article.insert(&txn).await?;

        txn.commit().await?;

        debug!(article_id = id, title = %meta.title, "Inserted metadata row");
        Ok(id)
    }

    async fn find_by_key(&self, title: &str, year: Option<i32>) -> Result<Option<ArticleRecord>> {
        let year_filter = match year {
            Some(year) => ArticleColumn::Year.eq(year),
            None => ArticleColumn::Year.is_null(),
        };

        let found = ArticleEntity::find()
            .filter(ArticleColumn::Title.eq(title))
            .filter(year_filter)
            .order_by_asc(ArticleColumn::Id)
            .one(self.conn())
            .await?;

        Ok(found.map(Into::into))
    }

    async fn get(&self, id: ArticleId) -> Result<Option<ArticleRecord>> {
        let found = ArticleEntity::find_by_id(id).one(self.conn()).await?;
        Ok(found.map(Into::into))
    }

    async fn update_metadata(&self, id: ArticleId, meta: &ArticleMetadata) -> Result<()> {
        let result = ArticleEntity::update_many()
            .col_expr(ArticleColumn::Url, Expr::value(meta.url.clone()))
            .col_expr(ArticleColumn::Journal, Expr::value(meta.journal.clone()))
            .col_expr(ArticleColumn::Year, Expr::value(meta.year))
            .col_expr(ArticleColumn::Volume, Expr::value(meta.volume))
            .col_expr(ArticleColumn::Issue, Expr::value(meta.issue))
            .col_expr(ArticleColumn::Title, Expr::value(meta.title.clone()))
            .col_expr(ArticleColumn::Authors, Expr::value(meta.authors.clone()))
            .col_expr(ArticleColumn::Doi, Expr::value(meta.doi.clone()))
            .filter(ArticleColumn::Id.eq(id))
            .exec(self.conn())
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::ArticleNotFound { id });
        }
        Ok(())
    }

    async fn add_cited_by(&self, id: ArticleId, citing: ArticleId) -> Result<()> {
        self.exec_on_article(
            id,
            r#"
            UPDATE metadata
            SET cited_by = ARRAY(
                SELECT DISTINCT e FROM unnest(array_append(cited_by, $1::bigint)) AS e ORDER BY e
            )
            WHERE id = $2
            "#,
            vec![citing.into(), id.into()],
        )
        .await
    }

    async fn add_citations(&self, id: ArticleId, cited: &BTreeSet<ArticleId>) -> Result<()> {
        let cited: Vec<i64> = cited.iter().copied().collect();

        self.exec_on_article(
            id,
            r#"
            UPDATE metadata
            SET citations = ARRAY(
                SELECT DISTINCT e FROM unnest(citations || $1::bigint[]) AS e ORDER BY e
            )
            WHERE id = $2
            "#,
            vec![cited.into(), id.into()],
        )
        .await
    }

    async fn mark_scraped(&self, id: ArticleId) -> Result<()> {
        let result = ArticleEntity::update_many()
            .col_expr(ArticleColumn::Scraped, Expr::value(true))
            .filter(ArticleColumn::Id.eq(id))
            .exec(self.conn())
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::ArticleNotFound { id });
        }
        Ok(())
    }

    async fn insert_sections(&self, id: ArticleId, sections: &[SectionText]) -> Result<usize> {
        let txn = self.conn().begin().await?;
        let mut inserted = 0;

        for section in sections.iter().filter(|s| !s.is_empty()) {
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                INSERT INTO body (meta_id, section_name, prose)
                VALUES ($1, $2, $3)
                ON CONFLICT (meta_id, section_name) DO NOTHING
                "#,
                vec![
                    id.into(),
                    section.section_name.clone().into(),
                    section.prose.clone().into(),
                ],
            );

            let result = txn.execute(stmt).await.map_err(|e| match e.sql_err() {
                Some(SqlErr::ForeignKeyConstraintViolation(_)) => AppError::ArticleNotFound { id },
                _ => AppError::from(e),
            })?;
            inserted += result.rows_affected() as usize;
        }

        txn.commit().await?;
        Ok(inserted)
    }

    async fn sections(&self, id: ArticleId) -> Result<Vec<SectionText>> {
        let rows = SectionEntity::find()
            .filter(SectionColumn::MetaId.eq(id))
            .order_by_asc(SectionColumn::RowId)
            .all(self.conn())
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| SectionText::new(row.section_name, row.prose))
            .collect())
    }

    async fn prune_empty_sections(&self) -> Result<u64> {
        let result = self
            .conn()
            .execute(Statement::from_string(
                DbBackend::Postgres,
                r"DELETE FROM body WHERE prose ~ '^\s*$'",
            ))
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_articles(&self) -> Result<Vec<ArticleRecord>> {
        let rows = ArticleEntity::find()
            .order_by_asc(ArticleColumn::Id)
            .all(self.conn())
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn article_count(&self) -> Result<u64> {
        Ok(ArticleEntity::find().count(self.conn()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use std::collections::BTreeMap;

    fn stored(id: i64, title: &str, year: Option<i32>) -> Article {
        Article {
            id,
            url: vec![],
            journal: Some("Biophys J".into()),
            year,
            volume: None,
            issue: None,
            title: title.into(),
            authors: vec!["Rall W".into()],
            doi: None,
            citations: vec![],
            cited_by: vec![0],
            scraped: false,
        }
    }

    fn store(db: MockDatabase) -> PgArticleStore {
        PgArticleStore::new(DbPool::from_connection(db.into_connection()))
    }

    #[tokio::test]
    async fn test_find_by_key_maps_row() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored(1, "Cable theory", Some(1975))]]);

        let found = store(db).find_by_key("Cable theory", Some(1975)).await.unwrap().unwrap();
        assert_eq!(found.id, 1);
        assert_eq!(found.cited_by, BTreeSet::from([0]));
        assert!(!found.scraped);
    }

    #[tokio::test]
    async fn test_insert_next_uses_allocated_id() {
        let next_id = BTreeMap::from([("next_id", Value::BigInt(Some(3)))]);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![next_id]])
            .append_query_results([vec![stored(3, "Cable theory", Some(1975))]]);

        let id = store(db)
            .insert_next(&ArticleMetadata::new("Cable theory", Some(1975)))
            .await
            .unwrap();
        assert_eq!(id, 3);
    }

    #[tokio::test]
    async fn test_union_on_missing_article_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 0,
        }]);

        let err = store(db).add_cited_by(42, 0).await.unwrap_err();
        assert!(matches!(err, AppError::ArticleNotFound { id: 42 }));
    }
}
