//! Schema bootstrap for the `metadata` and `body` tables

use crate::errors::Result;
use sea_orm::ConnectionTrait;
use tracing::info;

const METADATA_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS metadata (
    id        BIGINT PRIMARY KEY,
    url       TEXT[] NOT NULL DEFAULT '{}',
    journal   TEXT,
    year      INT,
    volume    INT,
    issue     INT,
    title     TEXT NOT NULL,
    authors   TEXT[] NOT NULL DEFAULT '{}',
    doi       TEXT,
    citations BIGINT[] NOT NULL DEFAULT '{}',
    cited_by  BIGINT[] NOT NULL DEFAULT '{}',
    scraped   BOOLEAN NOT NULL DEFAULT FALSE
)
"#;

const METADATA_KEY_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS metadata_title_year_idx ON metadata (title, year)";

const BODY_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS body (
    row_id       BIGSERIAL PRIMARY KEY,
    meta_id      BIGINT NOT NULL REFERENCES metadata (id) ON DELETE CASCADE,
    section_name TEXT NOT NULL,
    prose        TEXT NOT NULL DEFAULT '',
    UNIQUE (meta_id, section_name)
)
"#;

/// Create both tables and the natural-key index if they do not exist
pub async fn create_tables<C: ConnectionTrait>(conn: &C) -> Result<()> {
    conn.execute_unprepared(METADATA_DDL).await?;
    conn.execute_unprepared(METADATA_KEY_INDEX).await?;
    conn.execute_unprepared(BODY_DDL).await?;

    info!("Schema ready");
    Ok(())
}
