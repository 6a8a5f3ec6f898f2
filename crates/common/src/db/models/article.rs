//! Article metadata entity

use crate::article::ArticleRecord;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "metadata")]
pub struct Model {
    /// Allocated as max(id) + 1 under the allocation lock
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,

    pub url: Vec<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub journal: Option<String>,

    pub year: Option<i32>,

    pub volume: Option<i32>,

    pub issue: Option<i32>,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    pub authors: Vec<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub doi: Option<String>,

    /// Ids this article cites, kept sorted and distinct
    pub citations: Vec<i64>,

    /// Ids citing this article, kept sorted and distinct
    pub cited_by: Vec<i64>,

    /// Set once a full ingest of this article finished; false for stubs
    pub scraped: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::section::Entity")]
    Sections,
}

impl Related<super::section::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sections.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ArticleRecord {
    fn from(model: Model) -> Self {
        ArticleRecord {
            id: model.id,
            url: model.url,
            journal: model.journal,
            title: model.title,
            year: model.year,
            volume: model.volume,
            issue: model.issue,
            authors: model.authors,
            doi: model.doi,
            citations: model.citations.into_iter().collect(),
            cited_by: model.cited_by.into_iter().collect(),
            scraped: model.scraped,
        }
    }
}
