//! SeaORM entity models
//!
//! Database entities for the article metadata and section text tables

mod article;
mod section;

pub use article::{
    Entity as ArticleEntity,
    Model as Article,
    ActiveModel as ArticleActiveModel,
    Column as ArticleColumn,
};

pub use section::{
    Entity as SectionEntity,
    Column as SectionColumn,
};
