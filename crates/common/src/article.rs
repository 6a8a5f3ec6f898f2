//! Article domain types
//!
//! `ArticleMetadata` is an article that has not been persisted yet and so has
//! no id. `ArticleRecord` is the stored form, carrying its id and both sides
//! of the citation adjacency. Unknown scalar fields are `None` throughout.
//!
//! A record with `scraped == false` is a stub: it exists only because some
//! other article cited it, or because its own ingest has not finished.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use validator::{Validate, ValidationError};

/// Stable article identifier, allocated as `max(id) + 1`
pub type ArticleId = i64;

/// Article metadata as scraped, before an id is assigned
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ArticleMetadata {
    /// Known URLs for the article, in discovery order
    #[serde(default)]
    pub url: Vec<String>,

    #[serde(default)]
    pub journal: Option<String>,

    #[validate(custom(function = "not_blank"))]
    pub title: String,

    #[serde(default)]
    pub year: Option<i32>,

    #[serde(default)]
    pub volume: Option<i32>,

    #[serde(default)]
    pub issue: Option<i32>,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default)]
    pub doi: Option<String>,
}

impl ArticleMetadata {
    /// Metadata with only the natural key set
    pub fn new(title: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            title: title.into(),
            year,
            ..Default::default()
        }
    }

    /// Build stub metadata from a scraped reference
    pub fn from_reference(reference: &RawReference) -> Self {
        Self {
            url: reference.url.clone(),
            journal: reference.journal.clone(),
            title: reference.title.clone(),
            year: reference.year,
            volume: reference.volume,
            issue: None,
            authors: reference.authors.clone(),
            doi: None,
        }
    }

    /// Fill every unknown field from `other` and append URLs not yet known.
    ///
    /// Known fields are never overwritten. Returns whether anything changed.
    pub fn fill_unknown_from(&mut self, other: &ArticleMetadata) -> bool {
        let mut changed = false;

        for url in &other.url {
            if !self.url.contains(url) {
                self.url.push(url.clone());
                changed = true;
            }
        }

        changed |= fill(&mut self.journal, &other.journal);
        changed |= fill(&mut self.year, &other.year);
        changed |= fill(&mut self.volume, &other.volume);
        changed |= fill(&mut self.issue, &other.issue);
        changed |= fill(&mut self.doi, &other.doi);

        if self.authors.is_empty() && !other.authors.is_empty() {
            self.authors = other.authors.clone();
            changed = true;
        }

        changed
    }
}

/// Titles that are empty after trimming can never be matched by lookup
fn not_blank(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message(Cow::Borrowed("title must not be blank")));
    }
    Ok(())
}

fn fill<T: Clone>(slot: &mut Option<T>, from: &Option<T>) -> bool {
    if slot.is_none() && from.is_some() {
        *slot = from.clone();
        true
    } else {
        false
    }
}

/// Persisted article with its citation adjacency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: ArticleId,
    pub url: Vec<String>,
    pub journal: Option<String>,
    pub title: String,
    pub year: Option<i32>,
    pub volume: Option<i32>,
    pub issue: Option<i32>,
    pub authors: Vec<String>,
    pub doi: Option<String>,

    /// Articles this article cites
    pub citations: BTreeSet<ArticleId>,

    /// Articles citing this article
    pub cited_by: BTreeSet<ArticleId>,

    /// True once the article itself was ingested; false for stubs
    pub scraped: bool,
}

impl ArticleRecord {
    /// A freshly inserted record: metadata plus empty adjacency
    pub fn from_metadata(id: ArticleId, meta: ArticleMetadata) -> Self {
        Self {
            id,
            url: meta.url,
            journal: meta.journal,
            title: meta.title,
            year: meta.year,
            volume: meta.volume,
            issue: meta.issue,
            authors: meta.authors,
            doi: meta.doi,
            citations: BTreeSet::new(),
            cited_by: BTreeSet::new(),
            scraped: false,
        }
    }

    /// Metadata view of this record, without id or adjacency
    pub fn metadata(&self) -> ArticleMetadata {
        ArticleMetadata {
            url: self.url.clone(),
            journal: self.journal.clone(),
            title: self.title.clone(),
            year: self.year,
            volume: self.volume,
            issue: self.issue,
            authors: self.authors.clone(),
            doi: self.doi.clone(),
        }
    }

    /// Whether (title, year) matches this record exactly
    pub fn has_key(&self, title: &str, year: Option<i32>) -> bool {
        self.title == title && self.year == year
    }
}

/// One section of an article's full text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionText {
    /// Heading, e.g. "ABSTRACT", "INTRODUCTION", or a scraped heading
    pub section_name: String,
    #[serde(default)]
    pub prose: String,
}

impl SectionText {
    pub fn new(section_name: impl Into<String>, prose: impl Into<String>) -> Self {
        Self {
            section_name: section_name.into(),
            prose: prose.into(),
        }
    }

    /// Whitespace-only prose counts as empty
    pub fn is_empty(&self) -> bool {
        self.prose.trim().is_empty()
    }
}

/// A reference-list entry as produced by a scraper
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReference {
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default)]
    pub volume: Option<i32>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub url: Vec<String>,
}

impl RawReference {
    pub fn new(title: impl Into<String>, year: Option<i32>) -> Self {
        Self {
            title: title.into(),
            year,
            ..Default::default()
        }
    }
}

/// Everything a scraper extracts from one article page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ScrapedArticle {
    #[serde(flatten)]
    #[validate(nested)]
    pub metadata: ArticleMetadata,

    #[serde(default)]
    pub sections: Vec<SectionText>,

    #[serde(default)]
    pub references: Vec<RawReference>,
}

impl ScrapedArticle {
    pub fn new(metadata: ArticleMetadata) -> Self {
        Self {
            metadata,
            sections: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Sections worth persisting, in scrape order
    pub fn non_empty_sections(&self) -> impl Iterator<Item = &SectionText> {
        self.sections.iter().filter(|s| !s.is_empty())
    }
}
