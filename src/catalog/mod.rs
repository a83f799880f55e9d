//! Catalog documents and the admin services that edit them.
//!
//! Store layout:
//!
//! ```text
//! topics/{topicId}                        { name }
//! topics/{topicId}/questions/{questionId} { text, options, correctOption }
//! articles/{articleId}                    { title, description, imageUrl, referenceLink, createdAt, updatedAt }
//! fcmTokens/{tokenId}                     { token, isActive }
//! ```

pub mod articles;
pub mod forms;
pub mod media;
pub mod questions;
pub mod topics;


use crate::storage::StorageError;
use crate::store::{StoreError, StoredDocument};
use forms::Violation;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const TOPICS: &str = "topics";
pub const QUESTIONS: &str = "questions";
pub const ARTICLES: &str = "articles";
pub const FCM_TOKENS: &str = "fcmTokens";

pub fn topic_path(topic_id: &str) -> String {
    format!("{}/{}", TOPICS, topic_id)
}

pub fn questions_path(topic_id: &str) -> String {
    format!("{}/{}/{}", TOPICS, topic_id, QUESTIONS)
}

pub fn question_path(topic_id: &str, question_id: &str) -> String {
    format!("{}/{}", questions_path(topic_id), question_id)
}

pub fn article_path(article_id: &str) -> String {
    format!("{}/{}", ARTICLES, article_id)
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid input: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Invalid(Vec<Violation>),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Image upload failed: {0}")]
    Storage(#[from] StorageError),
    #[error("Not found: {0}")]
    NotFound(String),
}

/// English text with its Hindi rendering.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bilingual {
    #[serde(default)]
    pub en: String,
    #[serde(default)]
    pub hi: String,
}

impl Bilingual {
    pub fn new(en: impl Into<String>, hi: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            hi: hi.into(),
        }
    }

    /// Trimmed copy where an empty `hi` falls back to `en`.
    pub fn normalized(&self) -> Self {
        let en = self.en.trim();
        let hi = self.hi.trim();
        Self::new(en, if hi.is_empty() { en } else { hi })
    }

    pub fn has_en(&self) -> bool {
        !self.en.trim().is_empty()
    }

    pub fn has_hi(&self) -> bool {
        !self.hi.trim().is_empty()
    }
}

/// Label of one of the four answer options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum OptionKey {
    #[default]
    A,
    B,
    C,
    D,
}

impl OptionKey {
    pub const ALL: [OptionKey; 4] = [OptionKey::A, OptionKey::B, OptionKey::C, OptionKey::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKey::A => "A",
            OptionKey::B => "B",
            OptionKey::C => "C",
            OptionKey::D => "D",
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(OptionKey::A),
            "B" => Ok(OptionKey::B),
            "C" => Ok(OptionKey::C),
            "D" => Ok(OptionKey::D),
            other => Err(format!("'{}' is not one of A, B, C, D", other)),
        }
    }
}

/// The four answer options, keyed `A`..`D` in the store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuestionOptions {
    #[serde(rename = "A")]
    pub a: Bilingual,
    #[serde(rename = "B")]
    pub b: Bilingual,
    #[serde(rename = "C")]
    pub c: Bilingual,
    #[serde(rename = "D")]
    pub d: Bilingual,
}

impl QuestionOptions {
    pub fn get(&self, key: OptionKey) -> &Bilingual {
        match key {
            OptionKey::A => &self.a,
            OptionKey::B => &self.b,
            OptionKey::C => &self.c,
            OptionKey::D => &self.d,
        }
    }

    pub fn get_mut(&mut self, key: OptionKey) -> &mut Bilingual {
        match key {
            OptionKey::A => &mut self.a,
            OptionKey::B => &mut self.b,
            OptionKey::C => &mut self.c,
            OptionKey::D => &mut self.d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopicRecord {
    pub name: Bilingual,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub text: Bilingual,
    pub options: QuestionOptions,
    pub correct_option: OptionKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    #[serde(default)]
    pub title: Bilingual,
    #[serde(default)]
    pub description: Bilingual,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub reference_link: Option<String>,
    /// Filled by the store at commit time; never written by the client.
    #[serde(default, skip_serializing)]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing)]
    pub updated_at: Option<String>,
}

/// A push channel registered by a device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub is_active: bool,
}

/// A decoded document together with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity<T> {
    pub id: String,
    pub data: T,
}

impl<T: DeserializeOwned> Entity<T> {
    pub fn from_document(doc: &StoredDocument) -> Result<Self, StoreError> {
        Ok(Self {
            id: doc.id.clone(),
            data: doc.data()?,
        })
    }
}

pub type Topic = Entity<TopicRecord>;
pub type Question = Entity<QuestionRecord>;
pub type Article = Entity<ArticleRecord>;
