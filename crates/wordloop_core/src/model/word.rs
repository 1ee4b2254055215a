//! Word content, book structure and identifier rules.
//!
//! # Responsibility
//! - Describe immutable catalog content owned by the import path.
//! - Validate external identifiers before they reach storage.
//!
//! # Invariants
//! - Identifiers are 1..=128 chars of `[A-Za-z0-9_.:-]`, starting with an
//!   alphanumeric character.
//! - `word_index` defines the stable, author-defined order inside a section.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:-]{0,127}$").expect("valid id regex"));

pub type UserId = String;
pub type WordId = String;
pub type SectionId = String;
pub type BookId = String;

/// Which identifier a validation failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    User,
    Word,
    Section,
    Book,
    IdempotencyKey,
    StudySession,
}

impl IdKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user_id",
            Self::Word => "word_id",
            Self::Section => "section_id",
            Self::Book => "book_id",
            Self::IdempotencyKey => "idempotency_key",
            Self::StudySession => "session_id",
        }
    }
}

/// Identifier rejected by [`validate_id`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdValidationError {
    pub kind: IdKind,
    pub value: String,
}

impl Display for IdValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {}: `{}`", self.kind.as_str(), self.value)
    }
}

impl Error for IdValidationError {}

/// Checks one external identifier against the shared id grammar.
pub fn validate_id(kind: IdKind, value: &str) -> Result<(), IdValidationError> {
    if ID_RE.is_match(value) {
        Ok(())
    } else {
        Err(IdValidationError {
            kind,
            value: value.to_string(),
        })
    }
}

/// One vocabulary entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub word_id: WordId,
    /// Headword as shown to the learner.
    pub lemma: String,
    pub part_of_speech: Option<String>,
    pub definition: Option<String>,
    pub translation: Option<String>,
    pub phonetic: Option<String>,
    /// Reference to pronunciation audio; never fetched by the core.
    pub audio_url: Option<String>,
}

impl Word {
    /// Creates a word with only its headword set.
    pub fn new(word_id: impl Into<WordId>, lemma: impl Into<String>) -> Self {
        Self {
            word_id: word_id.into(),
            lemma: lemma.into(),
            part_of_speech: None,
            definition: None,
            translation: None,
            phonetic: None,
            audio_url: None,
        }
    }
}

/// Named collection of sections. Books may nest through `parent_book_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordBook {
    pub book_id: BookId,
    pub name: String,
    pub tag: Option<String>,
    pub description: Option<String>,
    pub cover: Option<String>,
    pub parent_book_id: Option<BookId>,
}

impl WordBook {
    pub fn new(book_id: impl Into<BookId>, name: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            name: name.into(),
            tag: None,
            description: None,
            cover: None,
            parent_book_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub section_id: SectionId,
    pub book_id: BookId,
    pub name: String,
    /// Order of the section inside its book.
    pub position: i64,
}

/// Placement of one word inside a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionWord {
    pub section_id: SectionId,
    pub word_id: WordId,
    pub word_index: i64,
}

#[cfg(test)]
mod tests {
    use super::{validate_id, IdKind};

    #[test]
    fn accepts_uuid_and_slug_ids() {
        validate_id(IdKind::Word, "5f0c7d2e-1b7a-4a4e-9d51-0d7f9ab3c2e1").unwrap();
        validate_id(IdKind::Section, "dele_a1:unit-03").unwrap();
        validate_id(IdKind::User, "13800138000").unwrap();
    }

    #[test]
    fn rejects_blank_padded_and_oversized_ids() {
        assert!(validate_id(IdKind::User, "").is_err());
        assert!(validate_id(IdKind::User, " u1").is_err());
        assert!(validate_id(IdKind::Word, "-leading-dash").is_err());
        assert!(validate_id(IdKind::Word, "has space").is_err());
        let long = "a".repeat(129);
        let err = validate_id(IdKind::IdempotencyKey, &long).unwrap_err();
        assert_eq!(err.kind, IdKind::IdempotencyKey);
    }
}
