//! Content seeding and catalog reads.
//!
//! Upserts are idempotent: importing the same content twice leaves one
//! copy. Authoring content is out of scope; this is the import landing
//! point only.

use crate::model::word::{IdKind, Section, SectionWord, Word, WordBook};
use crate::repo::catalog_repo::{require_section, SqliteWordCatalog, WordCatalog};
use crate::service::error::{LearningError, LearningResult, ValidationError};
use crate::service::validate_ids;
use log::info;
use rusqlite::{Connection, TransactionBehavior};

/// One section with its words in author order, as delivered by an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionImport {
    pub section: Section,
    pub words: Vec<Word>,
}

pub struct CatalogService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> CatalogService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    pub fn upsert_book(&mut self, book: &WordBook) -> LearningResult<()> {
        validate_ids(&[(IdKind::Book, &book.book_id)])?;
        if let Some(parent) = book.parent_book_id.as_deref() {
            validate_ids(&[(IdKind::Book, parent)])?;
        }
        let catalog = SqliteWordCatalog::new(&*self.conn);
        if let Some(parent) = book.parent_book_id.as_deref() {
            if parent == book.book_id {
                return Err(ValidationError::SelfParentBook(parent.to_string()).into());
            }
            if catalog.get_book(parent)?.is_none() {
                return Err(LearningError::not_found("book", parent));
            }
        }
        catalog.upsert_book(book)?;
        Ok(())
    }

    pub fn upsert_section(&mut self, section: &Section) -> LearningResult<()> {
        validate_ids(&[
            (IdKind::Section, &section.section_id),
            (IdKind::Book, &section.book_id),
        ])?;
        let catalog = SqliteWordCatalog::new(&*self.conn);
        if catalog.get_book(&section.book_id)?.is_none() {
            return Err(LearningError::not_found("book", section.book_id.as_str()));
        }
        catalog.upsert_section(section)?;
        Ok(())
    }

    pub fn upsert_word(&mut self, word: &Word) -> LearningResult<()> {
        validate_ids(&[(IdKind::Word, &word.word_id)])?;
        SqliteWordCatalog::new(&*self.conn).upsert_word(word)?;
        Ok(())
    }

    /// Places an existing word at `word_index` inside a section.
    pub fn place_word(
        &mut self,
        section_id: &str,
        word_id: &str,
        word_index: i64,
    ) -> LearningResult<()> {
        validate_ids(&[(IdKind::Section, section_id), (IdKind::Word, word_id)])?;
        let catalog = SqliteWordCatalog::new(&*self.conn);
        require_section(&catalog, section_id)?;
        if catalog.get_word(word_id)?.is_none() {
            return Err(LearningError::not_found("word", word_id));
        }
        catalog.place_word(section_id, word_id, word_index)?;
        Ok(())
    }

    /// Upserts a section and all its words in one transaction.
    ///
    /// Words are placed at indexes `0..n` in the given order.
    pub fn import_section(&mut self, import: &SectionImport) -> LearningResult<()> {
        validate_ids(&[
            (IdKind::Section, &import.section.section_id),
            (IdKind::Book, &import.section.book_id),
        ])?;
        for word in &import.words {
            validate_ids(&[(IdKind::Word, &word.word_id)])?;
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let catalog = SqliteWordCatalog::new(&tx);
        if catalog.get_book(&import.section.book_id)?.is_none() {
            return Err(LearningError::not_found(
                "book",
                import.section.book_id.as_str(),
            ));
        }
        catalog.upsert_section(&import.section)?;
        for (index, word) in import.words.iter().enumerate() {
            catalog.upsert_word(word)?;
            catalog.place_word(&import.section.section_id, &word.word_id, index as i64)?;
        }
        tx.commit()?;

        info!(
            "event=section_import module=catalog status=ok section_id={} words={}",
            import.section.section_id,
            import.words.len()
        );
        Ok(())
    }

    pub fn get_word(&self, word_id: &str) -> LearningResult<Word> {
        validate_ids(&[(IdKind::Word, word_id)])?;
        SqliteWordCatalog::new(&*self.conn)
            .get_word(word_id)?
            .ok_or_else(|| LearningError::not_found("word", word_id))
    }

    /// Child books of `parent`, or top-level books when `None`.
    pub fn list_books(&self, parent: Option<&str>) -> LearningResult<Vec<WordBook>> {
        if let Some(parent) = parent {
            validate_ids(&[(IdKind::Book, parent)])?;
        }
        Ok(SqliteWordCatalog::new(&*self.conn).list_books(parent)?)
    }

    pub fn list_sections(&self, book_id: &str) -> LearningResult<Vec<Section>> {
        validate_ids(&[(IdKind::Book, book_id)])?;
        Ok(SqliteWordCatalog::new(&*self.conn).list_sections(book_id)?)
    }

    pub fn list_section_words(&self, section_id: &str) -> LearningResult<Vec<SectionWord>> {
        validate_ids(&[(IdKind::Section, section_id)])?;
        let catalog = SqliteWordCatalog::new(&*self.conn);
        require_section(&catalog, section_id)?;
        Ok(catalog.list_section_words(section_id)?)
    }
}
