//! Word catalog contracts and SQLite implementation.
//!
//! # Responsibility
//! - Read-only lookup of books, sections and words for the scheduler.
//! - Idempotent upserts used by the content import path.
//!
//! # Invariants
//! - Section listings are ordered by `word_index ASC, word_id ASC`.
//! - Scheduler code only uses the [`WordCatalog`] trait; the upsert
//!   helpers are for seeding/import.

use crate::model::word::{Section, SectionWord, Word, WordBook};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const WORD_SELECT_SQL: &str = "SELECT
    word_id,
    lemma,
    part_of_speech,
    definition,
    translation,
    phonetic,
    audio_url
FROM words";

const BOOK_SELECT_SQL: &str = "SELECT
    book_id,
    name,
    tag,
    description,
    cover,
    parent_book_id
FROM word_books";

/// Read-only content lookups.
pub trait WordCatalog {
    fn get_word(&self, word_id: &str) -> RepoResult<Option<Word>>;
    fn get_book(&self, book_id: &str) -> RepoResult<Option<WordBook>>;
    /// Lists child books of `parent`, or top-level books when `None`.
    fn list_books(&self, parent: Option<&str>) -> RepoResult<Vec<WordBook>>;
    fn get_section(&self, section_id: &str) -> RepoResult<Option<Section>>;
    fn list_sections(&self, book_id: &str) -> RepoResult<Vec<Section>>;
    /// Words of one section in author-defined order.
    fn list_section_words(&self, section_id: &str) -> RepoResult<Vec<SectionWord>>;
    fn is_placed(&self, section_id: &str, word_id: &str) -> RepoResult<bool>;
}

/// SQLite-backed word catalog.
pub struct SqliteWordCatalog<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteWordCatalog<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Inserts or replaces one book.
    pub fn upsert_book(&self, book: &WordBook) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO word_books (book_id, name, tag, description, cover, parent_book_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(book_id) DO UPDATE SET
                name = excluded.name,
                tag = excluded.tag,
                description = excluded.description,
                cover = excluded.cover,
                parent_book_id = excluded.parent_book_id;",
            params![
                book.book_id,
                book.name,
                book.tag,
                book.description,
                book.cover,
                book.parent_book_id,
            ],
        )?;
        Ok(())
    }

    /// Inserts or replaces one section. The owning book must exist.
    pub fn upsert_section(&self, section: &Section) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO sections (section_id, book_id, name, position)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(section_id) DO UPDATE SET
                book_id = excluded.book_id,
                name = excluded.name,
                position = excluded.position;",
            params![
                section.section_id,
                section.book_id,
                section.name,
                section.position
            ],
        )?;
        Ok(())
    }

    /// Inserts or replaces one word's content.
    pub fn upsert_word(&self, word: &Word) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO words (
                word_id, lemma, part_of_speech, definition, translation, phonetic, audio_url
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(word_id) DO UPDATE SET
                lemma = excluded.lemma,
                part_of_speech = excluded.part_of_speech,
                definition = excluded.definition,
                translation = excluded.translation,
                phonetic = excluded.phonetic,
                audio_url = excluded.audio_url;",
            params![
                word.word_id,
                word.lemma,
                word.part_of_speech,
                word.definition,
                word.translation,
                word.phonetic,
                word.audio_url,
            ],
        )?;
        Ok(())
    }

    /// Places a word in a section at `word_index`, moving it if present.
    pub fn place_word(&self, section_id: &str, word_id: &str, word_index: i64) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO section_words (section_id, word_id, word_index)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(section_id, word_id) DO UPDATE SET word_index = excluded.word_index;",
            params![section_id, word_id, word_index],
        )?;
        Ok(())
    }
}

impl WordCatalog for SqliteWordCatalog<'_> {
    fn get_word(&self, word_id: &str) -> RepoResult<Option<Word>> {
        let word = self
            .conn
            .query_row(
                &format!("{WORD_SELECT_SQL} WHERE word_id = ?1;"),
                [word_id],
                map_word_row,
            )
            .optional()?;
        Ok(word)
    }

    fn get_book(&self, book_id: &str) -> RepoResult<Option<WordBook>> {
        let book = self
            .conn
            .query_row(
                &format!("{BOOK_SELECT_SQL} WHERE book_id = ?1;"),
                [book_id],
                map_book_row,
            )
            .optional()?;
        Ok(book)
    }

    fn list_books(&self, parent: Option<&str>) -> RepoResult<Vec<WordBook>> {
        let mut stmt = self.conn.prepare(&format!(
            "{BOOK_SELECT_SQL}
             WHERE (?1 IS NULL AND parent_book_id IS NULL) OR parent_book_id = ?1
             ORDER BY name ASC, book_id ASC;"
        ))?;
        let books = stmt
            .query_map([parent], map_book_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(books)
    }

    fn get_section(&self, section_id: &str) -> RepoResult<Option<Section>> {
        let section = self
            .conn
            .query_row(
                "SELECT section_id, book_id, name, position
                 FROM sections
                 WHERE section_id = ?1;",
                [section_id],
                map_section_row,
            )
            .optional()?;
        Ok(section)
    }

    fn list_sections(&self, book_id: &str) -> RepoResult<Vec<Section>> {
        let mut stmt = self.conn.prepare(
            "SELECT section_id, book_id, name, position
             FROM sections
             WHERE book_id = ?1
             ORDER BY position ASC, section_id ASC;",
        )?;
        let sections = stmt
            .query_map([book_id], map_section_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sections)
    }

    fn list_section_words(&self, section_id: &str) -> RepoResult<Vec<SectionWord>> {
        let mut stmt = self.conn.prepare(
            "SELECT section_id, word_id, word_index
             FROM section_words
             WHERE section_id = ?1
             ORDER BY word_index ASC, word_id ASC;",
        )?;
        let mut rows = stmt.query([section_id])?;
        let mut placed = Vec::new();
        while let Some(row) = rows.next()? {
            placed.push(SectionWord {
                section_id: row.get("section_id")?,
                word_id: row.get("word_id")?,
                word_index: row.get("word_index")?,
            });
        }
        Ok(placed)
    }

    fn is_placed(&self, section_id: &str, word_id: &str) -> RepoResult<bool> {
        let placed: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM section_words WHERE section_id = ?1 AND word_id = ?2
             );",
            params![section_id, word_id],
            |row| row.get(0),
        )?;
        Ok(placed == 1)
    }
}

/// Fails with `NotFound` unless the section exists.
pub(crate) fn require_section<C: WordCatalog>(catalog: &C, section_id: &str) -> RepoResult<Section> {
    catalog
        .get_section(section_id)?
        .ok_or_else(|| RepoError::not_found("section", section_id))
}

pub(crate) fn map_word_row(row: &Row<'_>) -> rusqlite::Result<Word> {
    Ok(Word {
        word_id: row.get("word_id")?,
        lemma: row.get("lemma")?,
        part_of_speech: row.get("part_of_speech")?,
        definition: row.get("definition")?,
        translation: row.get("translation")?,
        phonetic: row.get("phonetic")?,
        audio_url: row.get("audio_url")?,
    })
}

fn map_book_row(row: &Row<'_>) -> rusqlite::Result<WordBook> {
    Ok(WordBook {
        book_id: row.get("book_id")?,
        name: row.get("name")?,
        tag: row.get("tag")?,
        description: row.get("description")?,
        cover: row.get("cover")?,
        parent_book_id: row.get("parent_book_id")?,
    })
}

fn map_section_row(row: &Row<'_>) -> rusqlite::Result<Section> {
    Ok(Section {
        section_id: row.get("section_id")?,
        book_id: row.get("book_id")?,
        name: row.get("name")?,
        position: row.get("position")?,
    })
}
