//! Study repository contract and its SQLite implementation.
//!
//! # Responsibility
//! - get / get_all / put / delete primitives for languages, units and items.
//! - Store exercise associations as weak links that may dangle.
//!
//! # Invariants
//! - Listings are returned in creation order (`seq ASC`).
//! - `put_*` is insert-or-update by id and keeps the first creation order.
//! - `insert_*` never overwrites: an existing id yields `DuplicateKey`.
//! - Deleting a language or unit cascades to its children through SQLite
//!   foreign keys. Links pointing at a deleted item are left in place.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::item::{Associations, Item, ItemBody};
use crate::model::kind::{EntityKind, ItemKind};
use crate::model::language::Language;
use crate::model::unit::Unit;
use crate::model::validation::ModelValidationError;
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const DATE_FORMAT: &str = "%Y-%m-%d";

const LANGUAGE_SELECT_SQL: &str = "SELECT
    id,
    name,
    native_name,
    level,
    description,
    flag,
    score,
    last_practiced,
    current_unit
FROM languages";

const UNIT_SELECT_SQL: &str = "SELECT
    id,
    language_id,
    title,
    description,
    level,
    score,
    last_practiced
FROM units";

const ITEM_SELECT_SQL: &str = "SELECT
    id,
    unit_id,
    kind,
    headline,
    body,
    exercise_type,
    score,
    last_practiced
FROM items";

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors raised by study repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Record failed model validation before the write.
    Validation(ModelValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Strict insert hit an existing id. Callers retry with a fresh id.
    DuplicateKey { kind: EntityKind, id: String },
    /// Persisted row cannot be turned into a valid record.
    InvalidData(String),
    /// Connection schema is not at the migrated version this binary expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::DuplicateKey { kind, id } => write!(f, "{kind} id already exists: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted study data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "study repository requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for RepoError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage contract consumed by the mastery core.
pub trait StudyRepository {
    fn insert_language(&self, language: &Language) -> RepoResult<()>;
    fn put_language(&self, language: &Language) -> RepoResult<()>;
    fn get_language(&self, id: &str) -> RepoResult<Option<Language>>;
    fn list_languages(&self) -> RepoResult<Vec<Language>>;
    fn delete_language(&self, id: &str) -> RepoResult<bool>;

    fn insert_unit(&self, unit: &Unit) -> RepoResult<()>;
    fn put_unit(&self, unit: &Unit) -> RepoResult<()>;
    fn get_unit(&self, id: &str) -> RepoResult<Option<Unit>>;
    /// Units of one language in creation order.
    fn list_units(&self, language_id: &str) -> RepoResult<Vec<Unit>>;
    fn delete_unit(&self, id: &str) -> RepoResult<bool>;

    fn insert_item(&self, item: &Item) -> RepoResult<()>;
    fn put_item(&self, item: &Item) -> RepoResult<()>;
    fn get_item(&self, id: &str) -> RepoResult<Option<Item>>;
    /// Items of one unit in creation order, optionally restricted to a kind.
    fn list_items(&self, unit_id: &str, kind: Option<ItemKind>) -> RepoResult<Vec<Item>>;
    fn delete_item(&self, id: &str) -> RepoResult<bool>;

    /// Every stored id of `kind`, restricted to `scope` when given.
    ///
    /// Scope is the owning language for units and the owning unit for items;
    /// languages ignore it.
    fn list_ids(&self, kind: EntityKind, scope: Option<&str>) -> RepoResult<Vec<String>>;

    /// Runs `work` so that its writes land together or not at all.
    ///
    /// Stores without transactions run `work` directly. Nested calls join the
    /// outermost unit of work.
    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        Self: Sized,
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>,
    {
        work()
    }
}

/// SQLite-backed study repository.
pub struct SqliteStudyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStudyRepository<'conn> {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version = current_user_version(conn)?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    fn write_links(&self, item: &Item) -> RepoResult<()> {
        self.conn
            .execute(
                "DELETE FROM exercise_links WHERE exercise_id = ?1;",
                [item.id.as_str()],
            )?;

        let Some(associations) = item.associations() else {
            return Ok(());
        };

        let mut stmt = self.conn.prepare(
            "INSERT OR IGNORE INTO exercise_links (exercise_id, target_kind, target_id, position)
             VALUES (?1, ?2, ?3, ?4);",
        )?;
        for (position, (kind, target_id)) in associations.iter().enumerate() {
            stmt.execute(params![
                item.id,
                kind.as_db_str(),
                target_id,
                position as i64
            ])?;
        }
        Ok(())
    }

    fn load_associations(&self, exercise_id: &str) -> RepoResult<Associations> {
        let mut stmt = self.conn.prepare(
            "SELECT target_kind, target_id
             FROM exercise_links
             WHERE exercise_id = ?1
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([exercise_id])?;
        let mut associations = Associations::default();

        while let Some(row) = rows.next()? {
            let kind_text: String = row.get(0)?;
            let target_id: String = row.get(1)?;
            match ItemKind::from_db_str(&kind_text) {
                Some(ItemKind::Vocabulary) => associations.vocabulary.push(target_id),
                Some(ItemKind::Character) => associations.character.push(target_id),
                Some(ItemKind::Grammar) => associations.grammar.push(target_id),
                _ => {
                    return Err(RepoError::InvalidData(format!(
                        "invalid link kind `{kind_text}` in exercise_links.target_kind"
                    )));
                }
            }
        }
        Ok(associations)
    }

    fn hydrate_item(&self, row: ItemRow) -> RepoResult<Item> {
        let associations = if row.kind == ItemKind::Exercise {
            Some(self.load_associations(&row.id)?)
        } else {
            None
        };
        let item = row.into_item(associations)?;
        item.validate()?;
        Ok(item)
    }

    fn write_item(&self, item: &Item, upsert: bool) -> RepoResult<()> {
        item.validate()?;

        let conflict_clause = if upsert {
            " ON CONFLICT(id) DO UPDATE SET
                unit_id = excluded.unit_id,
                kind = excluded.kind,
                headline = excluded.headline,
                body = excluded.body,
                exercise_type = excluded.exercise_type,
                score = excluded.score,
                last_practiced = excluded.last_practiced"
        } else {
            ""
        };
        let exercise_type = match &item.body {
            ItemBody::Exercise { exercise_type, .. } => Some(exercise_type.as_str()),
            _ => None,
        };

        let tx = if self.conn.is_autocommit() {
            Some(self.conn.unchecked_transaction()?)
        } else {
            None
        };
        self.conn
            .execute(
                &format!(
                    "INSERT INTO items (
                        id,
                        unit_id,
                        kind,
                        headline,
                        body,
                        exercise_type,
                        score,
                        last_practiced
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8){conflict_clause};"
                ),
                params![
                    item.id,
                    item.unit_id,
                    item.kind().as_db_str(),
                    item.body.headline(),
                    item.body.detail(),
                    exercise_type,
                    item.score,
                    format_date(item.last_practiced),
                ],
            )
            .map_err(|err| map_insert_error(err, EntityKind::Item(item.kind()), &item.id))?;
        self.write_links(item)?;
        if let Some(tx) = tx {
            tx.commit()?;
        }
        Ok(())
    }
}

impl StudyRepository for SqliteStudyRepository<'_> {
    fn insert_language(&self, language: &Language) -> RepoResult<()> {
        language.validate()?;
        self.conn
            .execute(
                "INSERT INTO languages (
                    id,
                    name,
                    native_name,
                    level,
                    description,
                    flag,
                    score,
                    last_practiced,
                    current_unit
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                language_params(language),
            )
            .map_err(|err| map_insert_error(err, EntityKind::Language, &language.id))?;
        Ok(())
    }

    fn put_language(&self, language: &Language) -> RepoResult<()> {
        language.validate()?;
        self.conn.execute(
            "INSERT INTO languages (
                id,
                name,
                native_name,
                level,
                description,
                flag,
                score,
                last_practiced,
                current_unit
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                native_name = excluded.native_name,
                level = excluded.level,
                description = excluded.description,
                flag = excluded.flag,
                score = excluded.score,
                last_practiced = excluded.last_practiced,
                current_unit = excluded.current_unit;",
            language_params(language),
        )?;
        Ok(())
    }

    fn get_language(&self, id: &str) -> RepoResult<Option<Language>> {
        self.conn
            .query_row(
                &format!("{LANGUAGE_SELECT_SQL} WHERE id = ?1;"),
                [id],
                LanguageRow::from_row,
            )
            .optional()?
            .map(LanguageRow::into_language)
            .transpose()
    }

    fn list_languages(&self) -> RepoResult<Vec<Language>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LANGUAGE_SELECT_SQL} ORDER BY seq ASC;"))?;
        let rows = stmt.query_map([], LanguageRow::from_row)?;
        let mut languages = Vec::new();
        for row in rows {
            languages.push(row?.into_language()?);
        }
        Ok(languages)
    }

    fn delete_language(&self, id: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM languages WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn insert_unit(&self, unit: &Unit) -> RepoResult<()> {
        unit.validate()?;
        self.conn
            .execute(
                "INSERT INTO units (
                    id,
                    language_id,
                    title,
                    description,
                    level,
                    score,
                    last_practiced
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                unit_params(unit),
            )
            .map_err(|err| map_insert_error(err, EntityKind::Unit, &unit.id))?;
        Ok(())
    }

    fn put_unit(&self, unit: &Unit) -> RepoResult<()> {
        unit.validate()?;
        self.conn.execute(
            "INSERT INTO units (
                id,
                language_id,
                title,
                description,
                level,
                score,
                last_practiced
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                language_id = excluded.language_id,
                title = excluded.title,
                description = excluded.description,
                level = excluded.level,
                score = excluded.score,
                last_practiced = excluded.last_practiced;",
            unit_params(unit),
        )?;
        Ok(())
    }

    fn get_unit(&self, id: &str) -> RepoResult<Option<Unit>> {
        self.conn
            .query_row(
                &format!("{UNIT_SELECT_SQL} WHERE id = ?1;"),
                [id],
                UnitRow::from_row,
            )
            .optional()?
            .map(UnitRow::into_unit)
            .transpose()
    }

    fn list_units(&self, language_id: &str) -> RepoResult<Vec<Unit>> {
        let mut stmt = self.conn.prepare(&format!(
            "{UNIT_SELECT_SQL} WHERE language_id = ?1 ORDER BY seq ASC;"
        ))?;
        let rows = stmt.query_map([language_id], UnitRow::from_row)?;
        let mut units = Vec::new();
        for row in rows {
            units.push(row?.into_unit()?);
        }
        Ok(units)
    }

    fn delete_unit(&self, id: &str) -> RepoResult<bool> {
        let changed = self.conn.execute("DELETE FROM units WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn insert_item(&self, item: &Item) -> RepoResult<()> {
        self.write_item(item, false)
    }

    fn put_item(&self, item: &Item) -> RepoResult<()> {
        self.write_item(item, true)
    }

    fn get_item(&self, id: &str) -> RepoResult<Option<Item>> {
        let row = self
            .conn
            .query_row(
                &format!("{ITEM_SELECT_SQL} WHERE id = ?1;"),
                [id],
                RawItemRow::from_row,
            )
            .optional()?;
        match row {
            Some(row) => Ok(Some(self.hydrate_item(row.parse()?)?)),
            None => Ok(None),
        }
    }

    fn list_items(&self, unit_id: &str, kind: Option<ItemKind>) -> RepoResult<Vec<Item>> {
        let mut sql = format!("{ITEM_SELECT_SQL} WHERE unit_id = ?");
        let mut bind_values = vec![Value::Text(unit_id.to_string())];
        if let Some(kind) = kind {
            sql.push_str(" AND kind = ?");
            bind_values.push(Value::Text(kind.as_db_str().to_string()));
        }
        sql.push_str(" ORDER BY seq ASC;");

        let raw_rows = {
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(bind_values), RawItemRow::from_row)?;
            let collected = rows.collect::<Result<Vec<_>, _>>()?;
            collected
        };

        let mut items = Vec::with_capacity(raw_rows.len());
        for row in raw_rows {
            items.push(self.hydrate_item(row.parse()?)?);
        }
        Ok(items)
    }

    fn delete_item(&self, id: &str) -> RepoResult<bool> {
        let changed = self.conn.execute("DELETE FROM items WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }

    fn list_ids(&self, kind: EntityKind, scope: Option<&str>) -> RepoResult<Vec<String>> {
        let (mut sql, mut bind_values) = match kind {
            EntityKind::Language => ("SELECT id FROM languages WHERE 1 = 1".to_string(), vec![]),
            EntityKind::Unit => ("SELECT id FROM units WHERE 1 = 1".to_string(), vec![]),
            EntityKind::Item(item_kind) => (
                "SELECT id FROM items WHERE kind = ?".to_string(),
                vec![Value::Text(item_kind.as_db_str().to_string())],
            ),
        };
        match (kind, scope) {
            (EntityKind::Unit, Some(language_id)) => {
                sql.push_str(" AND language_id = ?");
                bind_values.push(Value::Text(language_id.to_string()));
            }
            (EntityKind::Item(_), Some(unit_id)) => {
                sql.push_str(" AND unit_id = ?");
                bind_values.push(Value::Text(unit_id.to_string()));
            }
            _ => {}
        }
        sql.push_str(" ORDER BY seq ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bind_values), |row| row.get::<_, String>(0))?;
        let ids = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>,
    {
        if !self.conn.is_autocommit() {
            return work();
        }
        let tx = self.conn.unchecked_transaction().map_err(RepoError::from)?;
        let value = work()?;
        tx.commit().map_err(RepoError::from)?;
        Ok(value)
    }
}

struct LanguageRow {
    id: String,
    name: String,
    native_name: Option<String>,
    level: String,
    description: String,
    flag: String,
    score: f64,
    last_practiced: String,
    current_unit: Option<String>,
}

impl LanguageRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            native_name: row.get("native_name")?,
            level: row.get("level")?,
            description: row.get("description")?,
            flag: row.get("flag")?,
            score: row.get("score")?,
            last_practiced: row.get("last_practiced")?,
            current_unit: row.get("current_unit")?,
        })
    }

    fn into_language(self) -> RepoResult<Language> {
        let language = Language {
            last_practiced: parse_date(&self.last_practiced, "languages.last_practiced")?,
            id: self.id,
            name: self.name,
            native_name: self.native_name,
            level: self.level,
            description: self.description,
            flag: self.flag,
            score: self.score,
            current_unit: self.current_unit,
        };
        language.validate()?;
        Ok(language)
    }
}

struct UnitRow {
    id: String,
    language_id: String,
    title: String,
    description: String,
    level: String,
    score: f64,
    last_practiced: String,
}

impl UnitRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            language_id: row.get("language_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            level: row.get("level")?,
            score: row.get("score")?,
            last_practiced: row.get("last_practiced")?,
        })
    }

    fn into_unit(self) -> RepoResult<Unit> {
        let unit = Unit {
            last_practiced: parse_date(&self.last_practiced, "units.last_practiced")?,
            id: self.id,
            language_id: self.language_id,
            title: self.title,
            description: self.description,
            level: self.level,
            score: self.score,
        };
        unit.validate()?;
        Ok(unit)
    }
}

struct RawItemRow {
    id: String,
    unit_id: String,
    kind: String,
    headline: String,
    body: String,
    exercise_type: Option<String>,
    score: f64,
    last_practiced: String,
}

impl RawItemRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            unit_id: row.get("unit_id")?,
            kind: row.get("kind")?,
            headline: row.get("headline")?,
            body: row.get("body")?,
            exercise_type: row.get("exercise_type")?,
            score: row.get("score")?,
            last_practiced: row.get("last_practiced")?,
        })
    }

    fn parse(self) -> RepoResult<ItemRow> {
        let kind = ItemKind::from_db_str(&self.kind).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid item kind `{}` in items.kind", self.kind))
        })?;
        Ok(ItemRow {
            last_practiced: parse_date(&self.last_practiced, "items.last_practiced")?,
            id: self.id,
            unit_id: self.unit_id,
            kind,
            headline: self.headline,
            body: self.body,
            exercise_type: self.exercise_type,
            score: self.score,
        })
    }
}

struct ItemRow {
    id: String,
    unit_id: String,
    kind: ItemKind,
    headline: String,
    body: String,
    exercise_type: Option<String>,
    score: f64,
    last_practiced: NaiveDate,
}

impl ItemRow {
    fn into_item(self, associations: Option<Associations>) -> RepoResult<Item> {
        let body = match self.kind {
            ItemKind::Vocabulary => ItemBody::Vocabulary {
                word: self.headline,
                translation: self.body,
            },
            ItemKind::Grammar => ItemBody::Grammar {
                title: self.headline,
                explanation: self.body,
            },
            ItemKind::Character => ItemBody::Character {
                glyph: self.headline,
                meaning: self.body,
            },
            ItemKind::Exercise => ItemBody::Exercise {
                exercise_type: self.exercise_type.ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "exercise `{}` has no items.exercise_type",
                        self.id
                    ))
                })?,
                question: self.headline,
                answer: self.body,
                associations: associations.unwrap_or_default(),
            },
        };
        Ok(Item {
            id: self.id,
            unit_id: self.unit_id,
            body,
            score: self.score,
            last_practiced: self.last_practiced,
        })
    }
}

fn language_params(language: &Language) -> [Value; 9] {
    [
        Value::Text(language.id.clone()),
        Value::Text(language.name.clone()),
        optional_text(language.native_name.as_deref()),
        Value::Text(language.level.clone()),
        Value::Text(language.description.clone()),
        Value::Text(language.flag.clone()),
        Value::Real(language.score),
        Value::Text(format_date(language.last_practiced)),
        optional_text(language.current_unit.as_deref()),
    ]
}

fn unit_params(unit: &Unit) -> [Value; 7] {
    [
        Value::Text(unit.id.clone()),
        Value::Text(unit.language_id.clone()),
        Value::Text(unit.title.clone()),
        Value::Text(unit.description.clone()),
        Value::Text(unit.level.clone()),
        Value::Real(unit.score),
        Value::Text(format_date(unit.last_practiced)),
    ]
}

fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(value: &str, column: &str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| RepoError::InvalidData(format!("invalid date `{value}` in {column}")))
}

fn map_insert_error(err: rusqlite::Error, kind: EntityKind, id: &str) -> RepoError {
    if is_unique_violation(&err) {
        return RepoError::DuplicateKey {
            kind,
            id: id.to_string(),
        };
    }
    err.into()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && (failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}
