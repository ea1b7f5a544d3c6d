use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use locsync_core::PluralForm;
use locsync_validate::{CheckMessage, Severity};
use rusqlite::{params, OptionalExtension, Row};

use crate::{flag, timestamp, Db, StoreError};

/// Review status of a translation. The flags stored per row are derived
/// from it and are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationState {
    Approved,
    Pretranslated,
    Fuzzy,
    /// A suggestion nobody reviewed yet.
    Unreviewed,
    Rejected,
}

impl TranslationState {
    /// `(approved, pretranslated, fuzzy, rejected)`
    fn flags(self) -> (bool, bool, bool, bool) {
        match self {
            Self::Approved => (true, false, false, false),
            Self::Pretranslated => (false, true, false, false),
            Self::Fuzzy => (false, false, true, false),
            Self::Unreviewed => (false, false, false, false),
            Self::Rejected => (false, false, false, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRow {
    pub id: i64,
    pub entity_id: i64,
    pub locale_id: i64,
    pub string: String,
    pub plural_form: PluralForm,
    pub approved: bool,
    pub pretranslated: bool,
    pub fuzzy: bool,
    pub rejected: bool,
    pub active: bool,
    pub user_id: Option<i64>,
    pub approved_user_id: Option<i64>,
    pub date: String,
}

impl TranslationRow {
    pub fn state(&self) -> TranslationState {
        if self.rejected {
            TranslationState::Rejected
        } else if self.approved {
            TranslationState::Approved
        } else if self.pretranslated {
            TranslationState::Pretranslated
        } else if self.fuzzy {
            TranslationState::Fuzzy
        } else {
            TranslationState::Unreviewed
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTranslation<'a> {
    pub entity_id: i64,
    pub locale_id: i64,
    pub string: &'a str,
    pub plural_form: PluralForm,
    pub state: TranslationState,
    /// `None` for translations imported from a repository.
    pub user_id: Option<i64>,
}

const TRANSLATION_COLUMNS: &str = "t.id, t.entity_id, t.locale_id, t.string, t.plural_form, \
     t.approved, t.pretranslated, t.fuzzy, t.rejected, t.active, t.user_id, t.approved_user_id, t.date";

fn translation_from_row(row: &Row<'_>) -> rusqlite::Result<TranslationRow> {
    let form: Option<i64> = row.get(4)?;
    Ok(TranslationRow {
        id: row.get(0)?,
        entity_id: row.get(1)?,
        locale_id: row.get(2)?,
        string: row.get(3)?,
        plural_form: form.map(|f| f as usize),
        approved: row.get::<_, i64>(5)? != 0,
        pretranslated: row.get::<_, i64>(6)? != 0,
        fuzzy: row.get::<_, i64>(7)? != 0,
        rejected: row.get::<_, i64>(8)? != 0,
        active: row.get::<_, i64>(9)? != 0,
        user_id: row.get(10)?,
        approved_user_id: row.get(11)?,
        date: row.get(12)?,
    })
}

fn form_param(form: PluralForm) -> Option<i64> {
    form.map(|f| f as i64)
}

impl Db<'_> {
    pub fn translation(&self, id: i64) -> Result<Option<TranslationRow>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {TRANSLATION_COLUMNS} FROM translation t WHERE t.id = ?1"),
                params![id],
                translation_from_row,
            )
            .optional()?)
    }

    /// Every translation of the live entities of a resource in one locale,
    /// oldest first.
    pub fn translations(
        &self,
        resource_id: i64,
        locale_id: i64,
    ) -> Result<Vec<TranslationRow>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRANSLATION_COLUMNS} FROM translation t
             JOIN entity e ON e.id = t.entity_id
             WHERE e.resource_id = ?1 AND e.obsolete = 0 AND t.locale_id = ?2
             ORDER BY t.entity_id, t.plural_form, t.id"
        ))?;
        let rows = stmt.query_map(params![resource_id, locale_id], translation_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// The active translations of one entity in one locale.
    pub fn active_translations(
        &self,
        entity_id: i64,
        locale_id: i64,
    ) -> Result<Vec<TranslationRow>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TRANSLATION_COLUMNS} FROM translation t
             WHERE t.entity_id = ?1 AND t.locale_id = ?2 AND t.active = 1 AND t.rejected = 0
             ORDER BY t.plural_form"
        ))?;
        let rows = stmt.query_map(params![entity_id, locale_id], translation_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Insert an inactive translation. Approved translations enter the
    /// translation memory right away.
    pub fn insert_translation(
        &self,
        new: &NewTranslation<'_>,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let (approved, pretranslated, fuzzy, rejected) = new.state.flags();
        let at = timestamp(now);
        self.conn.execute(
            "INSERT INTO translation (entity_id, locale_id, string, plural_form, approved,
                                      pretranslated, fuzzy, rejected, user_id, date,
                                      approved_user_id, approved_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                     CASE WHEN ?5 = 1 THEN ?9 END, CASE WHEN ?5 = 1 THEN ?10 END)",
            params![
                new.entity_id,
                new.locale_id,
                new.string,
                form_param(new.plural_form),
                flag(approved),
                flag(pretranslated),
                flag(fuzzy),
                flag(rejected),
                new.user_id,
                at,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        if approved {
            self.upsert_memory(id)?;
        }
        Ok(id)
    }

    /// Move a translation to `state`. Returns `false` when it already was
    /// there. Translation memory follows approval in both directions.
    pub fn set_state(
        &self,
        id: i64,
        state: TranslationState,
        user_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let current = self
            .translation(id)?
            .ok_or_else(|| StoreError::Invalid(format!("no translation with id {id}")))?;
        if current.state() == state {
            return Ok(false);
        }
        let (approved, pretranslated, fuzzy, rejected) = state.flags();
        self.conn.execute(
            "UPDATE translation SET
                approved = ?2, pretranslated = ?3, fuzzy = ?4, rejected = ?5,
                active = CASE WHEN ?5 = 1 THEN 0 ELSE active END,
                approved_user_id = CASE WHEN ?2 = 1 THEN ?6 ELSE approved_user_id END,
                approved_date = CASE WHEN ?2 = 1 THEN ?7 ELSE approved_date END,
                rejected_user_id = CASE WHEN ?5 = 1 THEN ?6 ELSE rejected_user_id END,
                rejected_date = CASE WHEN ?5 = 1 THEN ?7 ELSE rejected_date END
             WHERE id = ?1",
            params![
                id,
                flag(approved),
                flag(pretranslated),
                flag(fuzzy),
                flag(rejected),
                user_id,
                timestamp(now),
            ],
        )?;
        if approved {
            self.upsert_memory(id)?;
        } else if current.approved {
            self.delete_memory(id)?;
        }
        if user_id.is_some() && !rejected {
            self.record_latest(id)?;
        }
        Ok(true)
    }

    /// Make `id` the active translation of its (entity, locale, plural form)
    /// and reject every other non-rejected sibling. Returns the number of
    /// rejected siblings.
    pub fn activate(
        &self,
        id: i64,
        user_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let t = self
            .translation(id)?
            .ok_or_else(|| StoreError::Invalid(format!("no translation with id {id}")))?;
        let form = form_param(t.plural_form);
        self.conn.execute(
            "UPDATE translation SET active = 0
             WHERE entity_id = ?1 AND locale_id = ?2 AND plural_form IS ?3 AND id != ?4
               AND active = 1",
            params![t.entity_id, t.locale_id, form, id],
        )?;
        let siblings: Vec<i64> = {
            let mut stmt = self.conn.prepare(
                "SELECT id FROM translation
                 WHERE entity_id = ?1 AND locale_id = ?2 AND plural_form IS ?3 AND id != ?4
                   AND rejected = 0",
            )?;
            let rows = stmt.query_map(params![t.entity_id, t.locale_id, form, id], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };
        for sibling in &siblings {
            self.set_state(*sibling, TranslationState::Rejected, user_id, now)?;
        }
        self.conn.execute(
            "UPDATE translation SET active = 1 WHERE id = ?1 AND active = 0",
            params![id],
        )?;
        Ok(siblings.len())
    }

    /// Replace the stored check results of a translation.
    pub fn replace_checks(
        &self,
        translation_id: i64,
        checks: &[CheckMessage],
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM translation_error WHERE translation_id = ?1",
            params![translation_id],
        )?;
        self.conn.execute(
            "DELETE FROM translation_warning WHERE translation_id = ?1",
            params![translation_id],
        )?;
        for check in checks {
            let table = match check.severity {
                Severity::Error => "translation_error",
                Severity::Warning => "translation_warning",
            };
            self.conn.execute(
                &format!("INSERT INTO {table} (translation_id, kind, message) VALUES (?1, ?2, ?3)"),
                params![translation_id, check.kind, check.message],
            )?;
        }
        Ok(())
    }

    /// `(errors, warnings)` stored for a translation.
    pub fn check_counts(&self, translation_id: i64) -> Result<(i64, i64), StoreError> {
        Ok(self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM translation_error WHERE translation_id = ?1),
                    (SELECT COUNT(*) FROM translation_warning WHERE translation_id = ?1)",
            params![translation_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?)
    }

    fn upsert_memory(&self, translation_id: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO translation_memory
                (entity_id, translation_id, locale_id, project_id, source, target)
             SELECT e.id, t.id, t.locale_id, r.project_id,
                    CASE WHEN t.plural_form > 0 AND e.string_plural != ''
                         THEN e.string_plural ELSE e.string END,
                    t.string
             FROM translation t
             JOIN entity e ON e.id = t.entity_id
             JOIN resource r ON r.id = e.resource_id
             WHERE t.id = ?1
             ON CONFLICT (translation_id) DO UPDATE SET
                source = excluded.source, target = excluded.target",
            params![translation_id],
        )?;
        Ok(())
    }

    fn delete_memory(&self, translation_id: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM translation_memory WHERE translation_id = ?1",
            params![translation_id],
        )?;
        Ok(())
    }

    /// `(source, target)` pairs of a locale's translation memory.
    pub fn memory_entries(&self, locale_id: i64) -> Result<Vec<(String, String)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT source, target FROM translation_memory WHERE locale_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![locale_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Record that an entity has unsynced database-side edits in a locale.
    pub fn mark_changed(
        &self,
        entity_id: i64,
        locale_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO changed_entity_locale (entity_id, locale_id, marked_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (entity_id, locale_id) DO UPDATE SET marked_at = excluded.marked_at",
            params![entity_id, locale_id, timestamp(now)],
        )?;
        Ok(())
    }

    /// Pending `(entity, locale)` markers of a project.
    pub fn changed_entity_locales(
        &self,
        project_id: i64,
    ) -> Result<BTreeSet<(i64, i64)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT c.entity_id, c.locale_id FROM changed_entity_locale c
             JOIN entity e ON e.id = c.entity_id
             JOIN resource r ON r.id = e.resource_id
             WHERE r.project_id = ?1",
        )?;
        let rows = stmt.query_map(params![project_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn clear_changed(&self, pairs: &[(i64, i64)]) -> Result<usize, StoreError> {
        let mut stmt = self.conn.prepare(
            "DELETE FROM changed_entity_locale WHERE entity_id = ?1 AND locale_id = ?2",
        )?;
        let mut n = 0;
        for (entity, locale) in pairs {
            n += stmt.execute(params![entity, locale])?;
        }
        Ok(n)
    }

    /// A translation made in the database outside of sync: stored, made active
    /// unless it is a plain suggestion, and marked for write-back.
    pub fn submit_translation(
        &self,
        new: &NewTranslation<'_>,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let id = self.insert_translation(new, now)?;
        if !matches!(
            new.state,
            TranslationState::Unreviewed | TranslationState::Rejected
        ) {
            self.activate(id, new.user_id, now)?;
        }
        self.record_latest(id)?;
        self.mark_changed(new.entity_id, new.locale_id, now)?;
        Ok(id)
    }

    /// Make `translation_id` the latest translation of its translated
    /// resource, which feeds the gettext revision headers.
    fn record_latest(&self, translation_id: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE translated_resource SET latest_translation_id = ?1
             WHERE (resource_id, locale_id) =
                   (SELECT e.resource_id, t.locale_id FROM translation t
                    JOIN entity e ON e.id = t.entity_id WHERE t.id = ?1)",
            params![translation_id],
        )?;
        Ok(())
    }

    pub fn set_latest_translation(
        &self,
        resource_id: i64,
        locale_id: i64,
        translation_id: i64,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE translated_resource SET latest_translation_id = ?3
             WHERE resource_id = ?1 AND locale_id = ?2",
            params![resource_id, locale_id, translation_id],
        )?;
        Ok(())
    }

    pub fn latest_translation(
        &self,
        resource_id: i64,
        locale_id: i64,
    ) -> Result<Option<TranslationRow>, StoreError> {
        let id: Option<i64> = self
            .conn
            .query_row(
                "SELECT latest_translation_id FROM translated_resource
                 WHERE resource_id = ?1 AND locale_id = ?2",
                params![resource_id, locale_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        match id {
            Some(id) => self.translation(id),
            None => Ok(None),
        }
    }
}
