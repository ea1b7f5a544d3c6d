use chrono::{DateTime, Utc};
use locsync_core::{entity_key, SourceLocation, VcsTranslation};
use locsync_formats::Format;
use rusqlite::{params, OptionalExtension, Row};

use crate::{timestamp, Db, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRow {
    pub id: i64,
    pub project_id: i64,
    pub path: String,
    pub format: Format,
    pub total_strings: i64,
}

/// A source string as stored. `key` is empty for formats keyed by text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRow {
    pub id: i64,
    pub resource_id: i64,
    pub key: String,
    pub string: String,
    pub string_plural: String,
    pub comment: String,
    pub group_comment: String,
    pub resource_comment: String,
    pub context: String,
    pub source: Vec<SourceLocation>,
    pub order: i64,
    pub obsolete: bool,
}

impl EntityRow {
    pub fn entity_key(&self) -> &str {
        entity_key(&self.key, &self.string)
    }

    pub fn is_plural(&self) -> bool {
        !self.string_plural.is_empty()
    }

    /// Whether a freshly parsed source unit differs in any tracked field.
    pub fn differs_from(&self, unit: &VcsTranslation) -> bool {
        self.string != unit.source_string
            || self.string_plural != unit.source_string_plural
            || self.comment != unit.comment()
            || self.group_comment != unit.group_comment
            || self.resource_comment != unit.resource_comment
            || self.context != unit.context
            || self.source != unit.source
    }
}

const RESOURCE_COLUMNS: &str = "id, project_id, path, format, total_strings";
const ENTITY_COLUMNS: &str = "e.id, e.resource_id, e.key, e.string, e.string_plural, e.comment, \
     e.group_comment, e.resource_comment, e.context, e.source, e.ord, e.obsolete";

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<ResourceRow> {
    let tag: String = row.get(3)?;
    let format = Format::parse_tag(&tag).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown format tag {tag:?}").into(),
        )
    })?;
    Ok(ResourceRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        path: row.get(2)?,
        format,
        total_strings: row.get(4)?,
    })
}

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<EntityRow> {
    let source: String = row.get(9)?;
    let source = serde_json::from_str(&source).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(EntityRow {
        id: row.get(0)?,
        resource_id: row.get(1)?,
        key: row.get(2)?,
        string: row.get(3)?,
        string_plural: row.get(4)?,
        comment: row.get(5)?,
        group_comment: row.get(6)?,
        resource_comment: row.get(7)?,
        context: row.get(8)?,
        source,
        order: row.get(10)?,
        obsolete: row.get::<_, i64>(11)? != 0,
    })
}

fn source_json(unit: &VcsTranslation) -> Result<String, StoreError> {
    serde_json::to_string(&unit.source).map_err(|e| StoreError::Invalid(e.to_string()))
}

impl Db<'_> {
    pub fn insert_resource(
        &self,
        project_id: i64,
        path: &str,
        format: Format,
    ) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO resource (project_id, path, format) VALUES (?1, ?2, ?3)",
            params![project_id, path, format.as_str()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn resources(&self, project_id: i64) -> Result<Vec<ResourceRow>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RESOURCE_COLUMNS} FROM resource WHERE project_id = ?1 ORDER BY path"
        ))?;
        let rows = stmt.query_map(params![project_id], resource_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn resource_by_path(
        &self,
        project_id: i64,
        path: &str,
    ) -> Result<Option<ResourceRow>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!(
                    "SELECT {RESOURCE_COLUMNS} FROM resource WHERE project_id = ?1 AND path = ?2"
                ),
                params![project_id, path],
                resource_from_row,
            )
            .optional()?)
    }

    /// Move a resource to a new path, keeping its entities and translations.
    pub fn rename_resource(&self, resource_id: i64, path: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE resource SET path = ?2 WHERE id = ?1",
            params![resource_id, path],
        )?;
        Ok(())
    }

    /// Delete a resource together with its entities, translations and
    /// translated resources.
    pub fn delete_resource(&self, resource_id: i64) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM resource WHERE id = ?1", params![resource_id])?;
        Ok(())
    }

    pub fn ensure_translated_resource(
        &self,
        resource_id: i64,
        locale_id: i64,
    ) -> Result<bool, StoreError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO translated_resource (resource_id, locale_id) VALUES (?1, ?2)",
            params![resource_id, locale_id],
        )?;
        Ok(inserted > 0)
    }

    /// Locale ids that have a translated resource for `resource_id`.
    pub fn translated_locales(&self, resource_id: i64) -> Result<Vec<i64>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT locale_id FROM translated_resource WHERE resource_id = ?1 ORDER BY locale_id",
        )?;
        let rows = stmt.query_map(params![resource_id], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Remove a locale's translated resource and every translation of the
    /// resource in that locale. Returns the number of deleted translations.
    pub fn delete_translated_resource(
        &self,
        resource_id: i64,
        locale_id: i64,
    ) -> Result<usize, StoreError> {
        let deleted = self.conn.execute(
            "DELETE FROM translation
             WHERE locale_id = ?2
               AND entity_id IN (SELECT id FROM entity WHERE resource_id = ?1)",
            params![resource_id, locale_id],
        )?;
        self.conn.execute(
            "DELETE FROM changed_entity_locale
             WHERE locale_id = ?2
               AND entity_id IN (SELECT id FROM entity WHERE resource_id = ?1)",
            params![resource_id, locale_id],
        )?;
        self.conn.execute(
            "DELETE FROM translated_resource WHERE resource_id = ?1 AND locale_id = ?2",
            params![resource_id, locale_id],
        )?;
        Ok(deleted)
    }

    pub fn insert_entity(
        &self,
        resource_id: i64,
        unit: &VcsTranslation,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO entity (resource_id, key, string, string_plural, comment, group_comment,
                                 resource_comment, context, source, ord, date_created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                resource_id,
                unit.key,
                unit.source_string,
                unit.source_string_plural,
                unit.comment(),
                unit.group_comment,
                unit.resource_comment,
                unit.context,
                source_json(unit)?,
                unit.order as i64,
                timestamp(now),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Overwrite the tracked fields of an entity from a parsed source unit.
    pub fn update_entity(&self, entity_id: i64, unit: &VcsTranslation) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE entity SET string = ?2, string_plural = ?3, comment = ?4, group_comment = ?5,
                               resource_comment = ?6, context = ?7, source = ?8, ord = ?9
             WHERE id = ?1",
            params![
                entity_id,
                unit.source_string,
                unit.source_string_plural,
                unit.comment(),
                unit.group_comment,
                unit.resource_comment,
                unit.context,
                source_json(unit)?,
                unit.order as i64,
            ],
        )?;
        Ok(())
    }

    /// Position changes alone do not count as an entity update.
    pub fn set_entity_order(&self, entity_id: i64, order: usize) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE entity SET ord = ?2 WHERE id = ?1 AND ord != ?2",
            params![entity_id, order as i64],
        )?;
        Ok(())
    }

    pub fn obsolete_entities(&self, ids: &[i64], now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut stmt = self.conn.prepare(
            "UPDATE entity SET obsolete = 1, date_obsoleted = ?2 WHERE id = ?1 AND obsolete = 0",
        )?;
        let at = timestamp(now);
        let mut n = 0;
        for id in ids {
            n += stmt.execute(params![id, at])?;
        }
        Ok(n)
    }

    /// Live (non-obsolete) entities of a resource in file order.
    pub fn entities(&self, resource_id: i64) -> Result<Vec<EntityRow>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTITY_COLUMNS} FROM entity e
             WHERE e.resource_id = ?1 AND e.obsolete = 0
             ORDER BY e.ord, e.id"
        ))?;
        let rows = stmt.query_map(params![resource_id], entity_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn entity(&self, entity_id: i64) -> Result<Option<EntityRow>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {ENTITY_COLUMNS} FROM entity e WHERE e.id = ?1"),
                params![entity_id],
                entity_from_row,
            )
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, now};

    fn unit(key: &str, value: &str, order: usize) -> VcsTranslation {
        VcsTranslation {
            key: key.into(),
            source_string: value.into(),
            order,
            source: vec![SourceLocation::parse("src/main.c:3")],
            ..Default::default()
        }
    }

    #[test]
    fn entities_round_trip_their_fields() {
        let fx = fixture();
        let mut u = unit("hello", "Hello", 0);
        u.comments = vec!["Greeting".into(), "Shown on start".into()];
        let id = fx
            .store
            .transaction(|db| db.insert_entity(fx.resource, &u, now()))
            .unwrap();
        let e = fx.store.read(|db| db.entity(id)).unwrap().unwrap();
        assert_eq!(e.entity_key(), "hello");
        assert_eq!(e.comment, "Greeting\nShown on start");
        assert_eq!(e.source, u.source);
        assert!(!e.differs_from(&u));

        u.comments.pop();
        assert!(e.differs_from(&u));
    }

    #[test]
    fn obsolete_entities_are_hidden_but_kept() {
        let fx = fixture();
        let (a, b) = fx
            .store
            .transaction(|db| {
                let a = db.insert_entity(fx.resource, &unit("a", "A", 0), now())?;
                let b = db.insert_entity(fx.resource, &unit("b", "B", 1), now())?;
                db.obsolete_entities(&[a], now())?;
                Ok::<_, StoreError>((a, b))
            })
            .unwrap();
        let live = fx.store.read(|db| db.entities(fx.resource)).unwrap();
        assert_eq!(live.iter().map(|e| e.id).collect::<Vec<_>>(), vec![b]);
        let gone = fx.store.read(|db| db.entity(a)).unwrap().unwrap();
        assert!(gone.obsolete);
        let again = fx
            .store
            .transaction(|db| db.obsolete_entities(&[a], now()))
            .unwrap();
        assert_eq!(again, 0);
    }

    #[test]
    fn renaming_a_resource_keeps_entities() {
        let fx = fixture();
        fx.store
            .transaction(|db| {
                db.insert_entity(fx.resource, &unit("a", "A", 0), now())?;
                db.rename_resource(fx.resource, "renamed.properties")
            })
            .unwrap();
        let r = fx
            .store
            .read(|db| db.resource_by_path(fx.project, "renamed.properties"))
            .unwrap()
            .unwrap();
        assert_eq!(r.id, fx.resource);
        assert_eq!(r.format, Format::Properties);
        assert_eq!(fx.store.read(|db| db.entities(r.id)).unwrap().len(), 1);
    }

    #[test]
    fn deleting_a_resource_cascades() {
        let fx = fixture();
        fx.store
            .transaction(|db| {
                db.insert_entity(fx.resource, &unit("a", "A", 0), now())?;
                db.ensure_translated_resource(fx.resource, fx.de)?;
                db.delete_resource(fx.resource)
            })
            .unwrap();
        let left: i64 = fx
            .store
            .read(|db| {
                Ok(db.conn.query_row(
                    "SELECT (SELECT COUNT(*) FROM entity) + (SELECT COUNT(*) FROM translated_resource)",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(left, 0);
    }

    #[test]
    fn translated_resources_are_created_once() {
        let fx = fixture();
        let (first, second) = fx
            .store
            .transaction(|db| {
                let first = db.ensure_translated_resource(fx.resource, fx.de)?;
                let second = db.ensure_translated_resource(fx.resource, fx.de)?;
                Ok::<_, StoreError>((first, second))
            })
            .unwrap();
        assert!(first);
        assert!(!second);
        assert_eq!(fx.store.read(|db| db.translated_locales(fx.resource)).unwrap(), vec![fx.de]);
    }
}
