//! Denormalized counters.
//!
//! Every counter is recomputed from the translations themselves, bottom-up:
//! resources, translated resources, project locales, then the project and
//! every locale. Nothing is ever adjusted by a delta.

use locsync_domain::StatsRow;
use rusqlite::params;

use crate::{Db, StoreError};

const RESOURCE_TOTALS: &str = "
UPDATE resource SET total_strings = (
    SELECT COUNT(*) FROM entity e WHERE e.resource_id = resource.id AND e.obsolete = 0
)
WHERE project_id = ?1";

// A plural entity counts towards a status only when every plural form of
// the locale satisfies it. Plural form NULL is folded into a single form.
const TRANSLATED_RESOURCE_STATS: &str = "
WITH flagged AS (
    SELECT t.entity_id, t.locale_id, COALESCE(t.plural_form, -1) AS form,
           t.approved, t.pretranslated, t.fuzzy, t.rejected,
           EXISTS (SELECT 1 FROM translation_error x WHERE x.translation_id = t.id) AS has_errors,
           EXISTS (SELECT 1 FROM translation_warning w WHERE w.translation_id = t.id) AS has_warnings
    FROM translation t
    JOIN entity e ON e.id = t.entity_id
    JOIN resource r ON r.id = e.resource_id
    WHERE r.project_id = ?1 AND e.obsolete = 0
),
entity_status AS (
    SELECT e.resource_id, f.locale_id,
           CASE WHEN e.string_plural = '' THEN 1 ELSE l.nplurals END AS nforms,
           COUNT(DISTINCT CASE WHEN f.approved = 1 AND f.has_errors = 0 AND f.has_warnings = 0
                               THEN f.form END) AS approved,
           COUNT(DISTINCT CASE WHEN f.pretranslated = 1 AND f.has_errors = 0 AND f.has_warnings = 0
                               THEN f.form END) AS pretranslated,
           COUNT(DISTINCT CASE WHEN (f.approved = 1 OR f.pretranslated = 1 OR f.fuzzy = 1)
                                    AND f.has_errors = 1
                               THEN f.form END) AS errors,
           COUNT(DISTINCT CASE WHEN (f.approved = 1 OR f.pretranslated = 1 OR f.fuzzy = 1)
                                    AND f.has_warnings = 1 AND f.has_errors = 0
                               THEN f.form END) AS warnings,
           COUNT(DISTINCT CASE WHEN f.approved = 0 AND f.pretranslated = 0 AND f.fuzzy = 0
                                    AND f.rejected = 0
                               THEN f.form END) AS unreviewed
    FROM flagged f
    JOIN entity e ON e.id = f.entity_id
    JOIN locale l ON l.id = f.locale_id
    GROUP BY f.entity_id, f.locale_id
),
totals AS (
    SELECT tr.id AS tr_id,
           r.total_strings AS total,
           COALESCE(SUM(s.approved >= s.nforms), 0) AS approved,
           COALESCE(SUM(s.pretranslated >= s.nforms), 0) AS pretranslated,
           COALESCE(SUM(s.errors >= s.nforms), 0) AS errors,
           COALESCE(SUM(s.warnings >= s.nforms), 0) AS warnings,
           COALESCE(SUM(s.unreviewed >= s.nforms), 0) AS unreviewed
    FROM translated_resource tr
    JOIN resource r ON r.id = tr.resource_id
    LEFT JOIN entity_status s ON s.resource_id = tr.resource_id AND s.locale_id = tr.locale_id
    WHERE r.project_id = ?1
    GROUP BY tr.id
)
UPDATE translated_resource SET
    total_strings = totals.total,
    approved_strings = totals.approved,
    pretranslated_strings = totals.pretranslated,
    strings_with_errors = totals.errors,
    strings_with_warnings = totals.warnings,
    unreviewed_strings = totals.unreviewed
FROM totals
WHERE translated_resource.id = totals.tr_id";

const PROJECT_LOCALE_STATS: &str = "
UPDATE project_locale SET
    total_strings = s.total,
    approved_strings = s.approved,
    pretranslated_strings = s.pretranslated,
    strings_with_errors = s.errors,
    strings_with_warnings = s.warnings,
    unreviewed_strings = s.unreviewed
FROM (
    SELECT pl.id AS pl_id,
           COALESCE(SUM(tr.total_strings), 0) AS total,
           COALESCE(SUM(tr.approved_strings), 0) AS approved,
           COALESCE(SUM(tr.pretranslated_strings), 0) AS pretranslated,
           COALESCE(SUM(tr.strings_with_errors), 0) AS errors,
           COALESCE(SUM(tr.strings_with_warnings), 0) AS warnings,
           COALESCE(SUM(tr.unreviewed_strings), 0) AS unreviewed
    FROM project_locale pl
    LEFT JOIN resource r ON r.project_id = pl.project_id
    LEFT JOIN translated_resource tr ON tr.resource_id = r.id AND tr.locale_id = pl.locale_id
    WHERE pl.project_id = ?1
    GROUP BY pl.id
) AS s
WHERE project_locale.id = s.pl_id";

const PROJECT_STATS: &str = "
UPDATE project SET
    total_strings = s.total,
    approved_strings = s.approved,
    pretranslated_strings = s.pretranslated,
    strings_with_errors = s.errors,
    strings_with_warnings = s.warnings,
    unreviewed_strings = s.unreviewed
FROM (
    SELECT p.id AS project_id,
           COALESCE(SUM(pl.total_strings), 0) AS total,
           COALESCE(SUM(pl.approved_strings), 0) AS approved,
           COALESCE(SUM(pl.pretranslated_strings), 0) AS pretranslated,
           COALESCE(SUM(pl.strings_with_errors), 0) AS errors,
           COALESCE(SUM(pl.strings_with_warnings), 0) AS warnings,
           COALESCE(SUM(pl.unreviewed_strings), 0) AS unreviewed
    FROM project p
    LEFT JOIN project_locale pl ON pl.project_id = p.id
    WHERE p.id = ?1
    GROUP BY p.id
) AS s
WHERE project.id = s.project_id";

const LOCALE_STATS: &str = "
UPDATE locale SET
    total_strings = s.total,
    approved_strings = s.approved,
    pretranslated_strings = s.pretranslated,
    strings_with_errors = s.errors,
    strings_with_warnings = s.warnings,
    unreviewed_strings = s.unreviewed
FROM (
    SELECT l.id AS locale_id,
           COALESCE(SUM(pl.total_strings), 0) AS total,
           COALESCE(SUM(pl.approved_strings), 0) AS approved,
           COALESCE(SUM(pl.pretranslated_strings), 0) AS pretranslated,
           COALESCE(SUM(pl.strings_with_errors), 0) AS errors,
           COALESCE(SUM(pl.strings_with_warnings), 0) AS warnings,
           COALESCE(SUM(pl.unreviewed_strings), 0) AS unreviewed
    FROM locale l
    LEFT JOIN project_locale pl ON pl.locale_id = l.id
    GROUP BY l.id
) AS s
WHERE locale.id = s.locale_id";

const STAT_COLUMNS: &str = "total_strings, approved_strings, pretranslated_strings, \
     strings_with_errors, strings_with_warnings, unreviewed_strings";

fn stats_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StatsRow> {
    Ok(StatsRow {
        name: row.get(0)?,
        total: row.get(1)?,
        approved: row.get(2)?,
        pretranslated: row.get(3)?,
        errors: row.get(4)?,
        warnings: row.get(5)?,
        unreviewed: row.get(6)?,
    })
}

impl Db<'_> {
    /// Recompute every counter a project contributes to.
    pub fn update_stats(&self, project_id: i64) -> Result<(), StoreError> {
        self.conn.execute(RESOURCE_TOTALS, params![project_id])?;
        self.conn.execute(TRANSLATED_RESOURCE_STATS, params![project_id])?;
        self.conn.execute(PROJECT_LOCALE_STATS, params![project_id])?;
        self.conn.execute(PROJECT_STATS, params![project_id])?;
        self.conn.execute(LOCALE_STATS, [])?;
        tracing::debug!(event = "stats_updated", project_id);
        Ok(())
    }

    pub fn project_stats(&self, project_id: i64) -> Result<StatsRow, StoreError> {
        Ok(self.conn.query_row(
            &format!("SELECT slug, {STAT_COLUMNS} FROM project WHERE id = ?1"),
            params![project_id],
            stats_from_row,
        )?)
    }

    /// Per-locale counters of a project, ordered by locale code.
    pub fn project_locale_stats(&self, project_id: i64) -> Result<Vec<StatsRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT l.code, pl.total_strings, pl.approved_strings, pl.pretranslated_strings,
                    pl.strings_with_errors, pl.strings_with_warnings, pl.unreviewed_strings
             FROM project_locale pl JOIN locale l ON l.id = pl.locale_id
             WHERE pl.project_id = ?1
             ORDER BY l.code",
        )?;
        let rows = stmt.query_map(params![project_id], stats_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Per-resource counters of one locale, ordered by resource path.
    pub fn translated_resource_stats(
        &self,
        project_id: i64,
        locale_id: i64,
    ) -> Result<Vec<StatsRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT r.path, tr.total_strings, tr.approved_strings, tr.pretranslated_strings,
                    tr.strings_with_errors, tr.strings_with_warnings, tr.unreviewed_strings
             FROM translated_resource tr JOIN resource r ON r.id = tr.resource_id
             WHERE r.project_id = ?1 AND tr.locale_id = ?2
             ORDER BY r.path",
        )?;
        let rows = stmt.query_map(params![project_id, locale_id], stats_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn locale_stats(&self, code: &str) -> Result<Option<StatsRow>, StoreError> {
        use rusqlite::OptionalExtension;
        Ok(self
            .conn
            .query_row(
                &format!("SELECT code, {STAT_COLUMNS} FROM locale WHERE code = ?1"),
                params![code],
                stats_from_row,
            )
            .optional()?)
    }

    pub fn resource_total(&self, resource_id: i64) -> Result<i64, StoreError> {
        Ok(self.conn.query_row(
            "SELECT total_strings FROM resource WHERE id = ?1",
            params![resource_id],
            |row| row.get(0),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{fixture, now, Fixture};
    use crate::{NewTranslation, StoreError, TranslationState};
    use locsync_core::VcsTranslation;
    use locsync_validate::check_translation;

    fn entity(fx: &Fixture, key: &str, plural: bool) -> i64 {
        let unit = VcsTranslation {
            key: key.into(),
            source_string: format!("{key} one"),
            source_string_plural: if plural { format!("{key} other") } else { String::new() },
            ..Default::default()
        };
        fx.store
            .transaction(|db| db.insert_entity(fx.resource, &unit, now()))
            .unwrap()
    }

    fn translate(
        fx: &Fixture,
        entity_id: i64,
        form: Option<usize>,
        string: &str,
        state: TranslationState,
    ) -> i64 {
        fx.store
            .transaction(|db| {
                let id = db.insert_translation(
                    &NewTranslation {
                        entity_id,
                        locale_id: fx.de,
                        string,
                        plural_form: form,
                        state,
                        user_id: None,
                    },
                    now(),
                )?;
                if state != TranslationState::Unreviewed {
                    db.activate(id, None, now())?;
                }
                Ok::<_, StoreError>(id)
            })
            .unwrap()
    }

    fn refresh(fx: &Fixture) {
        fx.store
            .transaction(|db| {
                db.ensure_translated_resource(fx.resource, fx.de)?;
                db.update_stats(fx.project)
            })
            .unwrap();
    }

    #[test]
    fn counts_roll_up_from_translations() {
        let fx = fixture();
        let a = entity(&fx, "a", false);
        let b = entity(&fx, "b", false);
        let c = entity(&fx, "c", false);
        let obsolete = entity(&fx, "old", false);
        translate(&fx, a, None, "A", TranslationState::Approved);
        translate(&fx, b, None, "B", TranslationState::Pretranslated);
        translate(&fx, c, None, "C?", TranslationState::Unreviewed);
        translate(&fx, obsolete, None, "Alt", TranslationState::Approved);
        fx.store
            .transaction(|db| db.obsolete_entities(&[obsolete], now()))
            .unwrap();
        refresh(&fx);

        let (project, locales, resource, de) = fx
            .store
            .read(|db| {
                Ok((
                    db.project_stats(fx.project)?,
                    db.project_locale_stats(fx.project)?,
                    db.resource_total(fx.resource)?,
                    db.locale_stats("de")?.unwrap(),
                ))
            })
            .unwrap();
        assert_eq!(resource, 3);
        assert_eq!(project.total, 3);
        assert_eq!(project.approved, 1);
        assert_eq!(project.pretranslated, 1);
        assert_eq!(project.unreviewed, 1);
        assert_eq!(locales.len(), 1);
        assert_eq!(locales[0].approved, project.approved);
        assert_eq!(de.approved, 1);
    }

    #[test]
    fn plural_entities_need_every_form() {
        let fx = fixture();
        let e = entity(&fx, "files", true);
        translate(&fx, e, Some(0), "eine Datei", TranslationState::Approved);
        refresh(&fx);
        let s = fx.store.read(|db| db.project_stats(fx.project)).unwrap();
        assert_eq!(s.approved, 0);

        translate(&fx, e, Some(1), "Dateien", TranslationState::Approved);
        refresh(&fx);
        let s = fx.store.read(|db| db.project_stats(fx.project)).unwrap();
        assert_eq!(s.approved, 1);
    }

    #[test]
    fn checked_translations_count_as_errors_or_warnings() {
        let fx = fixture();
        let a = entity(&fx, "a", false);
        let b = entity(&fx, "b", false);
        let ta = translate(&fx, a, None, " A", TranslationState::Approved);
        let tb = translate(&fx, b, None, "", TranslationState::Fuzzy);
        fx.store
            .transaction(|db| {
                db.replace_checks(
                    ta,
                    &check_translation(locsync_formats::Format::Properties, "a one", " A"),
                )?;
                db.replace_checks(
                    tb,
                    &check_translation(locsync_formats::Format::Properties, "b one", ""),
                )
            })
            .unwrap();
        refresh(&fx);
        let s = fx.store.read(|db| db.project_stats(fx.project)).unwrap();
        assert_eq!(s.approved, 0);
        assert_eq!(s.warnings, 1);
        assert_eq!(s.errors, 1);
    }

    #[test]
    fn removing_a_translated_resource_lowers_the_locale() {
        let fx = fixture();
        let a = entity(&fx, "a", false);
        translate(&fx, a, None, "A", TranslationState::Approved);
        refresh(&fx);
        assert_eq!(fx.store.read(|db| db.locale_stats("de")).unwrap().unwrap().approved, 1);

        let deleted = fx
            .store
            .transaction(|db| {
                let n = db.delete_translated_resource(fx.resource, fx.de)?;
                db.update_stats(fx.project)?;
                Ok::<_, StoreError>(n)
            })
            .unwrap();
        assert_eq!(deleted, 1);
        let de = fx.store.read(|db| db.locale_stats("de")).unwrap().unwrap();
        assert_eq!(de.approved, 0);
        assert_eq!(de.total, 0);
    }
}
