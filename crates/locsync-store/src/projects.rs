use locsync_core::Locale;
use rusqlite::{params, OptionalExtension, Row};

use crate::{flag, Db, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRow {
    pub id: i64,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocaleRow {
    pub id: i64,
    pub locale: Locale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRow {
    pub id: i64,
    pub project_id: i64,
    pub url: String,
    pub branch: Option<String>,
    pub source: bool,
    pub last_synced_revision: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl UserRow {
    /// `Name <email>` as used in commit trailers and gettext headers.
    pub fn signature(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

fn locale_from_row(row: &Row<'_>) -> rusqlite::Result<LocaleRow> {
    let csv: String = row.get(3)?;
    Ok(LocaleRow {
        id: row.get(0)?,
        locale: Locale {
            code: row.get(1)?,
            name: row.get(2)?,
            cldr_plurals: Locale::parse_cldr_plurals_csv(&csv),
            plural_rule: row.get(4)?,
        },
    })
}

fn repository_from_row(row: &Row<'_>) -> rusqlite::Result<RepositoryRow> {
    Ok(RepositoryRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        url: row.get(2)?,
        branch: row.get(3)?,
        source: row.get::<_, i64>(4)? != 0,
        last_synced_revision: row.get(5)?,
    })
}

const LOCALE_COLUMNS: &str = "l.id, l.code, l.name, l.cldr_plurals, l.plural_rule";
const REPOSITORY_COLUMNS: &str = "id, project_id, url, branch, source, last_synced_revision";

impl Db<'_> {
    pub fn upsert_project(&self, slug: &str, name: &str) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO project (slug, name) VALUES (?1, ?2)
             ON CONFLICT (slug) DO UPDATE SET name = excluded.name",
            params![slug, name],
        )?;
        Ok(self.conn.query_row(
            "SELECT id FROM project WHERE slug = ?1",
            params![slug],
            |row| row.get(0),
        )?)
    }

    pub fn project_by_slug(&self, slug: &str) -> Result<Option<ProjectRow>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, slug, name FROM project WHERE slug = ?1",
                params![slug],
                |row| {
                    Ok(ProjectRow {
                        id: row.get(0)?,
                        slug: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn projects(&self) -> Result<Vec<ProjectRow>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT id, slug, name FROM project ORDER BY slug")?;
        let rows = stmt.query_map([], |row| {
            Ok(ProjectRow {
                id: row.get(0)?,
                slug: row.get(1)?,
                name: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Insert or refresh a locale's name and plural data.
    pub fn upsert_locale(&self, locale: &Locale) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO locale (code, name, cldr_plurals, nplurals, plural_rule)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (code) DO UPDATE SET
                name = excluded.name,
                cldr_plurals = excluded.cldr_plurals,
                nplurals = excluded.nplurals,
                plural_rule = excluded.plural_rule",
            params![
                locale.code,
                locale.name,
                locale.cldr_plurals_csv(),
                locale.nplurals() as i64,
                locale.plural_rule
            ],
        )?;
        Ok(self.conn.query_row(
            "SELECT id FROM locale WHERE code = ?1",
            params![locale.code],
            |row| row.get(0),
        )?)
    }

    pub fn locale_by_code(&self, code: &str) -> Result<Option<LocaleRow>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {LOCALE_COLUMNS} FROM locale l WHERE l.code = ?1"),
                params![code],
                locale_from_row,
            )
            .optional()?)
    }

    pub fn add_project_locale(&self, project_id: i64, locale_id: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO project_locale (project_id, locale_id) VALUES (?1, ?2)",
            params![project_id, locale_id],
        )?;
        Ok(())
    }

    /// Locales enabled for a project, ordered by code.
    pub fn project_locales(&self, project_id: i64) -> Result<Vec<LocaleRow>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {LOCALE_COLUMNS} FROM locale l
             JOIN project_locale pl ON pl.locale_id = l.id
             WHERE pl.project_id = ?1
             ORDER BY l.code"
        ))?;
        let rows = stmt.query_map(params![project_id], locale_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn upsert_repository(
        &self,
        project_id: i64,
        url: &str,
        branch: Option<&str>,
        source: bool,
    ) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO repository (project_id, url, branch, source) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (project_id, url) DO UPDATE SET
                branch = excluded.branch, source = excluded.source",
            params![project_id, url, branch, flag(source)],
        )?;
        Ok(self.conn.query_row(
            "SELECT id FROM repository WHERE project_id = ?1 AND url = ?2",
            params![project_id, url],
            |row| row.get(0),
        )?)
    }

    pub fn repositories(&self, project_id: i64) -> Result<Vec<RepositoryRow>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repository WHERE project_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![project_id], repository_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn set_last_synced_revision(
        &self,
        repository_id: i64,
        revision: &str,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE repository SET last_synced_revision = ?2 WHERE id = ?1",
            params![repository_id, revision],
        )?;
        Ok(())
    }

    pub fn upsert_user(&self, name: &str, email: &str) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO user (name, email) VALUES (?1, ?2)
             ON CONFLICT (email) DO UPDATE SET name = excluded.name",
            params![name, email],
        )?;
        Ok(self.conn.query_row(
            "SELECT id FROM user WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )?)
    }

    pub fn user(&self, id: i64) -> Result<Option<UserRow>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, email FROM user WHERE id = ?1",
                params![id],
                |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::fixture;
    use crate::StoreError;
    use locsync_core::{builtin_locale, PluralCategory};

    #[test]
    fn locales_keep_their_plural_data() {
        let fx = fixture();
        let pl = builtin_locale("pl").unwrap();
        let row = fx
            .store
            .transaction(|db| {
                let id = db.upsert_locale(&pl)?;
                db.add_project_locale(fx.project, id)?;
                db.locale_by_code("pl")
            })
            .unwrap()
            .unwrap();
        assert_eq!(row.locale, pl);
        assert_eq!(
            row.locale.cldr_plurals,
            vec![PluralCategory::One, PluralCategory::Few, PluralCategory::Many]
        );

        let codes: Vec<String> = fx
            .store
            .read(|db| db.project_locales(fx.project))
            .unwrap()
            .into_iter()
            .map(|l| l.locale.code)
            .collect();
        assert_eq!(codes, vec!["de", "pl"]);
    }

    #[test]
    fn upserts_are_idempotent() {
        let fx = fixture();
        let (a, b, repo_a, repo_b) = fx
            .store
            .transaction(|db| {
                let a = db.upsert_user("Ana", "ana@example.com")?;
                let b = db.upsert_user("Ana B.", "ana@example.com")?;
                let ra = db.upsert_repository(fx.project, "https://x/r.git", Some("main"), true)?;
                let rb = db.upsert_repository(fx.project, "https://x/r.git", None, true)?;
                Ok::<_, StoreError>((a, b, ra, rb))
            })
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(repo_a, repo_b);
        let user = fx.store.read(|db| db.user(a)).unwrap().unwrap();
        assert_eq!(user.signature(), "Ana B. <ana@example.com>");
        let repos = fx.store.read(|db| db.repositories(fx.project)).unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].branch, None);
    }

    #[test]
    fn last_synced_revision_is_stored() {
        let fx = fixture();
        let repo = fx
            .store
            .transaction(|db| {
                let id = db.upsert_repository(fx.project, "file:///r", None, true)?;
                db.set_last_synced_revision(id, "abc123")?;
                Ok::<_, StoreError>(id)
            })
            .unwrap();
        let repos = fx.store.read(|db| db.repositories(fx.project)).unwrap();
        assert_eq!(repos[0].id, repo);
        assert_eq!(repos[0].last_synced_revision.as_deref(), Some("abc123"));
    }
}
