use chrono::{DateTime, Duration, Utc};
use rusqlite::params;

use crate::{Store, StoreError};

/// Held per-project sync lock, released when dropped.
#[derive(Debug)]
pub struct SyncLock {
    store: Store,
    project_id: i64,
    acquired_at: i64,
}

impl SyncLock {
    pub fn project_id(&self) -> i64 {
        self.project_id
    }
}

impl Store {
    /// Take the sync lock of a project. Returns `None` while another run
    /// holds it; locks older than `stale_after` are taken over.
    pub fn try_lock(
        &self,
        project_id: i64,
        stale_after: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<SyncLock>, StoreError> {
        let cutoff = (now - stale_after).timestamp_millis();
        let acquired_at = now.timestamp_millis();
        let acquired = self.transaction(|db| {
            let stolen = db.conn.execute(
                "DELETE FROM sync_lock WHERE project_id = ?1 AND acquired_at < ?2",
                params![project_id, cutoff],
            )?;
            if stolen > 0 {
                tracing::warn!(event = "sync_lock_stale", project_id);
            }
            let inserted = db.conn.execute(
                "INSERT OR IGNORE INTO sync_lock (project_id, acquired_at) VALUES (?1, ?2)",
                params![project_id, acquired_at],
            )?;
            Ok::<_, StoreError>(inserted > 0)
        })?;
        Ok(acquired.then(|| SyncLock {
            store: self.clone(),
            project_id,
            acquired_at,
        }))
    }

    /// Only the row this guard inserted is removed; a lock taken over after
    /// going stale belongs to someone else.
    fn release_lock(&self, project_id: i64, acquired_at: i64) -> Result<(), StoreError> {
        self.read(|db| {
            db.conn.execute(
                "DELETE FROM sync_lock WHERE project_id = ?1 AND acquired_at = ?2",
                params![project_id, acquired_at],
            )?;
            Ok(())
        })
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        match self.store.release_lock(self.project_id, self.acquired_at) {
            Ok(()) => tracing::debug!(event = "sync_lock_released", project_id = self.project_id),
            Err(e) => tracing::warn!(
                event = "sync_lock_release_failed",
                project_id = self.project_id,
                error = %e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixture, now};

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let fx = fixture();
        let timeout = Duration::minutes(30);
        let held = fx.store.try_lock(fx.project, timeout, now()).unwrap();
        assert!(held.is_some());
        assert!(fx.store.try_lock(fx.project, timeout, now()).unwrap().is_none());
        drop(held);
        assert!(fx.store.try_lock(fx.project, timeout, now()).unwrap().is_some());
    }

    #[test]
    fn stale_lock_is_taken_over() {
        let fx = fixture();
        let timeout = Duration::minutes(30);
        let old = fx.store.try_lock(fx.project, timeout, now()).unwrap().unwrap();
        let later = now() + Duration::minutes(31);
        let new = fx.store.try_lock(fx.project, timeout, later).unwrap();
        assert!(new.is_some());

        drop(old);
        let again = fx.store.try_lock(fx.project, timeout, later).unwrap();
        assert!(again.is_none());
    }
}
