// Run-level advisory lock

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};

use crate::error::StoreError;
use crate::schema::{from_ts, to_ts};
use crate::Store;

/// Held run lock. The row is deleted when the guard drops.
#[derive(Debug)]
pub struct RunLock<'a> {
    store: &'a Store,
    name: String,
    holder: String,
}

impl<'a> RunLock<'a> {
    pub(crate) fn acquire(
        store: &'a Store,
        name: &str,
        holder: &str,
        stale_after: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, StoreError> {
        let tx = store.conn.unchecked_transaction()?;

        let current: Option<(String, String)> = tx
            .query_row(
                "SELECT holder, acquired_at FROM run_lock WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((other, acquired_at)) = current {
            let since = from_ts("run_lock", name, &acquired_at)?;
            if now - since < stale_after {
                return Err(StoreError::LockHeld { holder: other, since });
            }
            log::warn!("taking over stale run lock '{name}' held by {other} since {since}");
            tx.execute("DELETE FROM run_lock WHERE name = ?1", params![name])?;
        }

        tx.execute(
            "INSERT INTO run_lock (name, holder, acquired_at) VALUES (?1, ?2, ?3)",
            params![name, holder, to_ts(now)],
        )?;
        tx.commit()?;

        log::debug!("run lock '{name}' acquired by {holder}");
        Ok(Self {
            store,
            name: name.to_string(),
            holder: holder.to_string(),
        })
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }
}

impl Drop for RunLock<'_> {
    fn drop(&mut self) {
        let result = self.store.conn.execute(
            "DELETE FROM run_lock WHERE name = ?1 AND holder = ?2",
            params![self.name, self.holder],
        );
        match result {
            Ok(_) => log::debug!("run lock '{}' released", self.name),
            Err(e) => log::warn!("failed to release run lock '{}': {}", self.name, e),
        }
    }
}
