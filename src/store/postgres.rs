//! PostgreSQL implementation of the presence store.
//!
//! Each room is one row of `presence_rooms` holding the mapping as JSONB
//! and a `version` counter. Conditional writes are single statements whose
//! `WHERE` / `ON CONFLICT` clause performs the version check, so the
//! database arbitrates between gateway instances.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::{PresenceStore, VersionToken, Versioned};
use crate::config::GatewayConfig;
use crate::domain::{PresenceMapping, RoomId};
use crate::error::StoreError;

/// PostgreSQL-backed presence store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPresenceStore {
    pool: PgPool,
}

impl PostgresPresenceStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool, for collaborators sharing it.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Connects using the database settings in `config` and applies
    /// pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be
    /// reached or a migration fails.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(unavailable)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        tracing::info!(
            max_connections = config.database_max_connections,
            "postgres presence store ready"
        );
        Ok(Self::new(pool))
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn decode(room: &RoomId, listeners: serde_json::Value) -> Result<PresenceMapping, StoreError> {
    serde_json::from_value(listeners)
        .map_err(|e| StoreError::Corrupt(format!("room {room}: {e}")))
}

fn encode(mapping: &PresenceMapping) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(mapping).map_err(|e| StoreError::Corrupt(e.to_string()))
}

#[async_trait]
impl PresenceStore for PostgresPresenceStore {
    async fn get(&self, room: &RoomId) -> Result<Option<PresenceMapping>, StoreError> {
        let row = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT listeners FROM presence_rooms WHERE room = $1",
        )
        .bind(room.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(|listeners| decode(room, listeners)).transpose()
    }

    async fn get_for_update(&self, room: &RoomId) -> Result<Option<Versioned>, StoreError> {
        let row = sqlx::query_as::<_, (serde_json::Value, i64)>(
            "SELECT listeners, version FROM presence_rooms WHERE room = $1",
        )
        .bind(room.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(|(listeners, version)| {
            Ok(Versioned {
                mapping: decode(room, listeners)?,
                version: VersionToken::new(version),
            })
        })
        .transpose()
    }

    async fn compare_and_swap(
        &self,
        room: &RoomId,
        version: VersionToken,
        mapping: &PresenceMapping,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE presence_rooms \
             SET listeners = $1, version = version + 1, updated_at = now() \
             WHERE room = $2 AND version = $3",
        )
        .bind(encode(mapping)?)
        .bind(room.as_str())
        .bind(version.get())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_if_absent(
        &self,
        room: &RoomId,
        mapping: &PresenceMapping,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO presence_rooms (room, listeners, version) VALUES ($1, $2, 1) \
             ON CONFLICT (room) DO NOTHING",
        )
        .bind(room.as_str())
        .bind(encode(mapping)?)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_non_object() {
        let room = RoomId::from("r");
        let result = decode(&room, serde_json::json!([1, 2, 3]));
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn encode_then_decode_preserves_entries() {
        let room = RoomId::from("r");
        let mapping = PresenceMapping::with_listener("alice".into(), chrono::Utc::now());
        let Ok(json) = encode(&mapping) else {
            panic!("encode failed");
        };
        let Ok(back) = decode(&room, json) else {
            panic!("decode failed");
        };
        assert_eq!(back, mapping);
    }

    #[tokio::test]
    async fn unreachable_database_is_unavailable() {
        let Ok(pool) = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
        else {
            panic!("lazy pool");
        };
        let store = PostgresPresenceStore::new(pool);
        let result = store.get(&RoomId::default()).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at a PostgreSQL server"]
    async fn conditional_writes_are_arbitrated_by_version(pool: PgPool) {
        let store = PostgresPresenceStore::new(pool);
        let room = RoomId::from("r");
        let first = PresenceMapping::with_listener("alice".into(), chrono::Utc::now());

        assert!(matches!(store.set_if_absent(&room, &first).await, Ok(true)));
        assert!(matches!(store.set_if_absent(&room, &first).await, Ok(false)));

        let Ok(Some(read)) = store.get_for_update(&room).await else {
            panic!("entry missing after create");
        };
        let mut next = read.mapping.clone();
        next.touch("bob".into(), chrono::Utc::now());

        assert!(matches!(
            store.compare_and_swap(&room, read.version, &next).await,
            Ok(true)
        ));
        // The version moved on; the same token must not win twice.
        assert!(matches!(
            store.compare_and_swap(&room, read.version, &first).await,
            Ok(false)
        ));

        let Ok(Some(stored)) = store.get(&room).await else {
            panic!("entry missing after swap");
        };
        assert_eq!(stored, next);
    }
}
