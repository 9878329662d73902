//! PostgreSQL-backed push transport shared between gateway instances.
//!
//! `push_channels` maps every channel address to its token, so a token
//! issued by one instance can be attached on any other. A send checks the
//! registry and publishes `{token, payload}` with `pg_notify`; every
//! instance runs a [`PgListener`] that hands notifications to its local
//! [`ChannelHub`], which reaches the WebSocket clients attached there.
//!
//! Registry rows expire like hub channels: once idle for the hub's TTL.
//! Each instance periodically refreshes the rows of its attached clients
//! so a long-lived connection keeps its channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::{ChannelHandle, ChannelHub, ChannelSource, Transport};
use crate::domain::ChannelAddress;
use crate::error::TransportError;

/// `LISTEN`/`NOTIFY` channel carrying push payloads.
pub const NOTIFY_CHANNEL: &str = "roomcast_push";

/// PostgreSQL rejects notification payloads of 8000 bytes or more.
const MAX_NOTIFICATION_BYTES: usize = 7999;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize, Deserialize)]
struct PushNotification {
    token: String,
    payload: String,
}

fn encode_notification(token: String, payload: String) -> Result<String, TransportError> {
    let encoded = serde_json::to_string(&PushNotification { token, payload })
        .map_err(|e| TransportError::Payload(e.to_string()))?;
    if encoded.len() > MAX_NOTIFICATION_BYTES {
        return Err(TransportError::Payload(format!(
            "{} bytes exceeds the {MAX_NOTIFICATION_BYTES}-byte notification limit",
            encoded.len()
        )));
    }
    Ok(encoded)
}

fn unavailable(err: sqlx::Error) -> TransportError {
    TransportError::Unavailable(err.to_string())
}

/// [`Transport`] and [`ChannelSource`] backed by a shared PostgreSQL
/// registry, delivering through a local [`ChannelHub`].
#[derive(Debug)]
pub struct PostgresTransport {
    pool: PgPool,
    hub: Arc<ChannelHub>,
    tasks: Vec<JoinHandle<()>>,
}

impl PostgresTransport {
    /// Subscribes to [`NOTIFY_CHANNEL`] and starts relaying notifications
    /// into `hub`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unavailable`] if the listener connection
    /// cannot be established.
    pub async fn start(pool: PgPool, hub: Arc<ChannelHub>) -> Result<Self, TransportError> {
        let mut listener = PgListener::connect_with(&pool).await.map_err(unavailable)?;
        listener.listen(NOTIFY_CHANNEL).await.map_err(unavailable)?;

        let refresh_every = (hub.idle_ttl() / 4)
            .to_std()
            .unwrap_or(Duration::from_secs(60))
            .max(Duration::from_secs(1));
        let tasks = vec![
            tokio::spawn(relay_notifications(listener, Arc::clone(&hub))),
            tokio::spawn(refresh_attached(
                pool.clone(),
                Arc::clone(&hub),
                refresh_every,
            )),
        ];
        tracing::info!(channel = NOTIFY_CHANNEL, "shared push transport listening");
        Ok(Self { pool, hub, tasks })
    }

    /// Deletes registry rows idle for longer than the hub's TTL and sweeps
    /// the local hub.
    async fn expire_idle(&self) {
        let result = sqlx::query(
            "DELETE FROM push_channels \
             WHERE last_active < now() - make_interval(secs => $1::float8)",
        )
        .bind(self.hub.idle_ttl().num_seconds())
        .execute(&self.pool)
        .await;
        match result {
            Ok(done) if done.rows_affected() > 0 => {
                tracing::debug!(expired = done.rows_affected(), "idle shared channels expired");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "shared channel expiry failed"),
        }
        self.hub.evict_idle().await;
    }
}

impl Drop for PostgresTransport {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[async_trait]
impl Transport for PostgresTransport {
    async fn create_channel(
        &self,
        address: &ChannelAddress,
    ) -> Result<ChannelHandle, TransportError> {
        let token = sqlx::query_scalar::<_, String>(
            "INSERT INTO push_channels (address, token) VALUES ($1, $2) \
             ON CONFLICT (address) DO UPDATE SET last_active = now() \
             RETURNING token",
        )
        .bind(address.as_str())
        .bind(uuid::Uuid::new_v4().to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;

        self.hub.open_with_token(address, &token).await;
        self.expire_idle().await;
        Ok(ChannelHandle::new(token))
    }

    async fn send(&self, address: &ChannelAddress, payload: String) -> Result<(), TransportError> {
        let token = sqlx::query_scalar::<_, String>(
            "SELECT token FROM push_channels WHERE address = $1",
        )
        .bind(address.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        .ok_or_else(|| TransportError::UnknownChannel(address.to_string()))?;

        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(NOTIFY_CHANNEL)
            .bind(encode_notification(token, payload)?)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

#[async_trait]
impl ChannelSource for PostgresTransport {
    async fn attach(
        &self,
        token: &str,
    ) -> Result<(ChannelAddress, broadcast::Receiver<String>), TransportError> {
        let address = sqlx::query_scalar::<_, String>(
            "UPDATE push_channels SET last_active = now() WHERE token = $1 RETURNING address",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        .ok_or(TransportError::UnknownToken)?;

        self.hub
            .open_with_token(&ChannelAddress::from_encoded(address), token)
            .await;
        self.hub.attach(token).await
    }

    async fn detach(&self, address: &ChannelAddress) {
        self.hub.detach(address).await;
        let result = sqlx::query("UPDATE push_channels SET last_active = now() WHERE address = $1")
            .bind(address.as_str())
            .execute(&self.pool)
            .await;
        if let Err(e) = result {
            tracing::warn!(%address, error = %e, "channel detach not recorded");
        }
    }

    async fn channel_count(&self) -> usize {
        self.hub.channel_count().await
    }
}

async fn relay_notifications(mut listener: PgListener, hub: Arc<ChannelHub>) {
    loop {
        match listener.recv().await {
            Ok(notification) => {
                match serde_json::from_str::<PushNotification>(notification.payload()) {
                    Ok(push) => {
                        let receivers = hub.deliver(&push.token, push.payload).await;
                        tracing::trace!(receivers, "push notification relayed");
                    }
                    Err(e) => tracing::warn!(error = %e, "malformed push notification ignored"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "push listener interrupted; reconnecting");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

async fn refresh_attached(pool: PgPool, hub: Arc<ChannelHub>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        let tokens = hub.attached_tokens().await;
        if tokens.is_empty() {
            continue;
        }
        let attached = tokens.len();
        let result =
            sqlx::query("UPDATE push_channels SET last_active = now() WHERE token = ANY($1)")
                .bind(tokens)
                .execute(&pool)
                .await;
        match result {
            Ok(_) => tracing::trace!(attached, "attached channels refreshed"),
            Err(e) => tracing::warn!(error = %e, "attached channel refresh failed"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{ListenerId, RoomId};
    use sqlx::postgres::PgPoolOptions;

    fn unreachable_transport() -> PostgresTransport {
        let Ok(pool) = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://nobody@127.0.0.1:1/none")
        else {
            panic!("lazy pool");
        };
        PostgresTransport {
            pool,
            hub: Arc::new(ChannelHub::new(16)),
            tasks: Vec::new(),
        }
    }

    fn address(id: &str) -> ChannelAddress {
        ChannelAddress::new(&ListenerId::from(id), &RoomId::from("room1"))
    }

    #[test]
    fn notification_carries_token_and_payload() {
        let Ok(encoded) = encode_notification("t-1".into(), "{\"a\":1}".into()) else {
            panic!("small payload rejected");
        };
        let Ok(decoded) = serde_json::from_str::<PushNotification>(&encoded) else {
            panic!("notification is not JSON");
        };
        assert_eq!(decoded.token, "t-1");
        assert_eq!(decoded.payload, "{\"a\":1}");
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let result = encode_notification("t-1".into(), "x".repeat(MAX_NOTIFICATION_BYTES));
        assert!(matches!(result, Err(TransportError::Payload(_))));
    }

    #[tokio::test]
    async fn unreachable_registry_is_unavailable() {
        let transport = unreachable_transport();
        assert!(matches!(
            transport.create_channel(&address("alice")).await,
            Err(TransportError::Unavailable(_))
        ));
        assert!(matches!(
            transport.send(&address("alice"), "x".into()).await,
            Err(TransportError::Unavailable(_))
        ));
        assert!(matches!(
            transport.attach("token").await,
            Err(TransportError::Unavailable(_))
        ));
    }

    async fn next_payload(rx: &mut broadcast::Receiver<String>) -> String {
        let Ok(Ok(payload)) = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await else {
            panic!("no payload relayed");
        };
        payload
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at a PostgreSQL server"]
    async fn instances_deliver_to_each_others_clients(pool: PgPool) {
        let (Ok(instance_a), Ok(instance_b)) = (
            PostgresTransport::start(pool.clone(), Arc::new(ChannelHub::new(16))).await,
            PostgresTransport::start(pool, Arc::new(ChannelHub::new(16))).await,
        ) else {
            panic!("transport start failed");
        };

        // Bob joins through B and connects there.
        let Ok(bob) = instance_b.create_channel(&address("bob")).await else {
            panic!("create failed");
        };
        let Ok((_, mut bob_rx)) = instance_b.attach(bob.token()).await else {
            panic!("attach failed");
        };

        assert!(instance_a.send(&address("bob"), "hello".into()).await.is_ok());
        assert_eq!(next_payload(&mut bob_rx).await, "hello");

        // A token issued by B can be attached through A as well.
        let Ok((attached_to, mut via_a)) = instance_a.attach(bob.token()).await else {
            panic!("cross-instance attach failed");
        };
        assert_eq!(attached_to, address("bob"));
        assert!(instance_b.send(&address("bob"), "again".into()).await.is_ok());
        assert_eq!(next_payload(&mut via_a).await, "again");
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at a PostgreSQL server"]
    async fn registry_rejects_unknown_addresses_and_tokens(pool: PgPool) {
        let Ok(transport) = PostgresTransport::start(pool, Arc::new(ChannelHub::new(16))).await
        else {
            panic!("transport start failed");
        };
        assert!(matches!(
            transport.send(&address("ghost"), "x".into()).await,
            Err(TransportError::UnknownChannel(_))
        ));
        assert!(matches!(
            transport.attach("forged").await,
            Err(TransportError::UnknownToken)
        ));

        let Ok(first) = transport.create_channel(&address("alice")).await else {
            panic!("create failed");
        };
        let Ok(second) = transport.create_channel(&address("alice")).await else {
            panic!("create failed");
        };
        assert_eq!(first, second);
    }
}
