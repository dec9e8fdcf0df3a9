// src/services/kv_store.rs
use crate::models::ServiceError;
use log::{error, info};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

type Entries = HashMap<String, (String, Option<Instant>)>;

/// TTL-bound key-value store for OTPs, pending registrations and rate-limit counters.
///
/// Backed by Redis when `REDIS_URI` is configured, otherwise by a process-local map
/// with lazy expiry (used by tests and single-instance deployments).
#[derive(Clone)]
pub enum KvStore {
    Memory(Arc<Mutex<Entries>>),
    Redis(ConnectionManager),
}

impl KvStore {
    pub fn in_memory() -> Self {
        KvStore::Memory(Arc::new(Mutex::new(HashMap::new())))
    }

    pub async fn connect_redis(uri: &str) -> Result<Self, ServiceError> {
        let client = redis::Client::open(uri)?;
        let manager = ConnectionManager::new(client).await?;
        info!("🔌 Connected to Redis");
        Ok(KvStore::Redis(manager))
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), ServiceError> {
        match self {
            KvStore::Memory(entries) => {
                lock(entries)?.insert(
                    key.to_string(),
                    (value.to_string(), Some(Instant::now() + ttl)),
                );
                Ok(())
            }
            KvStore::Redis(manager) => {
                let mut conn = manager.clone();
                let _: () = redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("EX")
                    .arg(ttl.as_secs().max(1))
                    .query_async(&mut conn)
                    .await?;
                Ok(())
            }
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        match self {
            KvStore::Memory(entries) => {
                let mut entries = lock(entries)?;
                Ok(live_value(&mut entries, key))
            }
            KvStore::Redis(manager) => {
                let mut conn = manager.clone();
                let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
                Ok(value)
            }
        }
    }

    pub async fn del(&self, key: &str) -> Result<(), ServiceError> {
        match self {
            KvStore::Memory(entries) => {
                lock(entries)?.remove(key);
                Ok(())
            }
            KvStore::Redis(manager) => {
                let mut conn = manager.clone();
                let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
                Ok(())
            }
        }
    }

    // Atomically read and delete, so a value can be consumed at most once
    pub async fn take(&self, key: &str) -> Result<Option<String>, ServiceError> {
        match self {
            KvStore::Memory(entries) => {
                let mut entries = lock(entries)?;
                let value = live_value(&mut entries, key);
                entries.remove(key);
                Ok(value)
            }
            KvStore::Redis(manager) => {
                let mut conn = manager.clone();
                let value: Option<String> =
                    redis::cmd("GETDEL").arg(key).query_async(&mut conn).await?;
                Ok(value)
            }
        }
    }

    /// Increments a fixed-window counter, starting the window on the first hit.
    pub async fn incr_window(&self, key: &str, window: Duration) -> Result<u64, ServiceError> {
        match self {
            KvStore::Memory(entries) => {
                let mut entries = lock(entries)?;
                let count = live_value(&mut entries, key)
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(0)
                    + 1;
                let expires_at = match entries.get(key) {
                    Some((_, expires_at)) if count > 1 => *expires_at,
                    _ => Some(Instant::now() + window),
                };
                entries.insert(key.to_string(), (count.to_string(), expires_at));
                Ok(count)
            }
            KvStore::Redis(manager) => {
                let mut conn = manager.clone();
                let (count,): (u64,) = window_pipeline(key, window).query_async(&mut conn).await?;
                Ok(count)
            }
        }
    }
}

// Seeds the counter with its expiry and increments it in one MULTI/EXEC, so no key outlives its window
fn window_pipeline(key: &str, window: Duration) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET")
        .arg(key)
        .arg(0)
        .arg("EX")
        .arg(window.as_secs().max(1))
        .arg("NX")
        .ignore()
        .incr(key, 1);
    pipe
}

fn lock(entries: &Mutex<Entries>) -> Result<MutexGuard<'_, Entries>, ServiceError> {
    entries.lock().map_err(|_| {
        error!("❌ In-memory key-value store lock poisoned");
        ServiceError::InternalServerError
    })
}

// Returns the value if present and unexpired, evicting it otherwise
fn live_value(entries: &mut Entries, key: &str) -> Option<String> {
    match entries.get(key) {
        Some((_, Some(expires_at))) if Instant::now() >= *expires_at => {
            entries.remove(key);
            None
        }
        Some((value, _)) => Some(value.clone()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn take_consumes_the_value() {
        let kv = KvStore::in_memory();
        kv.set_ex("otp:a@x.com", "123456", Duration::from_secs(600)).await.unwrap();
        assert_eq!(kv.take("otp:a@x.com").await.unwrap().as_deref(), Some("123456"));
        assert_eq!(kv.take("otp:a@x.com").await.unwrap(), None);
    }

    #[actix_rt::test]
    async fn expired_values_are_invisible() {
        let kv = KvStore::in_memory();
        kv.set_ex("k", "v", Duration::from_millis(0)).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), None);
    }

    #[test]
    fn window_counter_sets_expiry_with_the_increment() {
        let pipe = window_pipeline("rl:/auth/login:1.2.3.4", Duration::from_secs(60));
        let packed = String::from_utf8_lossy(&pipe.get_packed_pipeline()).to_string();
        let commands: Vec<&str> = ["MULTI", "SET", "EX", "NX", "INCR", "EXEC"]
            .into_iter()
            .filter(|c| packed.contains(&format!("\r\n{}\r\n", c)))
            .collect();
        assert_eq!(commands, vec!["MULTI", "SET", "EX", "NX", "INCR", "EXEC"]);
        assert!(packed.find("SET").unwrap() < packed.find("INCR").unwrap());
    }

    #[actix_rt::test]
    async fn window_counter_counts_and_resets() {
        let kv = KvStore::in_memory();
        assert_eq!(kv.incr_window("rl", Duration::from_secs(60)).await.unwrap(), 1);
        assert_eq!(kv.incr_window("rl", Duration::from_secs(60)).await.unwrap(), 2);

        kv.set_ex("short", "5", Duration::from_millis(0)).await.unwrap();
        assert_eq!(kv.incr_window("short", Duration::from_secs(60)).await.unwrap(), 1);
    }
}
