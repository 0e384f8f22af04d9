//! In-memory index of registered e-mail addresses in front of `users.email`.
//!
//! The cuckoo filter holds every registered address and can say "certainly
//! not registered". The moka cache holds recent registrations plus addresses
//! the database confirmed, and can say "certainly registered". Anything else
//! has to be asked from the database.

use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use chrono::{Duration, NaiveDateTime, Utc};
use futures::StreamExt;
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::fmt;
use std::sync::RwLock;

const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

const CONFIRMED_CAPACITY: u64 = 500_000;
const CONFIRMED_TTL: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

static REGISTERED: Lazy<RwLock<CuckooFilter<String>>> =
    Lazy::new(|| RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)));

static CONFIRMED: Lazy<Cache<String, ()>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(CONFIRMED_CAPACITY)
        .time_to_live(CONFIRMED_TTL)
        .build()
});

/// An address in the form it is stored in `users.email`: trimmed, lower case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailKey(String);

impl EmailKey {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EmailKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Absent,
    Registered,
    /// The filter can't rule it out; check the table
    Unknown,
}

pub async fn presence(email: &EmailKey) -> Presence {
    // a poisoned lock answers "maybe"
    let maybe = REGISTERED
        .read()
        .map(|filter| filter.contains(&email.0))
        .unwrap_or(true);
    if !maybe {
        return Presence::Absent;
    }

    if CONFIRMED.get(&email.0).await.is_some() {
        Presence::Registered
    } else {
        Presence::Unknown
    }
}

/// Records an address that is now in the table (committed registration or a database hit).
pub async fn remember(email: &EmailKey) {
    if let Ok(mut filter) = REGISTERED.write() {
        filter.add(&email.0);
    }
    CONFIRMED.insert(email.0.clone(), ()).await;
}

#[derive(Debug, Default)]
struct WarmupBatch {
    all: Vec<String>,
    recent: Vec<String>,
}

impl WarmupBatch {
    /// Returns true when the address also goes into the cache.
    fn push(&mut self, email: &str, created_at: NaiveDateTime, cutoff: NaiveDateTime) -> bool {
        let key = EmailKey::new(email).0;
        let recent = created_at >= cutoff;
        if recent {
            self.recent.push(key.clone());
        }
        self.all.push(key);
        recent
    }

    fn len(&self) -> usize {
        self.all.len()
    }

    async fn flush(&mut self) -> Result<()> {
        {
            let mut filter = REGISTERED
                .write()
                .map_err(|_| anyhow!("email filter lock poisoned"))?;
            for key in &self.all {
                filter.add(key);
            }
        }
        self.all.clear();

        for key in self.recent.drain(..) {
            CONFIRMED.insert(key, ()).await;
        }
        Ok(())
    }
}

/// Streams `users` once: every address goes into the filter, those registered
/// within `recent_days` also into the cache.
pub async fn warmup(pool: &MySqlPool, recent_days: i64, batch_size: usize) -> Result<()> {
    let batch_size = batch_size.max(1);
    let cutoff = Utc::now().naive_utc() - Duration::days(recent_days);

    let mut rows =
        sqlx::query_as::<_, (String, NaiveDateTime)>("SELECT email, created_at FROM users")
            .fetch(pool);

    let mut batch = WarmupBatch::default();
    let (mut total, mut recent) = (0usize, 0usize);

    while let Some(row) = rows.next().await {
        let (email, created_at) = row?;
        total += 1;
        if batch.push(&email, created_at, cutoff) {
            recent += 1;
        }

        if batch.len() >= batch_size {
            batch.flush().await?;
        }
    }
    batch.flush().await?;

    log::info!(
        "Email index ready: {} registered, {} cached from the last {} days",
        total,
        recent,
        recent_days
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_trimmed_lower_case() {
        assert_eq!(EmailKey::new("  Jane.Doe@Corp.IO ").as_str(), "jane.doe@corp.io");
        assert!(EmailKey::new("   ").is_empty());
    }

    #[actix_web::test]
    async fn unseen_address_is_absent() {
        let key = EmailKey::new("never.registered@index.io");
        assert_eq!(presence(&key).await, Presence::Absent);
    }

    #[actix_web::test]
    async fn remembered_address_is_registered_in_any_case() {
        remember(&EmailKey::new("Remembered@Index.io")).await;
        assert_eq!(
            presence(&EmailKey::new("remembered@index.IO")).await,
            Presence::Registered
        );
    }

    #[actix_web::test]
    async fn warmup_caches_only_recent_registrations() {
        let now = Utc::now().naive_utc();
        let cutoff = now - Duration::days(30);

        let mut batch = WarmupBatch::default();
        assert!(!batch.push("Old.Timer@index.io", now - Duration::days(400), cutoff));
        assert!(batch.push("new.joiner@index.io", now, cutoff));
        assert_eq!(batch.len(), 2);

        batch.flush().await.unwrap();
        assert_eq!(batch.len(), 0);

        // in the filter, but only the database can confirm it
        assert_eq!(
            presence(&EmailKey::new("old.timer@index.io")).await,
            Presence::Unknown
        );
        assert_eq!(
            presence(&EmailKey::new("new.joiner@index.io")).await,
            Presence::Registered
        );
    }
}
