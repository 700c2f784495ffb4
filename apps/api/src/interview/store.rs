//! Session Store — process-wide map from session id to session state.
//!
//! Each session sits behind its own mutex so mutations on one session are
//! serialized without blocking any other session. The map-level lock is held
//! only long enough to look up or insert an entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::models::Session;

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    next_seq: AtomicU64,
    /// Idle lifetime. `None` keeps sessions for the life of the process.
    ttl: Option<Duration>,
}

impl SessionStore {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            ttl,
        }
    }

    /// Creates a session in the INTRO phase and returns its id.
    pub async fn create(&self) -> String {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let id = format!("session_{seq}_{suffix}");

        let session = Session::new(id.clone(), Utc::now());
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(session)));

        debug!("Created session {id}");
        id
    }

    /// Returns a snapshot of the session.
    pub async fn get(&self, id: &str) -> Result<Session, AppError> {
        let entry = self.entry(id).await?;
        let session = entry.lock().await;
        if self.is_expired(&session, Utc::now()) {
            return Err(AppError::SessionNotFound(id.to_string()));
        }
        Ok(session.clone())
    }

    /// Applies one atomic update to a session.
    ///
    /// The mutation runs against a draft copy while the session lock is held;
    /// the draft replaces the stored session only if the mutation returns `Ok`.
    /// Concurrent `apply` calls on the same id are serialized.
    pub async fn apply<T, F>(&self, id: &str, mutation: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Session) -> Result<T, AppError>,
    {
        let entry = self.entry(id).await?;
        let mut session = entry.lock().await;
        let now = Utc::now();
        if self.is_expired(&session, now) {
            return Err(AppError::SessionNotFound(id.to_string()));
        }

        let mut draft = session.clone();
        let output = mutation(&mut draft)?;
        draft.last_activity = now;
        *session = draft;
        Ok(output)
    }

    /// Removes every session idle past the TTL. Sessions locked by an
    /// in-flight mutation are skipped. Returns the number evicted.
    pub async fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| match entry.try_lock() {
            Ok(session) => !self.is_expired(&session, now),
            Err(_) => true,
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {evicted} expired session(s), {} remaining", sessions.len());
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn entry(&self, id: &str) -> Result<Arc<Mutex<Session>>, AppError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))
    }

    fn is_expired(&self, session: &Session, now: DateTime<Utc>) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now.signed_duration_since(session.last_activity) > ttl,
            // Beyond chrono's range: never expires.
            Err(_) => false,
        }
    }
}

/// Periodically evicts expired sessions until the runtime shuts down.
pub async fn run_sweeper(store: Arc<SessionStore>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        store.evict_expired(Utc::now()).await;
    }
}
