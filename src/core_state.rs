//! Transport-agnostic application state.
//!
//! `CoreState` is the single shared state behind every endpoint. Wrapped in
//! `Arc` at startup. Reference data (catalog, promo registry) is immutable
//! and read without locking; the SQLite connection sits behind a mutex with
//! short critical sections; conversation ordering is enforced by per-user
//! async locks so different users proceed fully in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::OwnedMutexGuard;

use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::db::DatabaseError;
use crate::matcher::{KeywordScorer, SymptomMatcher, SymptomScorer};
use crate::promo::PromoRegistry;
use crate::report_gate::GatePolicy;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("state lock poisoned")]
    LockPoisoned,
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub struct CoreState {
    db: Mutex<Connection>,
    pub catalog: Arc<Catalog>,
    pub promos: PromoRegistry,
    pub matcher: SymptomMatcher,
    pub policy: GatePolicy,
    pub config: AppConfig,
    /// One lock per user id; serializes that user's conversation turns.
    user_locks: tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CoreState {
    /// Assemble state around an already-opened connection, using the
    /// default keyword scorer.
    pub fn new(config: AppConfig, conn: Connection) -> Self {
        Self::with_scorer(config, conn, Arc::new(KeywordScorer))
    }

    /// Assemble state with an injected symptom scorer.
    pub fn with_scorer(
        config: AppConfig,
        conn: Connection,
        scorer: Arc<dyn SymptomScorer>,
    ) -> Self {
        let catalog = Arc::new(Catalog::with_seed_data());
        let matcher = SymptomMatcher::new(
            Arc::clone(&catalog),
            scorer,
            config.max_suggestions,
            config.min_score,
            config.matcher_budget,
        );
        let policy = GatePolicy::new(config.lockout_threshold, config.lockout_window);

        Self {
            db: Mutex::new(conn),
            catalog,
            promos: PromoRegistry::with_seed_data(),
            matcher,
            policy,
            config,
            user_locks: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// In-memory state for tests.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        let conn = crate::db::open_memory_database().expect("in-memory database");
        Self::new(AppConfig::default(), conn)
    }

    /// Run `f` with exclusive access to the database connection.
    ///
    /// The guard is a std mutex: keep the critical section synchronous and
    /// never hold it across an `.await`.
    pub fn with_db<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, CoreError> {
        let mut conn = self.db.lock().map_err(|_| CoreError::LockPoisoned)?;
        Ok(f(&mut conn)?)
    }

    /// Acquire this user's conversation lock. Turns for one user are
    /// processed in arrival order; other users are unaffected.
    pub async fn user_lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.user_locks.lock().await;
            Arc::clone(
                locks
                    .entry(user_id.to_string())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn user_locks_are_per_user() {
        let state = CoreState::in_memory();

        let guard_a = state.user_lock("alice").await;
        // A different user's lock is acquirable while alice's is held.
        let guard_b = state.user_lock("bob").await;
        drop(guard_a);
        drop(guard_b);

        // Reacquiring after drop must not deadlock.
        let _again = state.user_lock("alice").await;
    }

    #[tokio::test]
    async fn same_user_lock_is_exclusive() {
        let state = Arc::new(CoreState::in_memory());

        let guard = state.user_lock("alice").await;
        let contender = {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                let _g = state.user_lock("alice").await;
            })
        };

        // The contender cannot finish while the guard is held.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[test]
    fn with_db_runs_queries() {
        let state = CoreState::in_memory();
        let count = state.with_db(|conn| crate::db::count_tables(conn)).unwrap();
        assert!(count >= 6);
    }
}
