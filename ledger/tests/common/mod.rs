//! Shared fixtures for ledger integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use arena_core::ids::UserId;
use arena_core::tournament::{NewTournament, Region, Tournament};
use arena_core::wallet::{Currency, Transaction};
use arena_core::{Decimal, ids::GameId};
use arena_ledger::ArenaService;
use arena_runtime::RetryPolicy;
use arena_testing::{
    FixedClock, FlakyCollectionStore, InMemoryCollectionStore, SequentialIdGenerator, test_clock,
};
use std::sync::Arc;
use std::time::Duration;

/// A service over a fault-injecting in-memory store with a pinned clock.
pub struct Harness {
    pub store: Arc<FlakyCollectionStore>,
    pub service: ArenaService,
    pub clock: FixedClock,
}

/// Two retries, millisecond backoff, no jitter: three save attempts.
pub fn fast_retries() -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(2)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
        .jitter(false)
        .build()
}

impl Harness {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    /// Store calls take `latency`, widening race windows.
    pub fn with_latency(latency: Duration) -> Self {
        arena_testing::init_tracing();
        let store = Arc::new(FlakyCollectionStore::wrap(
            InMemoryCollectionStore::with_latency(latency),
        ));
        let clock = test_clock();
        let service = ArenaService::new(
            store.clone(),
            fast_retries(),
            Arc::new(clock.clone()),
            Arc::new(SequentialIdGenerator::new()),
        );
        Self {
            store,
            service,
            clock,
        }
    }

    /// Register a user with an empty wallet.
    pub async fn user(&self, id: &str) -> UserId {
        let user_id = UserId::new(id);
        self.service
            .register_user(user_id.clone(), format!("Player {id}"), Region::India)
            .await
            .expect("register user");
        user_id
    }

    /// Register a user and grant credits through an admin adjustment.
    pub async fn user_with_credits(&self, id: &str, credits: Decimal) -> UserId {
        let user_id = self.user(id).await;
        self.service
            .adjust_balance(
                user_id.clone(),
                Currency::Credits,
                credits,
                "Opening balance".to_string(),
            )
            .await
            .expect("seed credits");
        user_id
    }

    pub async fn tournament(&self, total_spots: u32, entry_fee: Decimal) -> Tournament {
        self.service
            .create_tournament(NewTournament {
                game_id: GameId::new("chess"),
                name: "Friday Blitz".to_string(),
                region: Region::India,
                total_spots,
                entry_fee,
                starts_at: None,
            })
            .await
            .expect("create tournament")
    }

    /// Transactions persisted in the log collection, in append order.
    pub fn logged_transactions(&self) -> Vec<Transaction> {
        self.store.inner().documents::<Transaction>()
    }

    pub fn logged_for(&self, user_id: &UserId) -> Vec<Transaction> {
        self.logged_transactions()
            .into_iter()
            .filter(|t| &t.user_id == user_id)
            .collect()
    }
}
