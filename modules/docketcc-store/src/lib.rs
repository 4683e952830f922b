//! SQLite persistence for the DocketCC pipeline.
//!
//! One struct per table family, each holding a cloned pool. Every write is a
//! single statement or a short fixed sequence; nothing here opens a
//! multi-statement transaction.

pub mod db;
pub mod error;
pub mod filings;
pub mod queue;
pub mod registry;
pub mod system_log;
pub mod users;

pub use db::{connect, memory_pool, migrate};
pub use error::{Result, StoreError};
pub use filings::{FilingStats, FilingStore, StatusCount, StoreOutcome, StoredFiling};
pub use queue::{NewQueueEntry, NotificationQueue, QueueEntry, QueueStats, UnnotifiedPair};
pub use registry::{DocketEntry, DocketRegistry, PollResult};
pub use system_log::{LogEntry, StoredLogEntry, SystemLog};
pub use users::{SubscribeOutcome, Subscriber, Subscription, User, UserStore};
