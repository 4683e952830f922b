use chrono::{DateTime, Duration, Utc};
use docketcc_common::{normalize_email, validate_docket_number, Frequency, Tier};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{Result, StoreError};
use crate::registry::DocketRegistry;

/// A row from the `users` table. Auth/session columns are managed by the
/// web layer and not surfaced here.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub tier: Tier,
    pub trial_expires_at: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn effective_tier(&self, now: DateTime<Utc>) -> Tier {
        self.tier.effective(self.trial_expires_at, now)
    }
}

/// A row from the `subscriptions` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub docket_number: String,
    pub frequency: Frequency,
    pub last_notified: Option<DateTime<Utc>>,
    pub needs_seed: bool,
    pub created_at: DateTime<Utc>,
}

/// A subscription joined with the subscriber's billing state, which is what
/// payload construction needs.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Subscriber {
    pub subscription_id: i64,
    pub user_id: i64,
    pub email: String,
    pub tier: Tier,
    pub trial_expires_at: Option<DateTime<Utc>>,
    pub docket_number: String,
    pub frequency: Frequency,
    pub needs_seed: bool,
    pub last_notified: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Subscriber {
    pub fn effective_tier(&self, now: DateTime<Utc>) -> Tier {
        self.tier.effective(self.trial_expires_at, now)
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum SubscribeOutcome {
    /// A new subscription row was created. `replaced` lists dockets dropped
    /// to keep a free user at one subscription.
    Created {
        subscription: Subscription,
        replaced: Vec<String>,
    },
    /// The user already subscribed to this docket; nothing changed.
    Existing { subscription: Subscription },
}

impl SubscribeOutcome {
    pub fn subscription(&self) -> &Subscription {
        match self {
            SubscribeOutcome::Created { subscription, .. } => subscription,
            SubscribeOutcome::Existing { subscription } => subscription,
        }
    }
}

const USER_COLUMNS: &str = "id, email, tier, trial_expires_at, stripe_customer_id, created_at";

const SUBSCRIPTION_COLUMNS: &str =
    "id, user_id, docket_number, frequency, last_notified, needs_seed, created_at";

const SUBSCRIBER_SELECT: &str = r#"
    SELECT s.id AS subscription_id, u.id AS user_id, u.email, u.tier, u.trial_expires_at,
           s.docket_number, s.frequency, s.needs_seed, s.last_notified, s.created_at
    FROM subscriptions s
    JOIN users u ON u.id = s.user_id
"#;

/// Users and their docket subscriptions.
#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
    registry: DocketRegistry,
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        let registry = DocketRegistry::new(pool.clone());
        Self { pool, registry }
    }

    pub async fn find_user(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email)?;
        let row = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?1"
        ))
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Case-insensitive get-or-create. New users start on the free tier.
    pub async fn upsert_user(&self, email: &str) -> Result<User> {
        let email = normalize_email(email)?;
        sqlx::query(
            r#"
            INSERT INTO users (email, tier, created_at)
            VALUES (?1, 'free', ?2)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(&email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.find_user(&email)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {email}")))
    }

    /// Billing/admin tier change. Returns false for an unknown user.
    pub async fn set_tier(
        &self,
        email: &str,
        tier: Tier,
        trial_expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let email = normalize_email(email)?;
        let result =
            sqlx::query("UPDATE users SET tier = ?2, trial_expires_at = ?3 WHERE email = ?1")
                .bind(&email)
                .bind(tier)
                .bind(trial_expires_at)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_stripe_customer(&self, email: &str, customer_id: &str) -> Result<bool> {
        let email = normalize_email(email)?;
        let result = sqlx::query("UPDATE users SET stripe_customer_id = ?2 WHERE email = ?1")
            .bind(&email)
            .bind(customer_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Put a user on a trial lasting `days` from `now`.
    pub async fn start_trial(&self, email: &str, days: i64, now: DateTime<Utc>) -> Result<User> {
        let user = self.upsert_user(email).await?;
        self.set_tier(&user.email, Tier::Trial, Some(now + Duration::days(days)))
            .await?;
        self.find_user(&user.email)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user.email)))
    }

    /// Downgrade lapsed trials to free. Returns the number downgraded.
    ///
    /// A downgraded user is brought under the free-tier rule: the oldest
    /// subscription is kept, moved to daily, and the rest are removed.
    pub async fn expire_trials(&self, now: DateTime<Utc>) -> Result<u64> {
        let lapsed = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET tier = 'free'
            WHERE tier = 'trial' AND trial_expires_at IS NOT NULL AND trial_expires_at <= ?1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        for user in &lapsed {
            self.enforce_free_limits(user).await?;
        }

        let expired = lapsed.len() as u64;
        if expired > 0 {
            info!(expired, "Expired trials downgraded to free");
        }
        Ok(expired)
    }

    async fn enforce_free_limits(&self, user: &User) -> Result<()> {
        let subs = self.subscriptions_for_user(user.id).await?;
        let Some((kept, extra)) = subs.split_first() else {
            return Ok(());
        };

        for sub in extra {
            self.delete_subscription(sub).await?;
        }
        if kept.frequency != Frequency::Daily {
            sqlx::query("UPDATE subscriptions SET frequency = 'daily' WHERE id = ?1")
                .bind(kept.id)
                .execute(&self.pool)
                .await?;
        }

        if !extra.is_empty() {
            info!(
                user = %user.email,
                kept = %kept.docket_number,
                removed = extra.len(),
                "Trimmed subscriptions to the free-tier limit"
            );
        }
        Ok(())
    }

    /// Subscribe `email` to a docket.
    ///
    /// Free users hold at most one subscription: any other subscription they
    /// have is removed first. Free users are always on the daily cadence.
    pub async fn subscribe(
        &self,
        email: &str,
        docket_number: &str,
        frequency: Frequency,
    ) -> Result<SubscribeOutcome> {
        let docket_number = validate_docket_number(docket_number)?;
        let now = Utc::now();
        let user = self.upsert_user(email).await?;
        let tier = user.effective_tier(now);

        self.registry.register_or_touch(&docket_number).await?;

        let existing = self.subscriptions_for_user(user.id).await?;
        let mut replaced = Vec::new();

        if tier == Tier::Free {
            for sub in existing.iter().filter(|s| s.docket_number != docket_number) {
                self.delete_subscription(sub).await?;
                replaced.push(sub.docket_number.clone());
            }
        }

        if let Some(current) = existing.into_iter().find(|s| s.docket_number == docket_number) {
            return Ok(SubscribeOutcome::Existing {
                subscription: current,
            });
        }

        let frequency = if tier == Tier::Free {
            Frequency::Daily
        } else {
            frequency
        };

        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            INSERT INTO subscriptions (user_id, docket_number, frequency, needs_seed, created_at)
            VALUES (?1, ?2, ?3, 1, ?4)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&docket_number)
        .bind(frequency)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        self.registry.increment_subscribers(&docket_number).await?;

        info!(
            user = %user.email,
            docket = %docket_number,
            frequency = %frequency,
            replaced = ?replaced,
            "Subscribed"
        );
        Ok(SubscribeOutcome::Created {
            subscription,
            replaced,
        })
    }

    /// Remove a subscription. Returns false if there was none.
    pub async fn unsubscribe(&self, email: &str, docket_number: &str) -> Result<bool> {
        let Some(user) = self.find_user(email).await? else {
            return Ok(false);
        };

        let subs = self.subscriptions_for_user(user.id).await?;
        let mut removed = false;
        for sub in subs.iter().filter(|s| s.docket_number == docket_number) {
            self.delete_subscription(sub).await?;
            removed = true;
        }

        if removed {
            info!(user = %user.email, docket = %docket_number, "Unsubscribed");
        }
        Ok(removed)
    }

    async fn delete_subscription(&self, sub: &Subscription) -> Result<()> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = ?1")
            .bind(sub.id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            self.registry.decrement_subscribers(&sub.docket_number).await?;
        }
        Ok(())
    }

    pub async fn subscriptions_for_user(&self, user_id: i64) -> Result<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = ?1 ORDER BY id ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn subscribers_for_docket(&self, docket_number: &str) -> Result<Vec<Subscriber>> {
        let rows = sqlx::query_as::<_, Subscriber>(&format!(
            "{SUBSCRIBER_SELECT} WHERE s.docket_number = ?1 ORDER BY s.id ASC"
        ))
        .bind(docket_number)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn subscriber(&self, subscription_id: i64) -> Result<Option<Subscriber>> {
        let row = sqlx::query_as::<_, Subscriber>(&format!("{SUBSCRIBER_SELECT} WHERE s.id = ?1"))
            .bind(subscription_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    /// Subscriptions that have not yet received their catch-up digest.
    pub async fn subscribers_needing_seed(&self) -> Result<Vec<Subscriber>> {
        let rows = sqlx::query_as::<_, Subscriber>(&format!(
            "{SUBSCRIBER_SELECT} WHERE s.needs_seed = 1 ORDER BY s.id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn mark_seeded(&self, subscription_id: i64) -> Result<()> {
        sqlx::query("UPDATE subscriptions SET needs_seed = 0 WHERE id = ?1")
            .bind(subscription_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a delivery against every subscription `email` holds on the docket.
    pub async fn touch_last_notified(
        &self,
        email: &str,
        docket_number: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE subscriptions SET last_notified = ?3
            WHERE docket_number = ?2
              AND user_id IN (SELECT id FROM users WHERE email = ?1)
            "#,
        )
        .bind(email)
        .bind(docket_number)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
