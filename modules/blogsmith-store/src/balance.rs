use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use blogsmith_common::BlogsmithError;

/// Credit requirements per service key.
const SERVICE_REQUIREMENTS: &[(&str, f64, &str)] = &[
    ("sources_generation", 3.0, "sources collection"),
    ("outline_generation", 2.0, "outline generation"),
    ("title_generation", 1.0, "title generation"),
    ("blog_generation", 10.0, "blog generation"),
];

fn service_requirement(service_key: &str) -> Option<(f64, &'static str)> {
    SERVICE_REQUIREMENTS
        .iter()
        .find(|(key, _, _)| *key == service_key)
        .map(|(_, credits, description)| (*credits, *description))
}

/// Outcome of a pre-flight balance check.
#[derive(Debug, Clone, PartialEq)]
pub enum BalanceStatus {
    Sufficient {
        current_balance: f64,
        required_balance: f64,
    },
    Insufficient {
        message: String,
        required_balance: f64,
        current_balance: f64,
        shortfall: f64,
        next_refill_time: Option<DateTime<Utc>>,
    },
    AccountNotFound,
    UnknownService {
        service_key: String,
    },
}

#[async_trait]
pub trait BalanceChecker: Send + Sync {
    async fn check(
        &self,
        user_id: Uuid,
        service_key: &str,
    ) -> Result<BalanceStatus, BlogsmithError>;
}

pub struct PgBalanceChecker {
    pool: PgPool,
}

impl PgBalanceChecker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceChecker for PgBalanceChecker {
    async fn check(
        &self,
        user_id: Uuid,
        service_key: &str,
    ) -> Result<BalanceStatus, BlogsmithError> {
        let Some((required_balance, description)) = service_requirement(service_key) else {
            return Ok(BalanceStatus::UnknownService {
                service_key: service_key.to_string(),
            });
        };

        let row: Option<(f64, Option<DateTime<Utc>>)> =
            sqlx::query_as("SELECT credits, next_refill_time FROM accounts WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| BlogsmithError::Database(e.to_string()))?;

        let Some((current_balance, next_refill_time)) = row else {
            return Ok(BalanceStatus::AccountNotFound);
        };

        if current_balance < required_balance {
            return Ok(BalanceStatus::Insufficient {
                message: format!("Insufficient balance for {description}"),
                required_balance,
                current_balance,
                shortfall: required_balance - current_balance,
                next_refill_time,
            });
        }

        Ok(BalanceStatus::Sufficient {
            current_balance,
            required_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_service_has_requirement() {
        let (credits, _) = service_requirement("sources_generation").unwrap();
        assert_eq!(credits, 3.0);
    }

    #[test]
    fn unknown_service_has_none() {
        assert!(service_requirement("nonexistent_service").is_none());
    }
}
