//! Per-owner, per-provider cost ceilings over the usage ledger.
//!
//! `reserve` is a read-side check against the daily and monthly sums;
//! `commit` is the single atomic write. A call that lands between another
//! call's reserve and commit can overshoot by at most one in-flight call,
//! which completed work is allowed to do.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use binlift_domain::entities::{OperationType, day_bucket, month_bucket};
use binlift_domain::error::{Error, Result};
use binlift_domain::ports::{BudgetGate, UsageRepository};
use tracing::debug;

use super::clock::Clock;

/// Ceilings for one provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderBudget {
    /// Daily ceiling in USD.
    pub daily_usd: f64,
    /// Monthly ceiling in USD.
    pub monthly_usd: f64,
}

/// Budget gate over the usage repository.
pub struct BudgetService {
    usage: Arc<dyn UsageRepository>,
    clock: Arc<dyn Clock>,
    budgets: HashMap<String, ProviderBudget>,
}

impl BudgetService {
    /// Create the gate with per-provider ceilings.
    #[must_use]
    pub fn new(
        usage: Arc<dyn UsageRepository>,
        clock: Arc<dyn Clock>,
        budgets: HashMap<String, ProviderBudget>,
    ) -> Self {
        Self {
            usage,
            clock,
            budgets,
        }
    }
}

#[async_trait]
impl BudgetGate for BudgetService {
    async fn reserve(&self, owner: &str, provider_id: &str, estimated_cost: f64) -> Result<()> {
        let Some(budget) = self.budgets.get(provider_id) else {
            return Ok(());
        };
        let now = self.clock.now();
        let day = day_bucket(now);
        let month = month_bucket(now);

        let spent_today = self.usage.cost_for_day(owner, provider_id, &day).await?;
        if spent_today + estimated_cost > budget.daily_usd {
            return Err(Error::CostLimitExceeded {
                owner: owner.to_owned(),
                provider: provider_id.to_owned(),
                message: format!(
                    "daily ceiling: {spent_today:.4} spent + {estimated_cost:.4} estimated > {:.4} USD",
                    budget.daily_usd
                ),
            });
        }

        let spent_this_month = self.usage.cost_for_month(owner, provider_id, &month).await?;
        if spent_this_month + estimated_cost > budget.monthly_usd {
            return Err(Error::CostLimitExceeded {
                owner: owner.to_owned(),
                provider: provider_id.to_owned(),
                message: format!(
                    "monthly ceiling: {spent_this_month:.4} spent + {estimated_cost:.4} estimated > {:.4} USD",
                    budget.monthly_usd
                ),
            });
        }
        Ok(())
    }

    async fn commit(
        &self,
        owner: &str,
        provider_id: &str,
        operation: OperationType,
        tokens: u64,
        actual_cost: f64,
    ) -> Result<()> {
        let day = day_bucket(self.clock.now());
        self.usage
            .add(owner, provider_id, &day, operation, tokens, 1, actual_cost)
            .await?;
        debug!(owner, provider_id, operation = %operation, tokens, actual_cost, "usage committed");
        Ok(())
    }
}
