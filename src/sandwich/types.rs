// src/sandwich/types.rs
use log::info;
use std::time::Duration;

/// A pending swap observed on the network before finalization.
///
/// Created by the feed, consumed once by the evaluator, never persisted.
/// Amounts are in base-token units of the referenced pool.
#[derive(Debug, Clone)]
pub struct PendingSwap {
    pub signature: String,
    pub user_wallet: String,
    pub token_in: String,
    pub token_out: String,
    pub amount_in: u64,
    pub pool_id: String,
    pub estimated_price_impact: f64,
    /// Milliseconds since epoch at observation time; non-decreasing within
    /// one feed session.
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpportunityStatus {
    Pending,
    Accepted,
    Rejected,
}

/// A scored, sized sandwich candidate produced by the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct SandwichOpportunity {
    pub target_signature: String,
    pub pool_id: String,
    pub front_run_amount: u64,
    pub back_run_amount: u64,
    /// Expected gross profit in input-asset units. An estimate only;
    /// realized profit comes from confirmation, not from this figure.
    pub estimated_profit: f64,
    /// Flat two-leg cost, in the same input-asset units as the profit
    /// figures.
    pub fee_cost: f64,
    /// 0-100, derived from pool turnover and absolute liquidity.
    pub confidence_score: f64,
    pub status: OpportunityStatus,
}

impl SandwichOpportunity {
    pub fn net_profit(&self) -> f64 {
        self.estimated_profit - self.fee_cost
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Both legs confirmed.
    Success,
    /// Front-run confirmed but the back-run did not; the position is open.
    PartialFailure,
    /// Front-run never submitted or never confirmed.
    Failure,
}

/// One execution of an accepted opportunity. Terminal once `outcome` is set.
#[derive(Debug, Clone)]
pub struct SandwichAttempt {
    pub opportunity: SandwichOpportunity,
    pub front_run_signature: Option<String>,
    pub back_run_signature: Option<String>,
    /// Realized result in input-asset units of the bracketed pool: the
    /// bracket plan's surplus on success, zero on a clean failure, the open
    /// front-run exposure (negative) on a partial failure. Same unit as
    /// `estimated_profit` and `fee_cost`.
    pub actual_profit: f64,
    pub execution_time: Duration,
    pub outcome: AttemptOutcome,
    pub failure_reason: Option<String>,
}

/// Process-wide running totals. Single writer (the coordinator); reset only
/// by process restart. Every money figure is in input-asset units of the
/// bracketed pools, the unit all profit and fee fields share.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub opportunities_detected: u64,
    pub sandwiches_attempted: u64,
    pub successful_sandwiches: u64,
    pub partial_failures: u64,
    pub total_profit: f64,
    pub total_fees_spent: f64,
}

impl SessionStats {
    pub fn record_opportunity(&mut self) {
        self.opportunities_detected += 1;
    }

    /// Exactly one call per attempt, regardless of outcome.
    pub fn record_attempt(&mut self, attempt: &SandwichAttempt) {
        self.sandwiches_attempted += 1;
        match attempt.outcome {
            AttemptOutcome::Success => self.successful_sandwiches += 1,
            AttemptOutcome::PartialFailure => self.partial_failures += 1,
            AttemptOutcome::Failure => {}
        }
        self.total_profit += attempt.actual_profit;
        // Fees only count once a leg actually went out.
        if attempt.front_run_signature.is_some() {
            self.total_fees_spent += attempt.opportunity.fee_cost;
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.sandwiches_attempted == 0 {
            0.0
        } else {
            self.successful_sandwiches as f64 / self.sandwiches_attempted as f64 * 100.0
        }
    }

    pub fn net_profit(&self) -> f64 {
        self.total_profit - self.total_fees_spent
    }

    pub fn log_final(&self) {
        info!("============================================================");
        info!("📊 SANDWICH BOT FINAL STATISTICS");
        info!("============================================================");
        info!("🎯 Opportunities detected: {}", self.opportunities_detected);
        info!("🥪 Sandwiches attempted:   {}", self.sandwiches_attempted);
        info!("✅ Successful sandwiches:  {}", self.successful_sandwiches);
        info!("⚠️ Partial failures:       {}", self.partial_failures);
        if self.sandwiches_attempted > 0 {
            info!("📈 Success rate:           {:.1}%", self.success_rate());
        }
        info!("💰 Total profit:           {:.6}", self.total_profit);
        info!("⛽ Total fees spent:       {:.6}", self.total_fees_spent);
        let net = self.net_profit();
        info!("💵 Net profit:             {:.6}", net);
        if net > 0.0 {
            info!("🎉 Overall profitable session!");
        } else {
            info!("📉 Session ended with losses");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(outcome: AttemptOutcome, profit: f64, front_sig: Option<&str>) -> SandwichAttempt {
        SandwichAttempt {
            opportunity: SandwichOpportunity {
                target_signature: "t".to_string(),
                pool_id: "p".to_string(),
                front_run_amount: 1_000,
                back_run_amount: 990,
                estimated_profit: 0.5,
                fee_cost: 0.002,
                confidence_score: 50.0,
                status: OpportunityStatus::Accepted,
            },
            front_run_signature: front_sig.map(String::from),
            back_run_signature: None,
            actual_profit: profit,
            execution_time: Duration::from_millis(10),
            outcome,
            failure_reason: None,
        }
    }

    #[test]
    fn every_attempt_counts_once() {
        let mut stats = SessionStats::default();
        stats.record_attempt(&attempt(AttemptOutcome::Success, 0.4, Some("f")));
        stats.record_attempt(&attempt(AttemptOutcome::PartialFailure, -1.0, Some("f")));
        stats.record_attempt(&attempt(AttemptOutcome::Failure, 0.0, None));
        assert_eq!(stats.sandwiches_attempted, 3);
        assert_eq!(stats.successful_sandwiches, 1);
        assert_eq!(stats.partial_failures, 1);
    }

    #[test]
    fn fees_only_counted_when_a_leg_went_out() {
        let mut stats = SessionStats::default();
        stats.record_attempt(&attempt(AttemptOutcome::Failure, 0.0, None));
        assert_eq!(stats.total_fees_spent, 0.0);
        stats.record_attempt(&attempt(AttemptOutcome::Failure, 0.0, Some("f")));
        assert!(stats.total_fees_spent > 0.0);
    }
}
