//! Spend aggregates for the open day's activities.
//!
//! Always recomputed from the in-memory list; no caching and no incremental
//! maintenance. The progress-bar percentage is clamped for display, but the
//! over-budget flag comes from the unclamped ratio, so blowing the budget
//! still registers even though the bar pins at 100.

use crate::records::{Activity, DEFAULT_BUDGET_LIMIT};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetSummary {
    pub total_cost: f64,
    pub limit: f64,
    /// Rounded percent of the limit spent, clamped to 0..=100 for display.
    pub percent_display: u32,
    pub over_budget: bool,
    /// May be negative once over budget.
    pub remaining: f64,
}

pub fn summarize<'a>(
    activities: impl IntoIterator<Item = &'a Activity>,
    budget_limit: Option<f64>,
) -> BudgetSummary {
    let total_cost: f64 = activities.into_iter().map(|a| a.cost).sum();
    let limit = budget_limit.unwrap_or(DEFAULT_BUDGET_LIMIT);

    let percent = if limit > 0.0 {
        (total_cost / limit * 100.0).round()
    } else {
        0.0
    };

    BudgetSummary {
        total_cost,
        limit,
        percent_display: percent.clamp(0.0, 100.0) as u32,
        over_budget: percent > 100.0,
        remaining: limit - total_cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{ActivityDraft, ActivityId, DayId};

    fn activity(cost: f64) -> Activity {
        let draft = ActivityDraft {
            title: "x".into(),
            cost: Some(cost),
            ..ActivityDraft::default()
        };
        Activity::from_draft(ActivityId(1), DayId(1), 0, &draft)
    }

    #[test]
    fn sums_costs_against_the_limit() {
        let acts = [activity(100.0), activity(0.0), activity(250.5)];
        let summary = summarize(&acts, Some(1000.0));

        assert_eq!(summary.total_cost, 350.5);
        assert_eq!(summary.percent_display, 35);
        assert!(!summary.over_budget);
        assert_eq!(summary.remaining, 649.5);
    }

    #[test]
    fn over_budget_uses_the_unclamped_ratio() {
        let acts = [activity(100.0), activity(0.0), activity(250.5)];
        let summary = summarize(&acts, Some(300.0));

        assert_eq!(summary.percent_display, 100);
        assert!(summary.over_budget);
        assert!(summary.remaining < 0.0);
    }

    #[test]
    fn exactly_at_the_limit_is_not_over() {
        let acts = [activity(300.0)];
        let summary = summarize(&acts, Some(300.0));

        assert_eq!(summary.percent_display, 100);
        assert!(!summary.over_budget);
    }

    #[test]
    fn missing_limit_falls_back_to_the_default() {
        let summary = summarize(std::iter::empty(), None);
        assert_eq!(summary.limit, DEFAULT_BUDGET_LIMIT);
        assert_eq!(summary.total_cost, 0.0);
        assert_eq!(summary.percent_display, 0);
    }
}
