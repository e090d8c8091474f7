//! Customer health, renewal, churn, upgrade and revenue aggregates for the admin console.
//!
//! Every function here is pure: callers load the organizations (and churn events) from the
//! database and pass a reference time, which keeps the arithmetic testable without a database.
//!
//! ## Health score
//!
//! | Component  | Points | Rule                                                           |
//! |------------|--------|----------------------------------------------------------------|
//! | usage      | 0..=40 | `seats_active / seats_purchased * 40`, no seats purchased = 0  |
//! | engagement | 0..=30 | last active <= 7 days: 30, <= 30: 20, <= 90: 10, else 0         |
//! | support    | 0..=20 | no open tickets: 20, one or two: 10, more: 0                   |
//! | billing    | 0..=10 | 0 when the last payment failed                                 |
//!
//! Scores of 70 and above are `healthy`, 40 and above `at_risk`, anything lower `critical`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::InsightsConfig;
use crate::db::models::organizations::{ChurnEventDBResponse, ChurnReason, OrganizationDBResponse, OrganizationStatus};
use crate::types::{OrganizationId, Tier};

pub const HEALTHY_THRESHOLD: i32 = 70;
pub const AT_RISK_THRESHOLD: i32 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthCategory {
    Healthy,
    AtRisk,
    Critical,
}

impl HealthCategory {
    pub fn from_score(score: i32) -> Self {
        if score >= HEALTHY_THRESHOLD {
            HealthCategory::Healthy
        } else if score >= AT_RISK_THRESHOLD {
            HealthCategory::AtRisk
        } else {
            HealthCategory::Critical
        }
    }
}

/// Health score of one organization, with the points each component contributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthBreakdown {
    #[schema(value_type = String, format = "uuid")]
    pub organization_id: OrganizationId,
    pub name: String,
    pub tier: Tier,
    #[schema(value_type = String)]
    pub mrr: Decimal,
    pub usage: i32,
    pub engagement: i32,
    pub support: i32,
    pub billing: i32,
    pub score: i32,
    pub category: HealthCategory,
    /// seats_active / seats_purchased, absent when no seats were purchased
    pub seat_utilization: Option<f64>,
    /// Whole days since the organization was last active, absent if never active
    pub days_since_active: Option<i64>,
}

fn seat_utilization(org: &OrganizationDBResponse) -> Option<f64> {
    (org.seats_purchased > 0).then(|| org.seats_active as f64 / org.seats_purchased as f64)
}

fn days_since(then: DateTime<Utc>, as_of: DateTime<Utc>) -> i64 {
    (as_of.date_naive() - then.date_naive()).num_days().max(0)
}

/// Score a single organization as of the given time.
pub fn health_breakdown(org: &OrganizationDBResponse, as_of: DateTime<Utc>) -> HealthBreakdown {
    let usage = if org.seats_purchased > 0 {
        let active = i64::from(org.seats_active.min(org.seats_purchased));
        (active * 40 / i64::from(org.seats_purchased)) as i32
    } else {
        0
    };

    let days_since_active = org.last_active_at.map(|t| days_since(t, as_of));
    let engagement = match days_since_active {
        Some(d) if d <= 7 => 30,
        Some(d) if d <= 30 => 20,
        Some(d) if d <= 90 => 10,
        _ => 0,
    };

    let support = match org.open_tickets {
        0 => 20,
        1 | 2 => 10,
        _ => 0,
    };

    let billing = if org.payment_failed { 0 } else { 10 };
    let score = usage + engagement + support + billing;

    HealthBreakdown {
        organization_id: org.id,
        name: org.name.clone(),
        tier: org.tier,
        mrr: org.mrr,
        usage,
        engagement,
        support,
        billing,
        score,
        category: HealthCategory::from_score(score),
        seat_utilization: seat_utilization(org),
        days_since_active,
    }
}

/// Scored portfolio of non-churned organizations, weakest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PortfolioHealth {
    pub healthy: i64,
    pub at_risk: i64,
    pub critical: i64,
    pub organizations: Vec<HealthBreakdown>,
}

pub fn portfolio_health(orgs: &[OrganizationDBResponse], as_of: DateTime<Utc>) -> PortfolioHealth {
    let mut organizations: Vec<HealthBreakdown> = orgs
        .iter()
        .filter(|o| o.status != OrganizationStatus::Churned)
        .map(|o| health_breakdown(o, as_of))
        .collect();
    organizations.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.name.cmp(&b.name)));

    let count = |category: HealthCategory| organizations.iter().filter(|h| h.category == category).count() as i64;

    PortfolioHealth {
        healthy: count(HealthCategory::Healthy),
        at_risk: count(HealthCategory::AtRisk),
        critical: count(HealthCategory::Critical),
        organizations,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RenewalEntry {
    #[schema(value_type = String, format = "uuid")]
    pub organization_id: OrganizationId,
    pub name: String,
    pub tier: Tier,
    #[schema(value_type = String)]
    pub mrr: Decimal,
    pub renewal_date: NaiveDate,
    /// Negative when the renewal date has passed
    pub days_until_renewal: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RenewalBucket {
    pub count: i64,
    /// Monthly revenue up for renewal in this bucket
    #[schema(value_type = String)]
    pub mrr: Decimal,
    pub organizations: Vec<RenewalEntry>,
}

impl RenewalBucket {
    fn push(&mut self, entry: RenewalEntry) {
        self.count += 1;
        self.mrr += entry.mrr;
        self.organizations.push(entry);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RenewalReport {
    pub as_of: NaiveDate,
    pub overdue: RenewalBucket,
    pub next_30: RenewalBucket,
    pub next_60: RenewalBucket,
    pub next_90: RenewalBucket,
}

/// Bucket upcoming renewals of non-churned organizations by days until renewal.
pub fn renewal_buckets(orgs: &[OrganizationDBResponse], as_of: NaiveDate, settings: &InsightsConfig) -> RenewalReport {
    let mut report = RenewalReport {
        as_of,
        overdue: RenewalBucket::default(),
        next_30: RenewalBucket::default(),
        next_60: RenewalBucket::default(),
        next_90: RenewalBucket::default(),
    };

    let mut upcoming: Vec<(&OrganizationDBResponse, NaiveDate)> = orgs
        .iter()
        .filter(|o| o.status != OrganizationStatus::Churned)
        .filter_map(|o| o.renewal_date.map(|d| (o, d)))
        .collect();
    upcoming.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.name.cmp(&b.0.name)));

    for (org, renewal_date) in upcoming {
        let days = (renewal_date - as_of).num_days();
        if days > settings.renewal_window_days.min(90) {
            continue;
        }
        let entry = RenewalEntry {
            organization_id: org.id,
            name: org.name.clone(),
            tier: org.tier,
            mrr: org.mrr,
            renewal_date,
            days_until_renewal: days,
        };
        match days {
            d if d < 0 => report.overdue.push(entry),
            d if d <= 30 => report.next_30.push(entry),
            d if d <= 60 => report.next_60.push(entry),
            d if d <= 90 => report.next_90.push(entry),
            _ => {}
        }
    }

    report
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChurnReasonStat {
    pub reason: ChurnReason,
    pub count: i64,
    #[schema(value_type = String)]
    pub lost_mrr: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChurnStats {
    pub since: DateTime<Utc>,
    pub churned_count: i64,
    #[schema(value_type = String)]
    pub lost_mrr: Decimal,
    /// churned in window / (currently active or trialing + churned in window)
    pub churn_rate: Option<f64>,
    /// Most frequent reason first
    pub by_reason: Vec<ChurnReasonStat>,
}

/// Churn over the window starting at `since`.
pub fn churn_stats(orgs: &[OrganizationDBResponse], events: &[ChurnEventDBResponse], since: DateTime<Utc>) -> ChurnStats {
    let in_window: Vec<&ChurnEventDBResponse> = events.iter().filter(|e| e.churned_at >= since).collect();

    let mut by_reason: Vec<ChurnReasonStat> = Vec::new();
    for event in &in_window {
        match by_reason.iter_mut().find(|s| s.reason == event.reason) {
            Some(stat) => {
                stat.count += 1;
                stat.lost_mrr += event.lost_mrr;
            }
            None => by_reason.push(ChurnReasonStat {
                reason: event.reason,
                count: 1,
                lost_mrr: event.lost_mrr,
            }),
        }
    }
    by_reason.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| b.lost_mrr.cmp(&a.lost_mrr)));

    let churned_count = in_window.len() as i64;
    let retained = orgs.iter().filter(|o| o.status != OrganizationStatus::Churned).count() as i64;
    let denominator = retained + churned_count;

    ChurnStats {
        since,
        churned_count,
        lost_mrr: in_window.iter().map(|e| e.lost_mrr).sum(),
        churn_rate: (denominator > 0).then(|| churned_count as f64 / denominator as f64),
        by_reason,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    SeatExpansion,
    TierUpgrade,
    TrialConversion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UpgradeOpportunity {
    #[schema(value_type = String, format = "uuid")]
    pub organization_id: OrganizationId,
    pub name: String,
    pub tier: Tier,
    #[schema(value_type = String)]
    pub mrr: Decimal,
    pub kind: OpportunityKind,
    pub suggested_tier: Option<Tier>,
    pub seat_utilization: Option<f64>,
    pub detail: String,
}

/// Organizations that look ready to buy more.
pub fn upgrade_opportunities(
    orgs: &[OrganizationDBResponse],
    as_of: DateTime<Utc>,
    settings: &InsightsConfig,
) -> Vec<UpgradeOpportunity> {
    let today = as_of.date_naive();
    let mut opportunities = Vec::new();

    for org in orgs.iter().filter(|o| o.status != OrganizationStatus::Churned) {
        let utilization = seat_utilization(org);
        let opportunity = |kind, suggested_tier, detail: String| UpgradeOpportunity {
            organization_id: org.id,
            name: org.name.clone(),
            tier: org.tier,
            mrr: org.mrr,
            kind,
            suggested_tier,
            seat_utilization: utilization,
            detail,
        };

        if let Some(u) = utilization
            && u >= settings.upgrade_utilization_threshold
        {
            opportunities.push(opportunity(
                OpportunityKind::SeatExpansion,
                None,
                format!("{} of {} seats in use", org.seats_active, org.seats_purchased),
            ));
            if let Some(next) = org.tier.next() {
                opportunities.push(opportunity(
                    OpportunityKind::TierUpgrade,
                    Some(next),
                    format!("{:.0}% seat utilization on {}", u * 100.0, org.tier),
                ));
            }
        }

        if org.status == OrganizationStatus::Trial
            && let Some(ends) = org.trial_ends_at
        {
            let days_left = (ends - today).num_days();
            let recently_active = org
                .last_active_at
                .is_some_and(|t| days_since(t, as_of) <= settings.recent_activity_days);
            if (0..=settings.trial_warning_days).contains(&days_left) && recently_active {
                opportunities.push(opportunity(
                    OpportunityKind::TrialConversion,
                    org.tier.next(),
                    format!("Trial ends in {days_left} days"),
                ));
            }
        }
    }

    opportunities.sort_by(|a, b| {
        b.mrr
            .cmp(&a.mrr)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| (a.kind as u8).cmp(&(b.kind as u8)))
    });
    opportunities
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TierRevenue {
    pub tier: Tier,
    pub organizations: i64,
    #[schema(value_type = String)]
    pub mrr: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RevenueSummary {
    #[schema(value_type = String)]
    pub mrr: Decimal,
    #[schema(value_type = String)]
    pub arr: Decimal,
    pub paying_organizations: i64,
    /// One entry per tier, lowest tier first
    pub by_tier: Vec<TierRevenue>,
}

/// Recurring revenue of non-churned organizations.
pub fn revenue_summary(orgs: &[OrganizationDBResponse]) -> RevenueSummary {
    let live: Vec<&OrganizationDBResponse> = orgs.iter().filter(|o| o.status != OrganizationStatus::Churned).collect();

    let by_tier = Tier::ALL
        .iter()
        .map(|&tier| {
            let in_tier = live.iter().filter(|o| o.tier == tier);
            TierRevenue {
                tier,
                organizations: in_tier.clone().count() as i64,
                mrr: in_tier.map(|o| o.mrr).sum(),
            }
        })
        .collect();

    let mrr: Decimal = live.iter().map(|o| o.mrr).sum();

    RevenueSummary {
        mrr,
        arr: mrr * Decimal::from(12),
        paying_organizations: live.iter().filter(|o| o.mrr > Decimal::ZERO).count() as i64,
        by_tier,
    }
}
