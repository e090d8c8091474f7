//! Deal pipeline rules and summaries.
//!
//! Stages are a flat list with no validated transition graph: a deal may move from any stage to
//! any other. What *is* enforced is the relationship between a stage and the fields that depend on
//! it:
//!
//! - a closed deal (`closed_won` / `closed_lost`) always has `closed_at` set, an open deal never
//!   does;
//! - `closed_won` pins probability to 100 and `closed_lost` pins it to 0;
//! - moving between open stages resets probability to the stage default unless the caller supplies
//!   one;
//! - `lost_reason` only survives on `closed_lost` deals.
//!
//! [`apply_stage_change`] is the single place these rules live; the deals repository calls it
//! inside the row-locking transaction so the stored row is always consistent.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::db::models::deals::DealDBResponse;

/// Pipeline stage of a deal, stored as TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    Lead,
    Qualified,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl DealStage {
    /// All stages in pipeline order.
    pub const ALL: [DealStage; 6] = [
        DealStage::Lead,
        DealStage::Qualified,
        DealStage::Proposal,
        DealStage::Negotiation,
        DealStage::ClosedWon,
        DealStage::ClosedLost,
    ];

    pub fn is_closed(self) -> bool {
        matches!(self, DealStage::ClosedWon | DealStage::ClosedLost)
    }

    /// Win probability (percent) a deal gets when it enters this stage without an explicit value.
    pub fn default_probability(self) -> i32 {
        match self {
            DealStage::Lead => 10,
            DealStage::Qualified => 25,
            DealStage::Proposal => 50,
            DealStage::Negotiation => 75,
            DealStage::ClosedWon => 100,
            DealStage::ClosedLost => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DealStage::Lead => "lead",
            DealStage::Qualified => "qualified",
            DealStage::Proposal => "proposal",
            DealStage::Negotiation => "negotiation",
            DealStage::ClosedWon => "closed_won",
            DealStage::ClosedLost => "closed_lost",
        }
    }
}

impl fmt::Display for DealStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stage-dependent fields of a deal.
#[derive(Debug, Clone, PartialEq)]
pub struct StageState {
    pub stage: DealStage,
    pub probability: i32,
    pub closed_at: Option<DateTime<Utc>>,
    pub lost_reason: Option<String>,
}

impl From<&DealDBResponse> for StageState {
    fn from(deal: &DealDBResponse) -> Self {
        Self {
            stage: deal.stage,
            probability: deal.probability,
            closed_at: deal.closed_at,
            lost_reason: deal.lost_reason.clone(),
        }
    }
}

/// A requested change to the stage-dependent fields. `None` means "not supplied".
#[derive(Debug, Clone, Default)]
pub struct StageChange {
    pub stage: Option<DealStage>,
    pub probability: Option<i32>,
    pub lost_reason: Option<String>,
}

/// Reject probabilities outside 0..=100.
pub fn validate_probability(probability: Option<i32>) -> Result<(), String> {
    match probability {
        Some(p) if !(0..=100).contains(&p) => Err(format!("probability must be between 0 and 100, got {p}")),
        _ => Ok(()),
    }
}

/// Stage-dependent fields for a newly created deal.
pub fn initial_state(change: StageChange, now: DateTime<Utc>) -> StageState {
    let stage = change.stage.unwrap_or(DealStage::Lead);
    let probability = match stage {
        DealStage::ClosedWon | DealStage::ClosedLost => stage.default_probability(),
        _ => change.probability.unwrap_or_else(|| stage.default_probability()),
    };
    StageState {
        stage,
        probability,
        closed_at: stage.is_closed().then_some(now),
        lost_reason: if stage == DealStage::ClosedLost { change.lost_reason } else { None },
    }
}

/// Apply a requested change to the current stage-dependent fields of a deal.
pub fn apply_stage_change(current: &StageState, change: StageChange, now: DateTime<Utc>) -> StageState {
    let target = change.stage.unwrap_or(current.stage);

    if target == current.stage {
        let probability = if target.is_closed() {
            target.default_probability()
        } else {
            change.probability.unwrap_or(current.probability)
        };
        let lost_reason = if target == DealStage::ClosedLost {
            change.lost_reason.or_else(|| current.lost_reason.clone())
        } else {
            None
        };
        return StageState {
            stage: target,
            probability,
            closed_at: current.closed_at,
            lost_reason,
        };
    }

    match target {
        DealStage::ClosedWon => StageState {
            stage: target,
            probability: 100,
            closed_at: Some(now),
            lost_reason: None,
        },
        DealStage::ClosedLost => StageState {
            stage: target,
            probability: 0,
            closed_at: Some(now),
            lost_reason: change.lost_reason,
        },
        open => StageState {
            stage: open,
            probability: change.probability.unwrap_or_else(|| open.default_probability()),
            closed_at: None,
            lost_reason: None,
        },
    }
}

/// Totals for one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StageSummary {
    pub stage: DealStage,
    pub count: i64,
    #[schema(value_type = String)]
    pub total_value: Decimal,
    /// Sum of value x probability / 100
    #[schema(value_type = String)]
    pub weighted_value: Decimal,
}

/// Pipeline totals across all stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PipelineSummary {
    /// One entry per stage, in pipeline order (stages without deals have zero totals)
    pub stages: Vec<StageSummary>,
    pub open_count: i64,
    #[schema(value_type = String)]
    pub open_value: Decimal,
    /// Probability-weighted forecast of the open pipeline
    #[schema(value_type = String)]
    pub weighted_open_value: Decimal,
    #[schema(value_type = String)]
    pub won_value: Decimal,
    /// won / (won + lost), absent when no deal has closed yet
    pub win_rate: Option<f64>,
}

fn weighted(value: Decimal, probability: i32) -> Decimal {
    (value * Decimal::from(probability) / Decimal::from(100)).round_dp(2)
}

/// Summarize a set of deals by stage.
pub fn summarize<'a>(deals: impl IntoIterator<Item = &'a DealDBResponse>) -> PipelineSummary {
    let mut stages: Vec<StageSummary> = DealStage::ALL
        .iter()
        .map(|&stage| StageSummary {
            stage,
            count: 0,
            total_value: Decimal::ZERO,
            weighted_value: Decimal::ZERO,
        })
        .collect();

    for deal in deals {
        // ALL is exhaustive so the position always exists
        if let Some(entry) = stages.iter_mut().find(|s| s.stage == deal.stage) {
            entry.count += 1;
            entry.total_value += deal.value;
            entry.weighted_value += weighted(deal.value, deal.probability);
        }
    }

    let open = stages.iter().filter(|s| !s.stage.is_closed());
    let open_count = open.clone().map(|s| s.count).sum();
    let open_value = open.clone().map(|s| s.total_value).sum();
    let weighted_open_value = open.map(|s| s.weighted_value).sum();

    let won = stages.iter().find(|s| s.stage == DealStage::ClosedWon);
    let lost = stages.iter().find(|s| s.stage == DealStage::ClosedLost);
    let won_count = won.map(|s| s.count).unwrap_or(0);
    let lost_count = lost.map(|s| s.count).unwrap_or(0);
    let won_value = won.map(|s| s.total_value).unwrap_or(Decimal::ZERO);

    let win_rate = if won_count + lost_count > 0 {
        Some(won_count as f64 / (won_count + lost_count) as f64)
    } else {
        None
    };

    PipelineSummary {
        stages,
        open_count,
        open_value,
        weighted_open_value,
        won_value,
        win_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, hour, 0, 0).unwrap()
    }

    fn open_state(stage: DealStage, probability: i32) -> StageState {
        StageState {
            stage,
            probability,
            closed_at: None,
            lost_reason: None,
        }
    }

    fn deal(stage: DealStage, value: i64, probability: i32) -> DealDBResponse {
        DealDBResponse {
            id: Uuid::new_v4(),
            title: "Deal".to_string(),
            stage,
            tier: None,
            value: Decimal::from(value),
            probability,
            expected_close_date: None,
            closed_at: stage.is_closed().then(|| at(9)),
            lost_reason: None,
            notes: None,
            contact_id: None,
            owner_id: None,
            created_at: at(8),
            updated_at: at(8),
        }
    }

    #[test]
    fn test_closing_won_sets_closed_at_and_probability() {
        let current = open_state(DealStage::Negotiation, 60);
        let next = apply_stage_change(
            &current,
            StageChange {
                stage: Some(DealStage::ClosedWon),
                probability: Some(40),
                lost_reason: Some("ignored".to_string()),
            },
            at(10),
        );
        assert_eq!(next.stage, DealStage::ClosedWon);
        assert_eq!(next.probability, 100);
        assert_eq!(next.closed_at, Some(at(10)));
        assert_eq!(next.lost_reason, None);
    }

    #[test]
    fn test_closing_lost_keeps_reason() {
        let current = open_state(DealStage::Proposal, 50);
        let next = apply_stage_change(
            &current,
            StageChange {
                stage: Some(DealStage::ClosedLost),
                probability: None,
                lost_reason: Some("went with competitor".to_string()),
            },
            at(11),
        );
        assert_eq!(next.probability, 0);
        assert_eq!(next.closed_at, Some(at(11)));
        assert_eq!(next.lost_reason.as_deref(), Some("went with competitor"));
    }

    #[test]
    fn test_reopening_clears_close_fields() {
        let current = StageState {
            stage: DealStage::ClosedLost,
            probability: 0,
            closed_at: Some(at(9)),
            lost_reason: Some("budget".to_string()),
        };
        let next = apply_stage_change(
            &current,
            StageChange {
                stage: Some(DealStage::Qualified),
                ..Default::default()
            },
            at(12),
        );
        assert_eq!(next.stage, DealStage::Qualified);
        assert_eq!(next.probability, 25);
        assert_eq!(next.closed_at, None);
        assert_eq!(next.lost_reason, None);
    }

    #[test]
    fn test_open_stage_move_uses_default_unless_given() {
        let current = open_state(DealStage::Lead, 10);
        let defaulted = apply_stage_change(
            &current,
            StageChange {
                stage: Some(DealStage::Proposal),
                ..Default::default()
            },
            at(12),
        );
        assert_eq!(defaulted.probability, 50);

        let explicit = apply_stage_change(
            &current,
            StageChange {
                stage: Some(DealStage::Proposal),
                probability: Some(65),
                lost_reason: None,
            },
            at(12),
        );
        assert_eq!(explicit.probability, 65);
    }

    #[test]
    fn test_same_stage_keeps_closed_at_and_pins_probability() {
        let current = StageState {
            stage: DealStage::ClosedWon,
            probability: 100,
            closed_at: Some(at(9)),
            lost_reason: None,
        };
        let next = apply_stage_change(
            &current,
            StageChange {
                stage: None,
                probability: Some(20),
                lost_reason: None,
            },
            at(15),
        );
        assert_eq!(next.closed_at, Some(at(9)));
        assert_eq!(next.probability, 100);

        let open = open_state(DealStage::Negotiation, 75);
        let next = apply_stage_change(
            &open,
            StageChange {
                stage: Some(DealStage::Negotiation),
                probability: Some(80),
                lost_reason: None,
            },
            at(15),
        );
        assert_eq!(next.probability, 80);
        assert_eq!(next.closed_at, None);
    }

    #[test]
    fn test_initial_state() {
        let lead = initial_state(StageChange::default(), at(8));
        assert_eq!(lead, open_state(DealStage::Lead, 10));

        let won = initial_state(
            StageChange {
                stage: Some(DealStage::ClosedWon),
                probability: Some(30),
                lost_reason: None,
            },
            at(8),
        );
        assert_eq!(won.probability, 100);
        assert_eq!(won.closed_at, Some(at(8)));
    }

    #[test]
    fn test_validate_probability() {
        assert!(validate_probability(None).is_ok());
        assert!(validate_probability(Some(0)).is_ok());
        assert!(validate_probability(Some(100)).is_ok());
        assert!(validate_probability(Some(101)).is_err());
        assert!(validate_probability(Some(-1)).is_err());
    }

    #[test]
    fn test_summarize() {
        let deals = vec![
            deal(DealStage::Lead, 1000, 10),
            deal(DealStage::Proposal, 2000, 50),
            deal(DealStage::Proposal, 500, 50),
            deal(DealStage::ClosedWon, 3000, 100),
            deal(DealStage::ClosedLost, 800, 0),
            deal(DealStage::ClosedLost, 200, 0),
        ];

        let summary = summarize(&deals);
        assert_eq!(summary.stages.len(), 6);

        let proposal = summary.stages.iter().find(|s| s.stage == DealStage::Proposal).unwrap();
        assert_eq!(proposal.count, 2);
        assert_eq!(proposal.total_value, Decimal::from(2500));
        assert_eq!(proposal.weighted_value, Decimal::from(1250));

        let negotiation = summary.stages.iter().find(|s| s.stage == DealStage::Negotiation).unwrap();
        assert_eq!(negotiation.count, 0);

        assert_eq!(summary.open_count, 3);
        assert_eq!(summary.open_value, Decimal::from(3500));
        assert_eq!(summary.weighted_open_value, Decimal::from(1350));
        assert_eq!(summary.won_value, Decimal::from(3000));
        let win_rate = summary.win_rate.unwrap();
        assert!((win_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_summarize_empty_has_no_win_rate() {
        let summary = summarize(&Vec::<DealDBResponse>::new());
        assert_eq!(summary.open_count, 0);
        assert_eq!(summary.win_rate, None);
    }
}
