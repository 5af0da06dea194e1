use serde::{Deserialize, Serialize};

use super::{Cents, DebtEntry, DebtId, Direction};

/// What a payment does to one Active entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationStep {
    /// The payment covers the whole entry
    Full {
        entry_id: DebtId,
        amount: Cents,
        direction: Direction,
    },
    /// The payment covers only `paid`; `remainder` moves to a new Active entry
    Split {
        entry_id: DebtId,
        paid: Cents,
        remainder: Cents,
        direction: Direction,
    },
}

impl AllocationStep {
    pub fn entry_id(&self) -> DebtId {
        match self {
            AllocationStep::Full { entry_id, .. } | AllocationStep::Split { entry_id, .. } => {
                *entry_id
            }
        }
    }

    /// Portion of the payment consumed by this step.
    pub fn settled_amount(&self) -> Cents {
        match self {
            AllocationStep::Full { amount, .. } => *amount,
            AllocationStep::Split { paid, .. } => *paid,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            AllocationStep::Full { direction, .. } | AllocationStep::Split { direction, .. } => {
                *direction
            }
        }
    }
}

/// Allocation of one payment over a person's outstanding entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPlan {
    pub steps: Vec<AllocationStep>,
    pub applied: Cents,
    pub overpaid: Cents,
}

/// Allocate `amount` over `entries`, which must already be in allocation order.
///
/// One running tab per person: both directions are consumed together, oldest first.
/// At most the last step is a split. Whatever is left after every entry is covered
/// is reported as `overpaid`, never turned into a reverse obligation.
pub fn plan_settlement(entries: &[DebtEntry], amount: Cents) -> SettlementPlan {
    let mut remaining = amount.max(0);
    let mut steps = Vec::new();

    for entry in entries.iter().filter(|e| e.is_active()) {
        if remaining <= 0 {
            break;
        }
        if remaining >= entry.amount {
            steps.push(AllocationStep::Full {
                entry_id: entry.id,
                amount: entry.amount,
                direction: entry.direction,
            });
            remaining -= entry.amount;
        } else {
            steps.push(AllocationStep::Split {
                entry_id: entry.id,
                paid: remaining,
                remainder: entry.amount - remaining,
                direction: entry.direction,
            });
            remaining = 0;
        }
    }

    SettlementPlan {
        steps,
        applied: amount.max(0) - remaining,
        overpaid: remaining,
    }
}
