use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Money;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    /// Only selected participants share the expense.
    pub selected: bool,
    #[serde(default)]
    pub amount_owed: Money,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, selected: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            selected,
            amount_owed: Money::ZERO,
        }
    }
}

/// Split `total` equally among the selected participants.
///
/// Each share is floored to two decimals and whatever the flooring lost is
/// added to the first selected participant, so the shares always sum to
/// `total` exactly (100 000 / 3 → 33 333.34 + 33 333.33 + 33 333.33).
pub fn split_equal(total: Money, participants: &[Participant]) -> Vec<Participant> {
    let selected = participants.iter().filter(|p| p.selected).count();

    if selected == 0 || total.is_zero() {
        return participants
            .iter()
            .map(|p| Participant { amount_owed: Money::ZERO, ..p.clone() })
            .collect();
    }

    let base = (total / Decimal::from(selected)).floor();
    let remainder = (total - base * Decimal::from(selected)).round();

    let mut first = true;
    participants
        .iter()
        .map(|p| {
            let amount_owed = if !p.selected {
                Money::ZERO
            } else if first {
                first = false;
                (base + remainder).round()
            } else {
                base
            };
            Participant { amount_owed, ..p.clone() }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitCheck {
    pub is_valid: bool,
    pub actual_total: Money,
    /// `expected - actual`; positive means money is missing from the split.
    pub difference: Money,
}

impl SplitCheck {
    pub fn message(&self) -> String {
        if self.is_valid {
            "Split calculation is accurate".to_string()
        } else if self.difference.is_negative() {
            format!("Split has extra {}", self.difference.abs())
        } else {
            format!("Split has missing {}", self.difference)
        }
    }
}

pub fn validate_split_total(participants: &[Participant], expected: Money) -> SplitCheck {
    let actual_total = participants.iter().map(|p| p.amount_owed).sum::<Money>().round();
    let difference = (expected - actual_total).round();
    SplitCheck {
        is_valid: difference.is_zero(),
        actual_total,
        difference,
    }
}
