use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::event::{ConsumedItem, ConsumptionDetail, Event, EventParticipant, Settlement};
use crate::money::Money;

/// Balances within one currency unit of zero are considered settled.
const SETTLE_TOLERANCE: Money = Money::ONE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub name: String,
    /// Paid minus consumed: positive is owed money, negative owes money.
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_expense: Money,
    pub settlements: Vec<Settlement>,
    pub consumption_details: Vec<ConsumptionDetail>,
    pub balances: Vec<Balance>,
}

/// Totals an event and pairs debtors with creditors greedily.
///
/// Members and payers that are not listed as event participants are ignored
/// for consumption and payment, but their items still count toward the
/// event's total expense. A participant listed more than once is counted
/// once, in first-seen order.
pub fn calculate_summary(event: &Event) -> Summary {
    let mut seen = HashSet::new();
    let names: Vec<&str> = event
        .participants
        .iter()
        .map(EventParticipant::name)
        .filter(|name| seen.insert(*name))
        .collect();
    let mut consumed: HashMap<&str, Money> = names.iter().map(|n| (*n, Money::ZERO)).collect();
    let mut paid: HashMap<&str, Money> = names.iter().map(|n| (*n, Money::ZERO)).collect();
    let mut details: HashMap<&str, ConsumptionDetail> =
        names.iter().map(|n| (*n, ConsumptionDetail::new(*n))).collect();

    let mut total_expense = Money::ZERO;

    for activity in &event.activities {
        let mut activity_total = Money::ZERO;

        for item in &activity.items {
            let item_total = item.total();
            activity_total += item_total;

            if item.members.is_empty() {
                continue;
            }
            let split_amount = item_total / Decimal::from(item.members.len());

            for member in &item.members {
                let Some(entry) = consumed.get_mut(member.as_str()) else {
                    continue;
                };
                *entry += split_amount;

                if let Some(detail) = details.get_mut(member.as_str()) {
                    detail.total += split_amount;
                    detail.items.push(ConsumedItem {
                        item_name: item.name.clone(),
                        activity_title: activity.title.clone(),
                        price: item.price,
                        quantity: item.quantity,
                        split_amount: split_amount.round(),
                    });
                }
            }
        }

        if let Some(entry) = paid.get_mut(activity.payer.as_str()) {
            *entry += activity_total;
        }
        total_expense += activity_total;
    }

    let balances: Vec<Balance> = names
        .iter()
        .map(|name| Balance {
            name: name.to_string(),
            amount: paid[name] - consumed[name],
        })
        .collect();

    let settlements = greedy_settle(&balances);

    let consumption_details = names
        .iter()
        .filter_map(|name| details.remove(name))
        .filter(|d| d.total > Money::ZERO)
        .map(|mut d| {
            d.total = d.total.round();
            d
        })
        .collect();

    Summary {
        total_expense: total_expense.round(),
        settlements,
        consumption_details,
        balances: balances
            .into_iter()
            .map(|b| Balance { amount: b.amount.round(), ..b })
            .collect(),
    }
}

/// Largest debtor pays largest creditor until one side runs out.
fn greedy_settle(balances: &[Balance]) -> Vec<Settlement> {
    let mut debtors: Vec<(String, Money)> = balances
        .iter()
        .filter(|b| b.amount < Money::ZERO - SETTLE_TOLERANCE)
        .map(|b| (b.name.clone(), b.amount))
        .collect();
    let mut creditors: Vec<(String, Money)> = balances
        .iter()
        .filter(|b| b.amount > SETTLE_TOLERANCE)
        .map(|b| (b.name.clone(), b.amount))
        .collect();

    debtors.sort_by(|a, b| a.1.cmp(&b.1));
    creditors.sort_by(|a, b| b.1.cmp(&a.1));

    let mut settlements = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < debtors.len() && j < creditors.len() {
        let amount = debtors[i].1.abs().min(creditors[j].1);

        settlements.push(Settlement {
            from: debtors[i].0.clone(),
            to: creditors[j].0.clone(),
            amount: amount.round(),
        });

        debtors[i].1 += amount;
        creditors[j].1 -= amount;

        if debtors[i].1.abs() < SETTLE_TOLERANCE {
            i += 1;
        }
        if creditors[j].1 < SETTLE_TOLERANCE {
            j += 1;
        }
    }

    settlements
}
