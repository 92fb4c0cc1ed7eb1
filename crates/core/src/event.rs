use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// One line of an activity's bill, shared among `members`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillItem {
    pub name: String,
    pub price: Money,
    #[serde(default = "one")]
    pub quantity: Decimal,
    /// Percentage applied on top of `price * quantity` (10 = 10%).
    #[serde(default)]
    pub tax_percentage: Decimal,
    /// Flat amount taken off after tax.
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub members: Vec<String>,
}

fn one() -> Decimal {
    Decimal::ONE
}

impl BillItem {
    pub fn new(name: impl Into<String>, price: Money, members: &[&str]) -> Self {
        Self {
            name: name.into(),
            price,
            quantity: Decimal::ONE,
            tax_percentage: Decimal::ZERO,
            discount: Money::ZERO,
            members: members.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_tax(mut self, tax_percentage: Decimal) -> Self {
        self.tax_percentage = tax_percentage;
        self
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = discount;
        self
    }

    pub fn subtotal(&self) -> Money {
        self.price * self.quantity
    }

    /// `price * quantity`, plus tax, minus discount. May go negative when the
    /// discount exceeds the taxed amount.
    pub fn total(&self) -> Money {
        let subtotal = self.subtotal();
        subtotal + subtotal * (self.tax_percentage / Decimal::ONE_HUNDRED) - self.discount
    }

    /// Share each member carries, with the total clamped at zero.
    pub fn per_person(&self) -> Money {
        if self.members.is_empty() {
            return Money::ZERO;
        }
        self.total().max(Money::ZERO) / Decimal::from(self.members.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub title: String,
    pub payer: String,
    #[serde(default)]
    pub items: Vec<BillItem>,
}

impl Activity {
    pub fn total(&self) -> Money {
        self.items.iter().map(BillItem::total).sum()
    }
}

/// Participants arrive either as bare names or as `{ "name": ... }` objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventParticipant {
    Name(String),
    Contact { name: String },
}

impl EventParticipant {
    pub fn name(&self) -> &str {
        match self {
            EventParticipant::Name(name) => name,
            EventParticipant::Contact { name } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub participants: Vec<EventParticipant>,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub from: String,
    pub to: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumedItem {
    pub item_name: String,
    pub activity_title: String,
    pub price: Money,
    pub quantity: Decimal,
    pub split_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionDetail {
    pub user: String,
    pub total: Money,
    pub items: Vec<ConsumedItem>,
}

impl ConsumptionDetail {
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into(), total: Money::ZERO, items: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_total_applies_tax_then_discount() {
        let item = BillItem::new("Nasi Goreng", Money::from_major(50_000), &["A"])
            .with_quantity(Decimal::from(2))
            .with_tax(Decimal::from(10))
            .with_discount(Money::from_major(10_000));
        assert_eq!(item.total(), Money::from_major(100_000));
    }

    #[test]
    fn per_person_clamps_negative_totals() {
        let item = BillItem::new("Promo", Money::from_major(5_000), &["A", "B"])
            .with_discount(Money::from_major(8_000));
        assert!(item.total().is_negative());
        assert_eq!(item.per_person(), Money::ZERO);
    }

    #[test]
    fn per_person_without_members_is_zero() {
        let item = BillItem::new("Orphan", Money::from_major(5_000), &[]);
        assert_eq!(item.per_person(), Money::ZERO);
    }

    #[test]
    fn participants_accept_both_shapes() {
        let event: Event = serde_json::from_str(
            r#"{"participants": ["Alice", {"name": "Bob"}], "activities": []}"#,
        )
        .unwrap();
        let names: Vec<&str> = event.participants.iter().map(EventParticipant::name).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
    }

    #[test]
    fn item_defaults_when_deserialized() {
        let item: BillItem =
            serde_json::from_str(r#"{"name": "Tea", "price": "8000", "members": ["A"]}"#).unwrap();
        assert_eq!(item.quantity, Decimal::ONE);
        assert_eq!(item.tax_percentage, Decimal::ZERO);
        assert_eq!(item.total(), Money::from_major(8_000));
    }
}
