use std::str::FromStr;

use rust_decimal::Decimal;
use splitify_core::{BillItem, Money};

use crate::types::{LineItem, ReceiptData};

/// Reads an OCR amount such as `"Rp 50.000"` by keeping only its digits.
///
/// Rupiah receipts use `.` as the thousands separator and carry no minor
/// units, so `"12.500"` is twelve thousand five hundred.
pub fn parse_amount(raw: &str) -> Option<Money> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    Decimal::from_str(&digits).ok().map(Money::from_decimal)
}

/// Leading numeric part of `raw` (`"2x"` → 2, `"1,5"` → 1.5); anything
/// unusable or non-positive counts as one.
pub fn parse_quantity(raw: &str) -> Decimal {
    let numeric: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    match Decimal::from_str(&numeric) {
        Ok(q) if q > Decimal::ZERO => q,
        _ => Decimal::ONE,
    }
}

impl LineItem {
    pub fn price(&self) -> Option<Money> {
        parse_amount(&self.unit_price)
    }

    pub fn quantity_value(&self) -> Decimal {
        parse_quantity(&self.quantity)
    }

    /// Bill item shared by `members`; `None` without a usable price.
    pub fn to_bill_item(&self, members: &[&str]) -> Option<BillItem> {
        let price = self.price().filter(|p| !p.is_zero())?;
        let name = if self.name.trim().is_empty() { "Item" } else { self.name.trim() };
        Some(BillItem::new(name, price, members).with_quantity(self.quantity_value()))
    }
}

impl ReceiptData {
    /// Line items with a price, each shared by all `members`. Modifier lines
    /// without a price are skipped.
    pub fn to_bill_items(&self, members: &[&str]) -> Vec<BillItem> {
        self.items
            .iter()
            .filter_map(|item| item.to_bill_item(members))
            .collect()
    }

    pub fn total_amount(&self) -> Option<Money> {
        parse_amount(&self.total)
    }

    pub fn subtotal_amount(&self) -> Option<Money> {
        parse_amount(&self.subtotal)
    }

    pub fn tax_amount(&self) -> Option<Money> {
        parse_amount(&self.tax)
    }

    pub fn service_charge_amount(&self) -> Option<Money> {
        parse_amount(&self.service_charge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, qty: &str, price: &str) -> LineItem {
        LineItem { name: name.into(), quantity: qty.into(), unit_price: price.into() }
    }

    #[test]
    fn amounts_keep_digits_only() {
        assert_eq!(parse_amount("50.000"), Some(Money::from_major(50_000)));
        assert_eq!(parse_amount("Rp 27.500"), Some(Money::from_major(27_500)));
        assert_eq!(parse_amount("25000"), Some(Money::from_major(25_000)));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("Rp -"), None);
    }

    #[test]
    fn quantities_default_to_one() {
        assert_eq!(parse_quantity("2"), Decimal::from(2));
        assert_eq!(parse_quantity(" 3x "), Decimal::from(3));
        assert_eq!(parse_quantity("1,5"), Decimal::new(15, 1));
        assert_eq!(parse_quantity(""), Decimal::ONE);
        assert_eq!(parse_quantity("x2"), Decimal::ONE);
        assert_eq!(parse_quantity("0"), Decimal::ONE);
    }

    #[test]
    fn receipt_becomes_shared_bill_items() {
        let data = ReceiptData {
            items: vec![
                line("Nasi Goreng", "2", "25.000"),
                line("Extra Pedas", "", ""),
                line("  ", "1", "5.000"),
            ],
            total: "Rp 55.000".into(),
            ..Default::default()
        };

        let items = data.to_bill_items(&["Alice", "Bob"]);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "Nasi Goreng");
        assert_eq!(items[0].total(), Money::from_major(50_000));
        assert_eq!(items[0].members, vec!["Alice".to_string(), "Bob".to_string()]);
        assert_eq!(items[1].name, "Item");
        assert_eq!(data.total_amount(), Some(Money::from_major(55_000)));
        assert_eq!(data.tax_amount(), None);
    }
}
