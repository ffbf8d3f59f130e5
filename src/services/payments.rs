use crate::db::types::PaymentStatus;

/// Payment capture shared by the two distinct payment paths: course enrollment
/// (simulated payment recorded at enroll time) and product checkout. The paths
/// stay separate on purpose; only this value type is common.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PaymentRecord {
    pub(crate) amount: f64,
    pub(crate) status: PaymentStatus,
}

impl PaymentRecord {
    /// Payment is simulated: the amount is captured and immediately marked
    /// completed without touching any gateway.
    pub(crate) fn simulated(amount: f64) -> Self {
        Self { amount, status: PaymentStatus::Completed }
    }
}

/// Keeps only the last four digits of the card number, asterisk-prefixed.
/// The full PAN never reaches the store.
pub(crate) fn mask_card_number(card_number: &str) -> String {
    let digits: String = card_number.chars().filter(|c| c.is_ascii_digit()).collect();
    let last4 = if digits.len() > 4 { &digits[digits.len() - 4..] } else { digits.as_str() };
    format!("****{last4}")
}

/// Cart subtotals are never stored; they are recomputed from current product
/// prices every time they are needed.
pub(crate) fn subtotal(prices: impl IntoIterator<Item = f64>) -> f64 {
    prices.into_iter().sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_keeps_last_four_digits() {
        assert_eq!(mask_card_number("4242424242424242"), "****4242");
        assert_eq!(mask_card_number("4242 4242 4242 1881"), "****1881");
        assert_eq!(mask_card_number("4242-4242-4242-0005"), "****0005");
    }

    #[test]
    fn mask_never_exposes_more_than_four() {
        let masked = mask_card_number("5500005555555559");
        assert_eq!(masked.len(), 8);
        assert!(masked.starts_with("****"));
    }

    #[test]
    fn simulated_payment_is_completed() {
        let record = PaymentRecord::simulated(19.99);
        assert_eq!(record.amount, 19.99);
        assert_eq!(record.status, PaymentStatus::Completed);
    }

    #[test]
    fn subtotal_sums_current_prices() {
        assert_eq!(subtotal([15.0, 10.0]), 25.0);
        assert_eq!(subtotal(std::iter::empty::<f64>()), 0.0);
    }
}
