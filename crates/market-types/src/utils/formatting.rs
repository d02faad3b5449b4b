//! String formatting utilities.
//!
//! Provides functions for formatting values for display and logs, such as
//! money amounts and masked phone numbers.

use rust_decimal::{Decimal, RoundingStrategy};

/// Formats a money amount with its currency code and two decimal places.
///
/// # Arguments
///
/// * `amount` - The amount to format
/// * `currency` - ISO currency code, e.g. "INR"
///
/// # Returns
///
/// A formatted string like "INR 10040.00"
pub fn format_amount(amount: Decimal, currency: &str) -> String {
	let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
	format!("{} {:.2}", currency, rounded)
}

/// Masks all but the last four characters of a phone number for logging.
pub fn mask_phone(phone: &str) -> String {
	let len = phone.chars().count();
	if len <= 4 {
		return "*".repeat(len);
	}
	let visible: String = phone.chars().skip(len - 4).collect();
	format!("{}{}", "*".repeat(len - 4), visible)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_format_amount() {
		assert_eq!(format_amount(Decimal::from(10040), "INR"), "INR 10040.00");
		assert_eq!(format_amount(Decimal::new(12345, 3), "INR"), "INR 12.35");
	}

	#[test]
	fn test_mask_phone() {
		assert_eq!(mask_phone("9876543210"), "******3210");
		assert_eq!(mask_phone("123"), "***");
	}
}
