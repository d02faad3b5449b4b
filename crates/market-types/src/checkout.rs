//! Checkout draft types.
//!
//! Drafts are the transient, pre-confirmation state of a purchase: the product
//! selection and the delivery details. They become part of an order only when
//! the buyer confirms.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

use crate::ProductSnapshot;

/// Steps of the checkout wizard, in forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
	SelectingProduct,
	EnteringDelivery,
	ReviewingBill,
	Confirmed,
}

impl fmt::Display for CheckoutStep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CheckoutStep::SelectingProduct => write!(f, "product selection"),
			CheckoutStep::EnteringDelivery => write!(f, "delivery details"),
			CheckoutStep::ReviewingBill => write!(f, "billing"),
			CheckoutStep::Confirmed => write!(f, "confirmation"),
		}
	}
}

/// Clamps a requested quantity into `1..=available`.
///
/// Returns `None` only when nothing is available, since no quantity can
/// satisfy the bound in that case.
pub fn clamp_quantity(requested: i64, available: u32) -> Option<NonZeroU32> {
	if available == 0 {
		return None;
	}
	let clamped = requested.clamp(1, i64::from(available));
	u32::try_from(clamped).ok().and_then(NonZeroU32::new)
}

/// The buyer's current product selection. Single slot, overwritten on re-selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSelection {
	pub product: ProductSnapshot,
	/// Availability captured at selection time; bounds later quantity edits.
	pub available_quantity: u32,
	pub quantity: NonZeroU32,
	pub selected_at: DateTime<Utc>,
}

/// Validated delivery details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDetails {
	pub full_name: String,
	pub phone_number: String,
	pub address: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub landmark: Option<String>,
	pub pin_code: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub city: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub state: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub special_instructions: Option<String>,
}

impl DeliveryDetails {
	/// Single-line address used in listings and invoices.
	pub fn formatted_address(&self) -> String {
		let mut parts = vec![self.address.clone()];
		if let Some(landmark) = &self.landmark {
			parts.push(format!("near {}", landmark));
		}
		parts.extend(self.city.iter().cloned());
		parts.extend(self.state.iter().cloned());
		format!("{} - {}", parts.join(", "), self.pin_code)
	}
}

/// A single failed field with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
	pub field: &'static str,
	pub message: String,
}

/// All field failures of one form submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(pub Vec<FieldError>);

impl FieldErrors {
	pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
		self.0.push(FieldError {
			field,
			message: message.into(),
		});
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn contains(&self, field: &str) -> bool {
		self.0.iter().any(|e| e.field == field)
	}

	pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
		self.0.iter()
	}
}

impl fmt::Display for FieldErrors {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let parts: Vec<String> = self
			.0
			.iter()
			.map(|e| format!("{}: {}", e.field, e.message))
			.collect();
		f.write_str(&parts.join("; "))
	}
}

/// Raw delivery form input. Every field is optional until validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryForm {
	pub full_name: Option<String>,
	pub phone_number: Option<String>,
	pub address: Option<String>,
	pub landmark: Option<String>,
	pub pin_code: Option<String>,
	pub city: Option<String>,
	pub state: Option<String>,
	pub special_instructions: Option<String>,
}

const MIN_NAME_LEN: usize = 3;
const MIN_ADDRESS_LEN: usize = 5;
const PHONE_DIGITS: usize = 10;

fn trimmed(value: &Option<String>) -> Option<String> {
	value
		.as_deref()
		.map(str::trim)
		.filter(|v| !v.is_empty())
		.map(str::to_string)
}

impl DeliveryForm {
	/// Validates the form, reporting every failing field.
	pub fn validate(&self) -> Result<DeliveryDetails, FieldErrors> {
		let mut errors = FieldErrors::default();

		let full_name = trimmed(&self.full_name).unwrap_or_default();
		if full_name.is_empty() {
			errors.push("fullName", "full name is required");
		} else if full_name.chars().count() < MIN_NAME_LEN {
			errors.push(
				"fullName",
				format!("full name must be at least {} characters", MIN_NAME_LEN),
			);
		}

		let phone_number = trimmed(&self.phone_number).unwrap_or_default();
		if phone_number.len() != PHONE_DIGITS || !phone_number.chars().all(|c| c.is_ascii_digit()) {
			errors.push(
				"phoneNumber",
				format!("phone number must be {} digits", PHONE_DIGITS),
			);
		}

		let address = trimmed(&self.address).unwrap_or_default();
		if address.is_empty() {
			errors.push("address", "address is required");
		} else if address.chars().count() < MIN_ADDRESS_LEN {
			errors.push(
				"address",
				format!("address must be at least {} characters", MIN_ADDRESS_LEN),
			);
		}

		let pin_code = trimmed(&self.pin_code).unwrap_or_default();
		if pin_code.is_empty() {
			errors.push("pinCode", "pin code is required");
		}

		if !errors.is_empty() {
			return Err(errors);
		}

		Ok(DeliveryDetails {
			full_name,
			phone_number,
			address,
			landmark: trimmed(&self.landmark),
			pin_code,
			city: trimmed(&self.city),
			state: trimmed(&self.state),
			special_instructions: trimmed(&self.special_instructions),
		})
	}
}

impl From<&DeliveryDetails> for DeliveryForm {
	fn from(details: &DeliveryDetails) -> Self {
		Self {
			full_name: Some(details.full_name.clone()),
			phone_number: Some(details.phone_number.clone()),
			address: Some(details.address.clone()),
			landmark: details.landmark.clone(),
			pin_code: Some(details.pin_code.clone()),
			city: details.city.clone(),
			state: details.state.clone(),
			special_instructions: details.special_instructions.clone(),
		}
	}
}

/// Price breakdown shown on the billing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
	pub product: ProductSnapshot,
	pub quantity: NonZeroU32,
	pub unit_price: Decimal,
	pub subtotal: Decimal,
	pub delivery_fee: Decimal,
	pub total_amount: Decimal,
}

impl Bill {
	/// Derives the bill from a selection: `price × quantity + delivery_fee`.
	pub fn compute(selection: &DraftSelection, delivery_fee: Decimal) -> Self {
		let unit_price = selection.product.price;
		let subtotal = unit_price * Decimal::from(selection.quantity.get());
		Self {
			product: selection.product.clone(),
			quantity: selection.quantity,
			unit_price,
			subtotal,
			delivery_fee,
			total_amount: subtotal + delivery_fee,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn product(price: i64) -> ProductSnapshot {
		ProductSnapshot {
			id: 3,
			name: "Groundnut oil".into(),
			image: String::new(),
			price: Decimal::from(price),
			unit: "L".into(),
			description: None,
			owner: "Ravi".into(),
			location: "Mandya".into(),
		}
	}

	#[test]
	fn test_clamp_quantity() {
		assert_eq!(clamp_quantity(70, 50).unwrap().get(), 50);
		assert_eq!(clamp_quantity(0, 50).unwrap().get(), 1);
		assert_eq!(clamp_quantity(-4, 50).unwrap().get(), 1);
		assert_eq!(clamp_quantity(12, 50).unwrap().get(), 12);
		assert!(clamp_quantity(1, 0).is_none());
	}

	#[test]
	fn test_short_name_and_phone_are_reported_together() {
		let form = DeliveryForm {
			full_name: Some("Jo".into()),
			phone_number: Some("12345".into()),
			..Default::default()
		};
		let errors = form.validate().unwrap_err();
		assert!(errors.contains("fullName"));
		assert!(errors.contains("phoneNumber"));
		assert!(errors.contains("address"));
		assert!(errors.contains("pinCode"));
		assert!(errors.to_string().contains("phone number must be 10 digits"));
	}

	#[test]
	fn test_phone_rejects_non_digits() {
		let form = DeliveryForm {
			full_name: Some("John Doe".into()),
			phone_number: Some("98765-4321".into()),
			address: Some("12 Farm Rd".into()),
			pin_code: Some("560001".into()),
			..Default::default()
		};
		let errors = form.validate().unwrap_err();
		assert_eq!(errors.0.len(), 1);
		assert!(errors.contains("phoneNumber"));
	}

	#[test]
	fn test_valid_form_trims_and_drops_blank_optionals() {
		let form = DeliveryForm {
			full_name: Some("  John Doe ".into()),
			phone_number: Some("9876543210".into()),
			address: Some("12 Farm Rd".into()),
			pin_code: Some("560001".into()),
			landmark: Some("   ".into()),
			city: Some("Bengaluru".into()),
			..Default::default()
		};
		let details = form.validate().unwrap();
		assert_eq!(details.full_name, "John Doe");
		assert_eq!(details.landmark, None);
		assert_eq!(details.city.as_deref(), Some("Bengaluru"));
		assert_eq!(details.formatted_address(), "12 Farm Rd, Bengaluru - 560001");
	}

	#[test]
	fn test_bill_total() {
		let selection = DraftSelection {
			product: product(200),
			available_quantity: 50,
			quantity: NonZeroU32::new(50).unwrap(),
			selected_at: Utc::now(),
		};
		let bill = Bill::compute(&selection, Decimal::from(40));
		assert_eq!(bill.subtotal, Decimal::from(10000));
		assert_eq!(bill.total_amount, Decimal::from(10040));
	}
}
