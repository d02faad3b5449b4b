//! Plain-text invoice export for a placed order.

use market_types::{format_amount, Order};
use rust_decimal::Decimal;

/// Renders a printable invoice.
///
/// The delivery fee is recovered as `total - price × quantity`, so the
/// invoice always agrees with the amount charged when the order was placed.
pub fn render_invoice(order: &Order, currency: &str) -> String {
	let product = order.product();
	let subtotal = product.price * Decimal::from(order.quantity());
	let delivery_fee = order.total_amount() - subtotal;
	let delivery = order.delivery_info();
	let rule = "-".repeat(40);

	let mut lines = vec![
		format!("INVOICE #{}", order.id()),
		format!("Date: {}", order.date().format("%Y-%m-%d %H:%M UTC")),
		format!("Status: {}", order.status()),
		rule.clone(),
		format!("Product: {}", product.name),
		format!("Seller: {} ({})", product.owner, product.location),
		format!("Quantity: {} {}", order.quantity(), product.unit),
		format!("Unit price: {}", format_amount(product.price, currency)),
		format!("Subtotal: {}", format_amount(subtotal, currency)),
		format!("Delivery fee: {}", format_amount(delivery_fee, currency)),
		format!("Total: {}", format_amount(order.total_amount(), currency)),
		rule,
		format!("Deliver to: {}", delivery.full_name),
		format!("Phone: {}", delivery.phone_number),
		format!("Address: {}", delivery.formatted_address()),
	];
	if let Some(instructions) = &delivery.special_instructions {
		lines.push(format!("Instructions: {}", instructions));
	}
	lines.push(format!("Payment method: {}", order.payment_method()));

	lines.join("\n")
}
