//! Plain-text rendering of catalog, checkout and order data for the terminal.

use market_core::OrderSummary;
use market_types::{
	format_amount, mask_phone, Bill, CatalogProduct, CheckoutStep, FieldErrors, Order,
	OrderStatus, StatusChange,
};

/// Printed when a looked-up order or product does not exist.
pub const NOT_FOUND: &str = "Nothing found for that id.";

/// Tracking label shown to buyers.
pub fn status_label(status: OrderStatus) -> &'static str {
	match status {
		OrderStatus::Pending => "Order placed",
		OrderStatus::Processing => "Packed",
		OrderStatus::Shipped => "Shipped",
		OrderStatus::Delivered => "Delivered",
		OrderStatus::Cancelled => "Cancelled",
	}
}

/// Progress bar over the happy path, e.g. `[##--]`. Cancelled orders show `[xx]`.
fn progress(status: OrderStatus) -> String {
	match status.rank() {
		Some(rank) => {
			let done = usize::from(rank) + 1;
			format!("[{}{}]", "#".repeat(done), "-".repeat(4 - done))
		},
		None => "[xx]".to_string(),
	}
}

pub fn catalog(products: &[CatalogProduct], currency: &str) -> String {
	if products.is_empty() {
		return "The catalog is empty.".to_string();
	}
	products
		.iter()
		.map(|p| {
			format!(
				"{:>4}  {:<32} {:>14}/{:<3} {:>5} available  ({}, {})",
				p.id,
				p.name,
				format_amount(p.price, currency),
				p.unit,
				p.available_quantity,
				p.owner,
				p.location
			)
		})
		.collect::<Vec<_>>()
		.join("\n")
}

pub fn field_errors(errors: &FieldErrors) -> String {
	errors
		.iter()
		.map(|e| format!("  {}: {}", e.field, e.message))
		.collect::<Vec<_>>()
		.join("\n")
}

pub fn bill(bill: &Bill, currency: &str) -> String {
	[
		format!("Product:      {}", bill.product.name),
		format!("Quantity:     {} {}", bill.quantity, bill.product.unit),
		format!("Unit price:   {}", format_amount(bill.unit_price, currency)),
		format!("Subtotal:     {}", format_amount(bill.subtotal, currency)),
		format!("Delivery fee: {}", format_amount(bill.delivery_fee, currency)),
		format!("Total:        {}", format_amount(bill.total_amount, currency)),
	]
	.join("\n")
}

pub fn step(step: CheckoutStep) -> String {
	format!("Checkout is at: {}", step)
}

/// One line per order, as shown on the order list.
pub fn order_line(order: &Order, currency: &str) -> String {
	format!(
		"#{}  {}  {} x{} {}  {}  {} {}",
		order.id(),
		order.date().format("%Y-%m-%d"),
		order.product().name,
		order.quantity(),
		order.product().unit,
		format_amount(order.total_amount(), currency),
		progress(order.status()),
		status_label(order.status())
	)
}

pub fn order_list(orders: &[Order], currency: &str) -> String {
	if orders.is_empty() {
		return "No orders yet.".to_string();
	}
	orders
		.iter()
		.map(|o| order_line(o, currency))
		.collect::<Vec<_>>()
		.join("\n")
}

pub fn order_detail(order: &Order, currency: &str) -> String {
	let delivery = order.delivery_info();
	let mut lines = vec![
		format!("Order #{}", order.id()),
		format!(
			"Status:   {} {}",
			progress(order.status()),
			status_label(order.status())
		),
		format!("Placed:   {}", order.date().to_rfc3339()),
		format!(
			"Product:  {} from {} ({})",
			order.product().name,
			order.product().owner,
			order.product().location
		),
		format!("Quantity: {} {}", order.quantity(), order.product().unit),
		format!("Total:    {}", format_amount(order.total_amount(), currency)),
		format!("Payment:  {}", order.payment_method()),
		format!(
			"Deliver:  {}, {} ({})",
			delivery.full_name,
			delivery.formatted_address(),
			mask_phone(&delivery.phone_number)
		),
	];
	if order.status().can_cancel() {
		lines.push("This order can still be cancelled.".to_string());
	}
	lines.join("\n")
}

pub fn summary(summary: &OrderSummary) -> String {
	let counts: Vec<String> = summary
		.counts
		.iter()
		.map(|(status, n)| format!("{} {}", n, status))
		.collect();
	format!("{} orders: {}", summary.total(), counts.join(", "))
}

pub fn status_change(change: &StatusChange) -> String {
	format!(
		"[{}] {}",
		change.observed_at.format("%H:%M:%S"),
		change
	)
}
