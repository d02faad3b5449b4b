//! Command handlers.
//!
//! Recoverable outcomes (validation failures, rejected transitions, unknown
//! ids) are printed for the user; only infrastructure failures are returned
//! as errors.

use crate::views;
use crate::{CheckoutCommand, Command, DeliveryArgs};
use futures::StreamExt;
use market_core::{
	render_invoice, CheckoutError, MarketEngine, OrderStateError, QueryError,
};
use market_types::{format_amount, DeliveryForm, Order};
use std::error::Error;

pub async fn execute(engine: &MarketEngine, command: Command) -> Result<(), Box<dyn Error>> {
	let currency = engine.config().market.currency.as_str();

	match command {
		Command::Catalog => {
			let products = engine.catalog().list_products().await?;
			println!("{}", views::catalog(&products, currency));
		},
		Command::Checkout(command) => println!("{}", checkout(engine, command).await?),
		Command::Orders { filter } => {
			let orders = engine.query().list_orders(filter).await?;
			println!("{}", views::summary(&engine.query().summary().await?));
			println!("{}", views::order_list(&orders, currency));
		},
		Command::Order { id } => {
			let text = find_order(engine, id)
				.await?
				.map_or_else(|| views::NOT_FOUND.to_string(), |o| views::order_detail(&o, currency));
			println!("{}", text);
		},
		Command::Transition { id, status } => {
			let result = engine
				.state_machine()
				.transition_order_status(id, status)
				.await;
			println!("{}", transition_outcome(result)?);
		},
		Command::Cancel { id } => {
			let result = engine.state_machine().cancel_order(id).await;
			println!("{}", transition_outcome(result)?);
		},
		Command::Invoice { id } => {
			let text = find_order(engine, id)
				.await?
				.map_or_else(|| views::NOT_FOUND.to_string(), |o| render_invoice(&o, currency));
			println!("{}", text);
		},
		Command::Watch => watch(engine).await,
		Command::Run => {
			engine.initialize().await?;
			engine.run().await?;
			engine.shutdown().await?;
		},
	}

	Ok(())
}

async fn find_order(
	engine: &MarketEngine,
	id: market_types::OrderId,
) -> Result<Option<Order>, QueryError> {
	match engine.query().get_order(id).await {
		Ok(order) => Ok(Some(order)),
		Err(QueryError::NotFound(_)) => Ok(None),
		Err(e) => Err(e),
	}
}

fn transition_outcome(result: Result<Order, OrderStateError>) -> Result<String, OrderStateError> {
	match result {
		Ok(order) => Ok(format!(
			"Order #{} is now {}",
			order.id(),
			views::status_label(order.status())
		)),
		Err(OrderStateError::OrderNotFound(_)) => Ok(views::NOT_FOUND.to_string()),
		Err(e @ OrderStateError::Storage(_)) => Err(e),
		Err(e) => Ok(format!("Rejected: {}", e)),
	}
}

/// Fills the delivery form from the command line, keeping earlier or
/// prefilled values for flags that were not given.
fn delivery_form(mut form: DeliveryForm, args: DeliveryArgs) -> DeliveryForm {
	let overrides = [
		(&mut form.full_name, args.full_name),
		(&mut form.phone_number, args.phone),
		(&mut form.address, args.address),
		(&mut form.landmark, args.landmark),
		(&mut form.pin_code, args.pin_code),
		(&mut form.city, args.city),
		(&mut form.state, args.state),
		(&mut form.special_instructions, args.instructions),
	];
	for (field, value) in overrides {
		if value.is_some() {
			*field = value;
		}
	}
	form
}

async fn checkout(engine: &MarketEngine, command: CheckoutCommand) -> Result<String, Box<dyn Error>> {
	let currency = engine.config().market.currency.as_str();
	let mut wizard = engine.checkout();
	wizard.resume().await?;

	let result = match command {
		CheckoutCommand::Select {
			product_id,
			quantity,
		} => wizard
			.select_product(product_id, quantity)
			.await
			.map(|s| {
				format!(
					"Selected {} x{} {} ({} available)",
					s.product.name, s.quantity, s.product.unit, s.available_quantity
				)
			}),
		CheckoutCommand::Quantity { quantity } => wizard
			.update_quantity(quantity)
			.await
			.map(|s| format!("Quantity set to {} {}", s.quantity, s.product.unit)),
		CheckoutCommand::Delivery(args) => {
			let form = delivery_form(wizard.delivery_defaults().await?, args);
			wizard
				.submit_delivery(form)
				.await
				.map(|d| format!("Delivering to {}, {}", d.full_name, d.formatted_address()))
		},
		CheckoutCommand::Bill => wizard
			.review_bill()
			.await
			.map(|bill| views::bill(&bill, currency)),
		CheckoutCommand::Confirm { payment_method } => {
			wizard.confirm(&payment_method).await.map(|order| {
				format!(
					"Order #{} placed, total {}",
					order.id(),
					format_amount(order.total_amount(), currency)
				)
			})
		},
		CheckoutCommand::Status => Ok(views::step(wizard.current_step())),
	};

	match result {
		Ok(text) => Ok(text),
		Err(CheckoutError::Validation(errors)) => {
			Ok(format!("Please correct:\n{}", views::field_errors(&errors)))
		},
		Err(CheckoutError::MissingPrecondition {
			required,
			redirect_to,
		}) => Ok(format!(
			"Missing {}, continue with {}.",
			required, redirect_to
		)),
		Err(CheckoutError::ProductNotFound(_)) => Ok(views::NOT_FOUND.to_string()),
		Err(e) => Err(e.into()),
	}
}

async fn watch(engine: &MarketEngine) {
	let changes = engine.watcher().into_stream(engine.poll_interval());
	tokio::pin!(changes);
	println!(
		"Watching orders every {}s, press Ctrl-C to stop",
		engine.poll_interval().as_secs()
	);

	loop {
		tokio::select! {
			Some(change) = changes.next() => println!("{}", views::status_change(&change)),
			_ = tokio::signal::ctrl_c() => break,
		}
	}
}
