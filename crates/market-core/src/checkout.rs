//! Checkout wizard.
//!
//! Drives a purchase through product selection, delivery details and billing
//! to a confirmed order. Drafts are persisted in the Record Store after every
//! step, so a wizard rebuilt with [`CheckoutWizard::resume`] continues where
//! the previous one stopped. Each step checks that its upstream draft exists
//! and sends the buyer back to the missing step otherwise.

use crate::catalog::CatalogInterface;
use crate::engine::event_bus::EventBus;
use crate::identity::IdentityProvider;
use chrono::Utc;
use market_config::CheckoutConfig;
use market_storage::{StorageError, StorageService};
use market_types::{
	clamp_quantity, Bill, CheckoutEvent, CheckoutStep, DeliveryDetails, DeliveryForm,
	DraftSelection, FieldErrors, MarketEvent, Order, OrderEvent, OrderId, StorageKey,
};
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Random draws attempted before falling back to a scan for a free id.
const RANDOM_ID_ATTEMPTS: usize = 64;

/// Errors that can occur while checking out.
#[derive(Debug, Error)]
pub enum CheckoutError {
	/// One or more fields failed validation. Nothing was persisted.
	#[error("Validation failed: {0}")]
	Validation(FieldErrors),
	/// A step was requested before the data it depends on exists.
	#[error("Missing {required}; continue from {redirect_to}")]
	MissingPrecondition {
		required: &'static str,
		redirect_to: CheckoutStep,
	},
	#[error("Product not found: {0}")]
	ProductNotFound(u64),
	#[error("Catalog error: {0}")]
	Catalog(String),
	#[error("No unused order id is left")]
	OrderIdsExhausted,
	#[error("Storage error: {0}")]
	Storage(String),
}

impl From<StorageError> for CheckoutError {
	fn from(err: StorageError) -> Self {
		CheckoutError::Storage(err.to_string())
	}
}

impl CheckoutError {
	fn single_field(field: &'static str, message: impl Into<String>) -> Self {
		let mut errors = FieldErrors::default();
		errors.push(field, message);
		CheckoutError::Validation(errors)
	}
}

/// Picks a six-digit id not present in `taken`.
///
/// Tries random ids first and scans the id space when the random draws keep
/// colliding, so an id is found whenever one is free.
fn allocate_order_id(taken: &HashSet<OrderId>, rng: &mut impl Rng) -> Option<OrderId> {
	let is_free = |id: &OrderId| !taken.contains(id);

	(0..RANDOM_ID_ATTEMPTS)
		.filter_map(|_| OrderId::new(rng.gen_range(OrderId::MIN..=OrderId::MAX)))
		.find(is_free)
		.or_else(|| {
			(OrderId::MIN..=OrderId::MAX)
				.filter_map(OrderId::new)
				.find(is_free)
		})
}

/// Pricing and payment options applied at checkout.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
	pub delivery_fee: Decimal,
	pub payment_methods: Vec<String>,
}

impl From<&CheckoutConfig> for CheckoutSettings {
	fn from(config: &CheckoutConfig) -> Self {
		Self {
			delivery_fee: config.delivery_fee,
			payment_methods: config.payment_methods.clone(),
		}
	}
}

/// One buyer's pass through the checkout.
pub struct CheckoutWizard {
	storage: Arc<StorageService>,
	catalog: Arc<dyn CatalogInterface>,
	identity: Arc<dyn IdentityProvider>,
	event_bus: EventBus,
	settings: CheckoutSettings,
	step: CheckoutStep,
	last_delivery_input: Option<DeliveryForm>,
	confirmed: Option<OrderId>,
}

impl CheckoutWizard {
	pub fn new(
		storage: Arc<StorageService>,
		catalog: Arc<dyn CatalogInterface>,
		identity: Arc<dyn IdentityProvider>,
		event_bus: EventBus,
		settings: CheckoutSettings,
	) -> Self {
		Self {
			storage,
			catalog,
			identity,
			event_bus,
			settings,
			step: CheckoutStep::SelectingProduct,
			last_delivery_input: None,
			confirmed: None,
		}
	}

	pub fn current_step(&self) -> CheckoutStep {
		self.step
	}

	/// The delivery form of the last rejected submission, for redisplay.
	pub fn last_delivery_input(&self) -> Option<&DeliveryForm> {
		self.last_delivery_input.as_ref()
	}

	/// Id of the order placed by [`confirm`](Self::confirm), once confirmed.
	pub fn confirmed_order(&self) -> Option<OrderId> {
		self.confirmed
	}

	fn set_step(&mut self, to: CheckoutStep) {
		if self.step == to {
			return;
		}
		let from = std::mem::replace(&mut self.step, to);
		tracing::debug!(from = %from, to = %to, "Checkout step changed");
		self.event_bus
			.publish(MarketEvent::Checkout(CheckoutEvent::StepChanged { from, to }))
			.ok();
	}

	fn redirect(
		&mut self,
		requested: CheckoutStep,
		required: &'static str,
		redirect_to: CheckoutStep,
	) -> CheckoutError {
		tracing::info!(requested = %requested, redirect_to = %redirect_to, "Missing {}", required);
		self.event_bus
			.publish(MarketEvent::Checkout(CheckoutEvent::Redirected {
				requested,
				redirect_to,
			}))
			.ok();
		self.set_step(redirect_to);
		CheckoutError::MissingPrecondition {
			required,
			redirect_to,
		}
	}

	async fn load_selection(&self) -> Result<Option<DraftSelection>, CheckoutError> {
		Ok(self.storage.get(StorageKey::DraftSelection).await?)
	}

	async fn load_delivery(&self) -> Result<Option<DeliveryDetails>, CheckoutError> {
		Ok(self.storage.get(StorageKey::DraftDelivery).await?)
	}

	async fn require_selection(
		&mut self,
		requested: CheckoutStep,
	) -> Result<DraftSelection, CheckoutError> {
		match self.load_selection().await? {
			Some(selection) => Ok(selection),
			None => Err(self.redirect(
				requested,
				"product selection",
				CheckoutStep::SelectingProduct,
			)),
		}
	}

	async fn require_delivery(
		&mut self,
		requested: CheckoutStep,
	) -> Result<DeliveryDetails, CheckoutError> {
		match self.load_delivery().await? {
			Some(details) => Ok(details),
			None => Err(self.redirect(
				requested,
				"delivery details",
				CheckoutStep::EnteringDelivery,
			)),
		}
	}

	/// Recomputes the furthest reachable step from the persisted drafts.
	pub async fn resume(&mut self) -> Result<CheckoutStep, CheckoutError> {
		let step = match (
			self.load_selection().await?,
			self.load_delivery().await?,
		) {
			(None, _) => CheckoutStep::SelectingProduct,
			(Some(_), None) => CheckoutStep::EnteringDelivery,
			(Some(_), Some(_)) => CheckoutStep::ReviewingBill,
		};
		self.step = step;
		Ok(step)
	}

	/// Selects a product, clamping the quantity into what the seller can supply.
	#[instrument(skip_all, fields(product_id = product_id))]
	pub async fn select_product(
		&mut self,
		product_id: u64,
		requested_quantity: i64,
	) -> Result<DraftSelection, CheckoutError> {
		let product = self
			.catalog
			.get_product(product_id)
			.await
			.map_err(|e| CheckoutError::Catalog(e.to_string()))?
			.ok_or(CheckoutError::ProductNotFound(product_id))?;

		let quantity = clamp_quantity(requested_quantity, product.available_quantity)
			.ok_or_else(|| CheckoutError::single_field("quantity", "product is out of stock"))?;
		if i64::from(quantity.get()) != requested_quantity {
			tracing::debug!(
				requested = requested_quantity,
				clamped = quantity.get(),
				"Quantity adjusted to availability"
			);
		}

		let selection = DraftSelection {
			product: product.snapshot(),
			available_quantity: product.available_quantity,
			quantity,
			selected_at: Utc::now(),
		};
		self.storage
			.set(StorageKey::DraftSelection, &selection)
			.await?;

		tracing::info!(quantity = quantity.get(), "Product selected");
		self.confirmed = None;
		self.set_step(CheckoutStep::EnteringDelivery);
		Ok(selection)
	}

	/// Changes the quantity of the current selection, re-clamped against the
	/// availability captured when the product was selected.
	pub async fn update_quantity(
		&mut self,
		requested_quantity: i64,
	) -> Result<DraftSelection, CheckoutError> {
		let mut selection = self.require_selection(self.step).await?;
		selection.quantity = clamp_quantity(requested_quantity, selection.available_quantity)
			.ok_or_else(|| CheckoutError::single_field("quantity", "product is out of stock"))?;

		self.storage
			.set(StorageKey::DraftSelection, &selection)
			.await?;
		Ok(selection)
	}

	/// Initial values for the delivery form.
	///
	/// Prefers the persisted delivery draft; otherwise prefills the name of
	/// the signed-in user.
	pub async fn delivery_defaults(&self) -> Result<DeliveryForm, CheckoutError> {
		if let Some(details) = self.load_delivery().await? {
			return Ok(DeliveryForm::from(&details));
		}
		Ok(DeliveryForm {
			full_name: self.identity.current_user().and_then(|u| u.name),
			..Default::default()
		})
	}

	/// Validates and stores the delivery details.
	///
	/// On validation failure nothing is stored, the wizard stays on the
	/// delivery step and the attempted form is kept for redisplay.
	#[instrument(skip_all)]
	pub async fn submit_delivery(
		&mut self,
		form: DeliveryForm,
	) -> Result<DeliveryDetails, CheckoutError> {
		self.require_selection(CheckoutStep::EnteringDelivery)
			.await?;
		self.set_step(CheckoutStep::EnteringDelivery);

		let details = match form.validate() {
			Ok(details) => details,
			Err(errors) => {
				tracing::debug!(errors = %errors, "Delivery details rejected");
				self.last_delivery_input = Some(form);
				return Err(CheckoutError::Validation(errors));
			},
		};

		self.storage
			.set(StorageKey::DraftDelivery, &details)
			.await?;
		self.last_delivery_input = None;
		self.set_step(CheckoutStep::ReviewingBill);
		Ok(details)
	}

	/// Computes the bill from the live drafts.
	pub async fn review_bill(&mut self) -> Result<Bill, CheckoutError> {
		let selection = self.require_selection(CheckoutStep::ReviewingBill).await?;
		self.require_delivery(CheckoutStep::ReviewingBill).await?;

		self.set_step(CheckoutStep::ReviewingBill);
		Ok(Bill::compute(&selection, self.settings.delivery_fee))
	}

	/// Places the order.
	///
	/// The id is allocated and the order appended in one atomic update of the
	/// orders collection, so a failure leaves the collection untouched. Both
	/// drafts are cleared afterwards.
	#[instrument(skip_all, fields(payment_method = %payment_method))]
	pub async fn confirm(&mut self, payment_method: &str) -> Result<Order, CheckoutError> {
		let payment_method = payment_method.trim();
		if !self
			.settings
			.payment_methods
			.iter()
			.any(|m| m == payment_method)
		{
			return Err(CheckoutError::single_field(
				"paymentMethod",
				format!("unsupported payment method '{}'", payment_method),
			));
		}

		let selection = self.require_selection(CheckoutStep::Confirmed).await?;
		let delivery = self.require_delivery(CheckoutStep::Confirmed).await?;
		let bill = Bill::compute(&selection, self.settings.delivery_fee);

		let order = self
			.storage
			.update_collection(StorageKey::Orders, |orders: &mut Vec<Order>| {
				let taken: HashSet<OrderId> = orders.iter().map(Order::id).collect();
				let id = allocate_order_id(&taken, &mut rand::thread_rng())
					.ok_or(CheckoutError::OrderIdsExhausted)?;
				let order = Order::new(
					id,
					selection.product,
					selection.quantity,
					delivery,
					Utc::now(),
					bill.total_amount,
					payment_method,
				);
				orders.push(order.clone());
				Ok::<_, CheckoutError>(order)
			})
			.await?;

		for key in [StorageKey::DraftSelection, StorageKey::DraftDelivery] {
			if let Err(e) = self.storage.remove(key).await {
				tracing::warn!(key = key.as_str(), error = %e, "Failed to clear checkout draft");
			}
		}

		tracing::info!(
			order_id = %order.id(),
			total = %order.total_amount(),
			"Order placed"
		);
		self.event_bus
			.publish(MarketEvent::Order(OrderEvent::Placed {
				order_id: order.id(),
				total_amount: order.total_amount(),
			}))
			.ok();

		self.confirmed = Some(order.id());
		self.set_step(CheckoutStep::Confirmed);
		Ok(order)
	}

	/// Moves one step back without touching the drafts.
	///
	/// Going back from a confirmed checkout starts a new one.
	pub fn go_back(&mut self) -> CheckoutStep {
		let previous = match self.step {
			CheckoutStep::SelectingProduct | CheckoutStep::EnteringDelivery => {
				CheckoutStep::SelectingProduct
			},
			CheckoutStep::ReviewingBill => CheckoutStep::EnteringDelivery,
			CheckoutStep::Confirmed => {
				self.confirmed = None;
				CheckoutStep::SelectingProduct
			},
		};
		self.set_step(previous);
		previous
	}
}
