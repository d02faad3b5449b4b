//! Order lifecycle engine for the agricultural marketplace.
//!
//! Buyers pick a product, enter delivery details, review the bill and confirm
//! an order through the [`checkout::CheckoutWizard`]. Placed orders move
//! through their lifecycle via the [`state::OrderStateMachine`] and are
//! tracked by the [`monitoring::OrderWatcher`]. The [`builder::MarketBuilder`]
//! assembles everything into a [`engine::MarketEngine`].

pub mod builder;
pub mod catalog;
pub mod checkout;
pub mod engine;
pub mod identity;
pub mod invoice;
pub mod monitoring;
pub mod query;
pub mod state;

pub use builder::{BuilderError, MarketBuilder, MarketFactories};
pub use catalog::{CatalogError, CatalogInterface, StaticCatalog};
pub use checkout::{CheckoutError, CheckoutSettings, CheckoutWizard};
pub use engine::{event_bus::EventBus, EngineError, MarketEngine};
pub use identity::{ConfiguredIdentity, CurrentUser, IdentityProvider};
pub use invoice::render_invoice;
pub use monitoring::{OrderWatcher, WatcherHandle};
pub use query::{OrderFilter, OrderQuery, OrderSummary, QueryError};
pub use state::{OrderStateError, OrderStateMachine};
