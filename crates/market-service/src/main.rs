//! Main entry point for the marketplace service.
//!
//! A command-line front end over the order lifecycle engine: browse the
//! catalog, walk through checkout one step per invocation, inspect and move
//! orders along their lifecycle, and watch for status changes.

use clap::{Args as ClapArgs, Parser, Subcommand};
use market_config::Config;
use market_core::OrderFilter;
use market_types::{OrderId, OrderStatus};
use std::path::PathBuf;

mod commands;
mod factory_registry;
mod views;

/// Command-line arguments for the marketplace service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config/market.toml", env = "MARKET_CONFIG")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// List the products on sale
	Catalog,
	/// Walk through checkout
	#[command(subcommand)]
	Checkout(CheckoutCommand),
	/// List placed orders, newest first
	Orders {
		#[arg(short, long, default_value_t = OrderFilter::All)]
		filter: OrderFilter,
	},
	/// Show one order
	Order { id: OrderId },
	/// Move an order to another status
	Transition { id: OrderId, status: OrderStatus },
	/// Cancel an order that has not shipped
	Cancel { id: OrderId },
	/// Print the invoice of an order
	Invoice { id: OrderId },
	/// Print order status changes as they happen
	Watch,
	/// Run the engine in the foreground until Ctrl-C
	Run,
}

#[derive(Subcommand, Debug)]
enum CheckoutCommand {
	/// Select a product and quantity
	Select {
		product_id: u64,
		#[arg(allow_negative_numbers = true)]
		quantity: i64,
	},
	/// Change the quantity of the current selection
	Quantity {
		#[arg(allow_negative_numbers = true)]
		quantity: i64,
	},
	/// Enter delivery details
	Delivery(DeliveryArgs),
	/// Show the bill
	Bill,
	/// Place the order
	Confirm { payment_method: String },
	/// Show where the checkout stands
	Status,
}

#[derive(ClapArgs, Debug, Default)]
struct DeliveryArgs {
	#[arg(long)]
	full_name: Option<String>,
	#[arg(long)]
	phone: Option<String>,
	#[arg(long)]
	address: Option<String>,
	#[arg(long)]
	landmark: Option<String>,
	#[arg(long)]
	pin_code: Option<String>,
	#[arg(long)]
	city: Option<String>,
	#[arg(long)]
	state: Option<String>,
	#[arg(long)]
	instructions: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	let config_path = args.config.to_string_lossy();
	let config = Config::from_file(&config_path).await?;
	tracing::debug!("Loaded configuration [{}]", config.market.id);

	let engine = factory_registry::build_engine_from_config(config)?;
	commands::execute(&engine, args.command).await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_args_default_values() {
		let args = Args::try_parse_from(["market", "catalog"]).unwrap();

		assert_eq!(args.config, PathBuf::from("config/market.toml"));
		assert_eq!(args.log_level, "info");
		assert!(matches!(args.command, Command::Catalog));
	}

	#[test]
	fn test_parses_checkout_and_order_commands() {
		let args =
			Args::try_parse_from(["market", "checkout", "select", "3", "70"]).unwrap();
		assert!(matches!(
			args.command,
			Command::Checkout(CheckoutCommand::Select {
				product_id: 3,
				quantity: 70
			})
		));

		let args = Args::try_parse_from(["market", "checkout", "quantity", "-2"]).unwrap();
		assert!(matches!(
			args.command,
			Command::Checkout(CheckoutCommand::Quantity { quantity: -2 })
		));

		let args =
			Args::try_parse_from(["market", "transition", "#482913", "packed"]).unwrap();
		match args.command {
			Command::Transition { id, status } => {
				assert_eq!(id.value(), 482913);
				assert_eq!(status, OrderStatus::Processing);
			},
			other => panic!("unexpected command: {:?}", other),
		}

		let args = Args::try_parse_from(["market", "orders", "--filter", "active"]).unwrap();
		assert!(matches!(
			args.command,
			Command::Orders {
				filter: OrderFilter::Active
			}
		));
	}

	#[test]
	fn test_rejects_malformed_ids() {
		assert!(Args::try_parse_from(["market", "order", "12"]).is_err());
		assert!(Args::try_parse_from(["market", "transition", "482913", "lost"]).is_err());
	}
}
