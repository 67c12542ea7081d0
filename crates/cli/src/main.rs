//! Pasar CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations (schema + session table)
//! pasar-cli migrate
//!
//! # Seed categories, products and coupons
//! pasar-cli seed demo/seed.yaml
//!
//! # Create a 10% coupon capped at 25 000, valid for 30 days
//! pasar-cli coupon create -c HEMAT10 --percent 10 --max-discount 25000 --days 30
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Load catalog and coupons from YAML
//! - `coupon create` / `coupon show` - Manage coupons

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;

use commands::coupon::NewCoupon;

#[derive(Parser)]
#[command(name = "pasar-cli")]
#[command(author, version, about = "Pasar CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed catalog and coupons from a YAML file
    Seed {
        /// Path to the seed file
        file: PathBuf,
    },
    /// Manage coupons
    Coupon {
        #[command(subcommand)]
        action: CouponAction,
    },
}

#[derive(Subcommand)]
enum CouponAction {
    /// Create a new coupon valid from now
    Create {
        /// Coupon code (stored uppercase)
        #[arg(short, long)]
        code: String,

        /// Percent off the subtotal
        #[arg(long, conflicts_with = "fixed")]
        percent: Option<Decimal>,

        /// Fixed amount off
        #[arg(long)]
        fixed: Option<Decimal>,

        /// Cap on a percentage discount
        #[arg(long)]
        max_discount: Option<Decimal>,

        /// Minimum subtotal
        #[arg(long)]
        min_purchase: Option<Decimal>,

        /// Total redemptions allowed
        #[arg(long)]
        usage_limit: Option<i32>,

        /// Redemptions allowed per registered customer
        #[arg(long)]
        per_user: Option<i32>,

        /// Days the coupon stays valid
        #[arg(short, long, default_value_t = 30)]
        days: i64,
    },
    /// Show a coupon and its usage
    Show {
        /// Coupon code
        code: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file } => {
            commands::seed::run(&file).await?;
        }
        Commands::Coupon { action } => match action {
            CouponAction::Create {
                code,
                percent,
                fixed,
                max_discount,
                min_purchase,
                usage_limit,
                per_user,
                days,
            } => {
                commands::coupon::create(NewCoupon {
                    code,
                    percent,
                    fixed,
                    max_discount,
                    min_purchase,
                    usage_limit,
                    usage_limit_per_user: per_user,
                    days,
                })
                .await?;
            }
            CouponAction::Show { code } => commands::coupon::show(&code).await?,
        },
    }
    Ok(())
}
