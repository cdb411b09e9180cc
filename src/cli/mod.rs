use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use dps_store::{
    auth::{AdminPolicy, UserId},
    context::AppContext,
};

mod coupon;
mod db;
mod order;
mod product;

#[derive(Debug, Parser)]
#[command(name = "dps-store", about = "Storefront admin console", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Product(product::ProductCommand),
    Coupon(coupon::CouponCommand),
    Order(order::OrderCommand),
    Db(db::DbCommand),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        match self.command {
            Commands::Product(command) => product::run(command).await,
            Commands::Coupon(command) => coupon::run(command).await,
            Commands::Order(command) => order::run(command).await,
            Commands::Db(command) => db::run(command).await,
        }
    }
}

/// Connection flags shared by every command that talks to the store.
///
/// The console always acts as the configured admin identity; the services
/// still run each operation through the capability policy.
#[derive(Debug, Args)]
pub(crate) struct ConnectionArgs {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Identity the console acts as
    #[arg(long, env = "DPS_ADMIN_UID")]
    admin_uid: Uuid,
}

impl ConnectionArgs {
    pub(crate) async fn context(&self) -> Result<(AppContext, UserId), String> {
        let admin = UserId::from_uuid(self.admin_uid);

        let app = AppContext::from_database_url(&self.database_url, AdminPolicy::new(admin))
            .await
            .map_err(|error| format!("failed to initialize app context: {error}"))?;

        Ok((app, admin))
    }
}
