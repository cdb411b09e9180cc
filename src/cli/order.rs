use clap::{Args, Subcommand};
use uuid::Uuid;

use dps_store::{
    auth::UserId,
    domain::orders::{OrdersService, models::OrderId, status::OrderStatus},
};

use crate::cli::ConnectionArgs;

#[derive(Debug, Args)]
pub(crate) struct OrderCommand {
    #[command(subcommand)]
    command: OrderSubcommand,
}

#[derive(Debug, Subcommand)]
enum OrderSubcommand {
    List(ListOrderArgs),
    Advance(AdvanceOrderArgs),
}

#[derive(Debug, Args)]
struct ListOrderArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Restrict to one shopper's orders
    #[arg(long)]
    user: Option<Uuid>,
}

#[derive(Debug, Args)]
struct AdvanceOrderArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Order UUID
    #[arg(long)]
    uuid: Uuid,

    /// Target status: confirmed, shipped, or delivered
    #[arg(long)]
    to: String,
}

pub(crate) async fn run(command: OrderCommand) -> Result<(), String> {
    match command.command {
        OrderSubcommand::List(args) => list(args).await,
        OrderSubcommand::Advance(args) => advance(args).await,
    }
}

async fn list(args: ListOrderArgs) -> Result<(), String> {
    let (app, admin) = args.connection.context().await?;

    let orders = match args.user {
        Some(user) => app.orders.list_orders_for_user(UserId::from_uuid(user)).await,
        None => app.orders.list_all_orders(admin).await,
    }
    .map_err(|error| format!("failed to list orders: {error}"))?;

    for order in orders {
        println!(
            "{}  {}  {}  total={}  payer={}",
            order.id, order.reference, order.status, order.total, order.payer
        );
    }

    Ok(())
}

async fn advance(args: AdvanceOrderArgs) -> Result<(), String> {
    let to = args
        .to
        .parse::<OrderStatus>()
        .map_err(|error| error.to_string())?;

    let (app, admin) = args.connection.context().await?;

    let order = app
        .orders
        .advance_status(admin, OrderId::from_uuid(args.uuid), to)
        .await
        .map_err(|error| format!("failed to advance order: {error}"))?;

    println!("{}  {}  now {}", order.id, order.reference, order.status);

    Ok(())
}
