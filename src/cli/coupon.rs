use clap::{Args, Subcommand};

use dps_store::domain::coupons::{
    CouponsService,
    models::{CouponId, NewCoupon},
};

use crate::cli::ConnectionArgs;

#[derive(Debug, Args)]
pub(crate) struct CouponCommand {
    #[command(subcommand)]
    command: CouponSubcommand,
}

#[derive(Debug, Subcommand)]
enum CouponSubcommand {
    Create(CreateCouponArgs),
    List(ListCouponArgs),
    Delete(DeleteCouponArgs),
}

#[derive(Debug, Args)]
struct CreateCouponArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Coupon code, matched case-sensitively
    #[arg(long)]
    code: String,

    /// Percent off the subtotal, 1-100
    #[arg(long)]
    percent: u8,

    /// Number of redemptions before the coupon depletes
    #[arg(long)]
    quantity: u64,
}

#[derive(Debug, Args)]
struct ListCouponArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Debug, Args)]
struct DeleteCouponArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Coupon code
    #[arg(long)]
    code: String,
}

pub(crate) async fn run(command: CouponCommand) -> Result<(), String> {
    match command.command {
        CouponSubcommand::Create(args) => create(args).await,
        CouponSubcommand::List(args) => list(args).await,
        CouponSubcommand::Delete(args) => delete(args).await,
    }
}

async fn create(args: CreateCouponArgs) -> Result<(), String> {
    let (app, admin) = args.connection.context().await?;

    let coupon = app
        .coupons
        .create_coupon(
            admin,
            NewCoupon {
                id: CouponId::new(),
                code: args.code,
                discount_percentage: args.percent,
                quantity: args.quantity,
            },
        )
        .await
        .map_err(|error| format!("failed to create coupon: {error}"))?;

    println!("coupon_uuid: {}", coupon.id);
    println!("code: {}", coupon.code);
    println!("percent: {}", coupon.discount_percentage);
    println!("quantity: {}", coupon.quantity);

    Ok(())
}

async fn list(args: ListCouponArgs) -> Result<(), String> {
    let (app, admin) = args.connection.context().await?;

    let coupons = app
        .coupons
        .list_coupons(admin)
        .await
        .map_err(|error| format!("failed to list coupons: {error}"))?;

    for coupon in coupons {
        println!(
            "{}  {}  {}%  remaining={}",
            coupon.id, coupon.code, coupon.discount_percentage, coupon.quantity
        );
    }

    Ok(())
}

async fn delete(args: DeleteCouponArgs) -> Result<(), String> {
    let (app, admin) = args.connection.context().await?;

    app.coupons
        .delete_coupon(admin, &args.code)
        .await
        .map_err(|error| format!("failed to delete coupon: {error}"))?;

    println!("deleted: {}", args.code);

    Ok(())
}
