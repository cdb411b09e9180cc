use clap::{Args, Subcommand};
use smallvec::SmallVec;
use uuid::Uuid;

use dps_store::domain::catalog::{
    CatalogService,
    models::{ColorOption, NewProduct, ProductId, SizeOption},
};

use crate::cli::ConnectionArgs;

#[derive(Debug, Args)]
pub(crate) struct ProductCommand {
    #[command(subcommand)]
    command: ProductSubcommand,
}

#[derive(Debug, Subcommand)]
enum ProductSubcommand {
    Create(CreateProductArgs),
    List(ListProductArgs),
    Delete(DeleteProductArgs),
}

#[derive(Debug, Args)]
struct CreateProductArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Product display name
    #[arg(long)]
    name: String,

    /// Markdown description
    #[arg(long, default_value = "")]
    description: String,

    /// Flat price in won, applied to sizes without their own price
    #[arg(long)]
    price: Option<u64>,

    /// Size, either `M` or `M:42000` for a per-size price; repeatable
    #[arg(long = "size", required = true)]
    sizes: Vec<String>,

    /// Color as `name=image-url`; repeatable
    #[arg(long = "color", required = true)]
    colors: Vec<String>,

    /// Waive the shipping fee for this product
    #[arg(long)]
    shipping_exempt: bool,
}

#[derive(Debug, Args)]
struct ListProductArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Debug, Args)]
struct DeleteProductArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Product UUID
    #[arg(long)]
    uuid: Uuid,
}

pub(crate) async fn run(command: ProductCommand) -> Result<(), String> {
    match command.command {
        ProductSubcommand::Create(args) => create(args).await,
        ProductSubcommand::List(args) => list(args).await,
        ProductSubcommand::Delete(args) => delete(args).await,
    }
}

async fn create(args: CreateProductArgs) -> Result<(), String> {
    let sizes = args
        .sizes
        .iter()
        .map(|s| parse_size(s))
        .collect::<Result<SmallVec<_>, String>>()?;

    let colors = args
        .colors
        .iter()
        .map(|c| parse_color(c))
        .collect::<Result<SmallVec<_>, String>>()?;

    let (app, admin) = args.connection.context().await?;

    let product = app
        .catalog
        .create_product(
            admin,
            NewProduct {
                id: ProductId::new(),
                name: args.name,
                description: args.description,
                price: args.price,
                sizes,
                colors,
                shipping_fee_exempt: args.shipping_exempt,
            },
        )
        .await
        .map_err(|error| format!("failed to create product: {error}"))?;

    println!("product_uuid: {}", product.id);
    println!("name: {}", product.name);

    Ok(())
}

async fn list(args: ListProductArgs) -> Result<(), String> {
    let (app, _admin) = args.connection.context().await?;

    let mut products = app
        .catalog
        .list_products()
        .await
        .map_err(|error| format!("failed to list products: {error}"))?;

    // The console lists alphabetically; the storefront shows newest first.
    products.sort_by(|a, b| a.name.cmp(&b.name));

    for product in products {
        let price = product
            .price
            .map_or_else(|| "per-size".to_string(), |p| p.to_string());

        println!(
            "{}  {}  price={}  exempt={}",
            product.id, product.name, price, product.shipping_fee_exempt
        );
    }

    Ok(())
}

async fn delete(args: DeleteProductArgs) -> Result<(), String> {
    let (app, admin) = args.connection.context().await?;

    app.catalog
        .delete_product(admin, ProductId::from_uuid(args.uuid))
        .await
        .map_err(|error| format!("failed to delete product: {error}"))?;

    println!("deleted: {}", args.uuid);

    Ok(())
}

/// Parse `M` or `M:42000` into a size option.
fn parse_size(input: &str) -> Result<SizeOption, String> {
    match input.split_once(':') {
        None => Ok(SizeOption {
            name: input.to_string(),
            price: None,
        }),
        Some((name, price)) => {
            let price = price
                .parse::<u64>()
                .map_err(|_| format!("invalid size price in {input:?}"))?;

            Ok(SizeOption {
                name: name.to_string(),
                price: Some(price),
            })
        }
    }
}

/// Parse `name=image-url` into a color option.
fn parse_color(input: &str) -> Result<ColorOption, String> {
    let (name, image) = input
        .split_once('=')
        .ok_or_else(|| format!("color must be name=image, got {input:?}"))?;

    if name.is_empty() || image.is_empty() {
        return Err(format!("color must be name=image, got {input:?}"));
    }

    Ok(ColorOption {
        name: name.to_string(),
        image: image.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_parse_with_and_without_price() {
        assert_eq!(
            parse_size("M"),
            Ok(SizeOption {
                name: "M".to_string(),
                price: None,
            })
        );
        assert_eq!(
            parse_size("XL:42000"),
            Ok(SizeOption {
                name: "XL".to_string(),
                price: Some(42_000),
            })
        );
        assert!(parse_size("XL:abc").is_err());
    }

    #[test]
    fn colors_require_name_and_image() {
        assert_eq!(
            parse_color("Black=black.jpg"),
            Ok(ColorOption {
                name: "Black".to_string(),
                image: "black.jpg".to_string(),
            })
        );
        assert!(parse_color("Black").is_err());
        assert!(parse_color("=black.jpg").is_err());
    }
}
