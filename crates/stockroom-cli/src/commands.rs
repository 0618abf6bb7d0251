//! `products` and `users` command handlers.
//!
//! Results are written to `out` as pretty-printed JSON. A lookup or edit that
//! finds nothing is reported as an error so the process exits non-zero.

use crate::cli::{ProductsCommand, UsersCommand};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::io::Write;
use stockroom_catalog::{
    CatalogConfig, Product, ProductsRepository, ProductsService, User, UsersRepository,
};
use tracing::info;

/// Run a `products` subcommand.
pub fn products(
    config: &CatalogConfig,
    command: &ProductsCommand,
    out: &mut impl Write,
) -> Result<()> {
    let repository = ProductsRepository::from_config(config);

    match command {
        ProductsCommand::List => print_json(out, &repository.products()?),
        ProductsCommand::Get { id } => {
            let product = repository
                .get_product(*id)?
                .with_context(|| format!("Product {id} not found"))?;
            print_json(out, &product)
        }
        ProductsCommand::Add {
            name,
            category,
            price,
            currency,
        } => {
            let mut product = Product::new(name, category, *price, currency);
            if !repository.insert_product(&mut product)? {
                bail!("Product id {} is already taken", product.id);
            }
            info!("Added product {} ({})", product.id, product.name);
            print_json(out, &product)
        }
        ProductsCommand::Update {
            id,
            name,
            category,
            price,
            currency,
        } => {
            let mut product = repository
                .get_product(*id)?
                .with_context(|| format!("Product {id} not found"))?;
            if let Some(name) = name {
                product.name.clone_from(name);
            }
            if let Some(category) = category {
                product.category.clone_from(category);
            }
            if let Some(price) = price {
                product.price = *price;
            }
            if let Some(currency) = currency {
                product.currency.clone_from(currency);
            }
            if !repository.update_product(&product)? {
                bail!("Product {id} not found");
            }
            print_json(out, &product)
        }
        ProductsCommand::Delete { id } => {
            if !repository.delete_product(*id)? {
                bail!("Product {id} not found");
            }
            info!("Deleted product {}", id);
            Ok(())
        }
        ProductsCommand::Category { category } => {
            let service = ProductsService::new(repository);
            print_json(out, &service.products_by_category(category))
        }
        ProductsCommand::Search { query } => {
            let service = ProductsService::new(repository);
            print_json(out, &service.search_by_name(query))
        }
    }
}

/// Run a `users` subcommand.
pub fn users(config: &CatalogConfig, command: &UsersCommand, out: &mut impl Write) -> Result<()> {
    let repository = UsersRepository::from_config(config);

    match command {
        UsersCommand::Get { username } => {
            let user = repository
                .get_user(username)?
                .with_context(|| format!("User {username} not found"))?;
            print_json(out, &user)
        }
        UsersCommand::Add {
            username,
            password_hash,
        } => {
            let user = User::new(username, *password_hash);
            if !repository.create_user(&user)? {
                bail!("User {username} already exists");
            }
            info!("Created user {}", username);
            print_json(out, &user)
        }
        UsersCommand::Delete { username } => {
            if !repository.delete_user(username)? {
                bail!("User {username} not found");
            }
            info!("Deleted user {}", username);
            Ok(())
        }
        UsersCommand::SetPassword {
            username,
            password_hash,
        } => {
            if !repository.update_password(username, *password_hash)? {
                bail!("User {username} not found");
            }
            info!("Updated password of {}", username);
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
