//! Copy-Trade Purchase Admin
//!
//! Console for reviewing copy-trade purchases and driving them through
//! their lifecycle (approve, reject, end trade, delete, create on behalf of
//! a user), plus maintenance of the product catalog they are bought from.

mod api;
mod config;
mod db;
mod error;
mod lifecycle;
mod models;
#[cfg(test)]
mod test_utils;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::{AdminClient, Deduction, ProductRequest, ProductUpdate, PurchaseFilter};
use crate::config::AdminConfig;
use crate::db::{ActionOutcome, Database};
use crate::error::AdminError;
use crate::lifecycle::{
    available_actions, AdminAction, BalanceEffect, FinalValueSource, PurchaseCoordinator,
    PurchaseDraft,
};
use crate::models::{CopyTradeProduct, Purchase, TradeStatus};

const CREATE_FAILURE_MESSAGE: &str = "Failed to create purchase";

/// Copy-trade purchase admin CLI.
#[derive(Parser)]
#[command(name = "ctadmin")]
#[command(about = "Manage copy-trade purchases from the command line", long_about = None)]
struct Cli {
    /// Database URL (overrides ADMIN_DATABASE_URL)
    #[arg(short, long)]
    database: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// End the session and forget the stored token
    Logout,

    /// Manage copy-trade products (lists them by default)
    Products {
        #[command(subcommand)]
        command: Option<ProductCommands>,
    },

    /// List purchases
    List {
        /// Only purchases in this status (pending, active, completed, cancelled)
        #[arg(short, long)]
        status: Option<TradeStatus>,

        /// Only purchases owned by this user
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Show one purchase and the actions available on it
    Show {
        id: String,
    },

    /// List all purchases of one user
    UserPurchases {
        user_id: String,
    },

    /// Create a purchase on behalf of a user
    Create {
        /// Owning user ID
        #[arg(short, long)]
        user: String,

        /// Copy-trade product ID
        #[arg(short, long)]
        product: Option<String>,

        /// Investment amount in USD (defaults to the product minimum)
        #[arg(short, long)]
        amount: Option<Decimal>,

        /// Create active and deduct the investment immediately
        #[arg(long)]
        auto_approve: bool,
    },

    /// Approve pending purchases
    Approve {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Reject pending purchases
    Reject {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// End active trades and settle them
    End {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Delete purchases in any status (no refund or settlement)
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Show current configuration
    Config,

    /// Show recent admin actions
    Journal {
        #[arg(short = 'n', long, default_value = "20")]
        limit: u32,
    },
}

#[derive(Subcommand)]
enum ProductCommands {
    /// List products
    List,

    /// Show one product
    Show { id: String },

    /// Add a product to the catalog
    Create(NewProduct),

    /// Change some fields of a product
    Update {
        id: String,

        #[command(flatten)]
        fields: ProductFields,
    },

    /// Remove a product from the catalog
    Delete { id: String },
}

#[derive(Args)]
struct NewProduct {
    #[arg(long)]
    title: String,

    #[arg(long)]
    description: String,

    /// Risk tier (low, medium, high)
    #[arg(long)]
    risk: String,

    /// Minimum investment in USD
    #[arg(long)]
    min: Decimal,

    /// Maximum investment in USD
    #[arg(long)]
    max: Decimal,

    /// Lower bound of the ROI band, in percent
    #[arg(long, default_value = "0")]
    roi_min: Decimal,

    /// Upper bound of the ROI band, in percent
    #[arg(long, default_value = "0")]
    roi_max: Decimal,

    /// Duration in days
    #[arg(long, default_value = "1")]
    duration: u32,

    #[arg(long)]
    recommended: bool,
}

impl From<NewProduct> for ProductRequest {
    fn from(args: NewProduct) -> Self {
        ProductRequest {
            trade_title: args.title,
            trade_description: args.description,
            trade_min: args.min,
            trade_max: args.max,
            trade_roi_min: args.roi_min,
            trade_roi_max: args.roi_max,
            trade_risk: args.risk,
            trade_duration: args.duration,
            is_recommended: args.recommended,
        }
    }
}

#[derive(Args)]
struct ProductFields {
    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    description: Option<String>,

    #[arg(long)]
    risk: Option<String>,

    #[arg(long)]
    min: Option<Decimal>,

    #[arg(long)]
    max: Option<Decimal>,

    #[arg(long)]
    roi_min: Option<Decimal>,

    #[arg(long)]
    roi_max: Option<Decimal>,

    #[arg(long)]
    duration: Option<u32>,

    #[arg(long)]
    recommended: Option<bool>,
}

impl From<ProductFields> for ProductUpdate {
    fn from(args: ProductFields) -> Self {
        ProductUpdate {
            trade_title: args.title,
            trade_description: args.description,
            trade_min: args.min,
            trade_max: args.max,
            trade_roi_min: args.roi_min,
            trade_roi_max: args.roi_max,
            trade_risk: args.risk,
            trade_duration: args.duration,
            is_recommended: args.recommended,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = AdminConfig::from_env().context("Failed to load configuration")?;
    if let Some(database) = cli.database {
        config.database_url = database;
    }

    let db = Database::new(&config.database_url)
        .await
        .context("Failed to open local store")?;

    // Explicit token wins over the stored session
    let token = match config.api_token.clone() {
        Some(token) => Some(token),
        None => db.load_session().await?.map(|s| s.token),
    };
    let coordinator = PurchaseCoordinator::new(AdminClient::new(&config, token)?);
    let client = coordinator.api();

    match cli.command {
        Commands::Login { username, password } => {
            let token = client
                .login(&username, &password)
                .await
                .map_err(|e| anyhow!(e.user_message("Login failed")))?;
            db.save_session(&token, Some(&username)).await?;

            info!(username = %username, "Session stored");
            println!("Logged in as {}", username);
        }

        Commands::Logout => {
            if client.has_token() {
                if let Err(e) = client.logout().await {
                    warn!(error = %e, "Backend logout failed, clearing local session anyway");
                }
            }
            if db.clear_session().await? {
                println!("Logged out.");
            } else {
                println!("No stored session.");
            }
        }

        Commands::Products { command } => {
            run_products(&db, &coordinator, command.unwrap_or(ProductCommands::List)).await?
        }

        Commands::List { status, user } => {
            coordinator
                .set_filter(PurchaseFilter {
                    status,
                    user_id: user,
                })
                .await;

            let purchases = coordinator
                .refresh()
                .await
                .map_err(|e| anyhow!(e.user_message("Failed to fetch copytrade purchases")))?;
            print_purchases(&purchases);
        }

        Commands::Show { id } => {
            let purchase = coordinator
                .find(&id)
                .await
                .map_err(|e| anyhow!(e.user_message("Failed to fetch copytrade purchase")))?;
            print_purchase(&purchase);
        }

        Commands::UserPurchases { user_id } => {
            let purchases = client
                .list_user_purchases(&user_id)
                .await
                .map_err(|e| anyhow!(e.user_message("Failed to fetch user purchases")))?;
            print_purchases(&purchases);
        }

        Commands::Create {
            user,
            product,
            amount,
            auto_approve,
        } => {
            let catalog = coordinator
                .load_catalog()
                .await
                .map_err(|e| anyhow!(e.user_message("Failed to fetch copytrade options")))?;

            let mut draft = PurchaseDraft::new(user).with_auto_approve(auto_approve);
            if let Some(product_id) = product {
                match catalog.iter().find(|p| p.id == product_id) {
                    Some(selected) => draft.select_product(selected),
                    None => draft.product_id = Some(product_id),
                }
            }
            if let Some(amount) = amount {
                draft = draft.with_investment(amount);
            }

            match coordinator.create(&draft).await {
                Ok(outcome) => {
                    let message = outcome
                        .message
                        .clone()
                        .unwrap_or_else(|| "Purchase created successfully".to_string());
                    db.record_action(
                        "create",
                        Some(&outcome.purchase.id),
                        ActionOutcome::Succeeded,
                        Some(&message),
                    )
                    .await?;

                    println!("{}", message);
                    if let Some(note) = &outcome.note {
                        println!("Note: {}", note);
                    }
                    let effect = BalanceEffect::of_creation(
                        outcome.purchase.initial_investment,
                        auto_approve,
                    );
                    if let BalanceEffect::Debit(amount) = effect {
                        println!("Deducted: ${:.2}", amount);
                    }
                    for line in describe_deductions(&outcome.deductions) {
                        println!("  {}", line);
                    }
                    if let Some(balance) = outcome.new_account_balance {
                        println!("New account balance: ${:.2}", balance);
                    }
                    print_purchase(&outcome.purchase);
                }
                Err(e) => {
                    let message = e.user_message(CREATE_FAILURE_MESSAGE);
                    if !e.is_local() {
                        db.record_action("create", None, ActionOutcome::Failed, Some(&message))
                            .await?;
                    }
                    return Err(anyhow!(message));
                }
            }
        }

        Commands::Approve { ids } => {
            run_action(&db, &coordinator, AdminAction::Approve, &ids).await?
        }
        Commands::Reject { ids } => {
            run_action(&db, &coordinator, AdminAction::Reject, &ids).await?
        }
        Commands::End { ids } => {
            run_action(&db, &coordinator, AdminAction::EndTrade, &ids).await?
        }
        Commands::Delete { ids } => {
            run_action(&db, &coordinator, AdminAction::Delete, &ids).await?
        }

        Commands::Config => {
            println!("\n=== Admin Configuration ===\n");
            println!("API root:         {}", config.api_root());
            println!("Request timeout:  {}s", config.request_timeout_secs);
            println!("Database:         {}", config.database_url);

            let session = db.load_session().await?;
            let token_source = if config.api_token.is_some() {
                "ADMIN_API_TOKEN".to_string()
            } else if let Some(session) = &session {
                format!(
                    "stored session ({}, saved {})",
                    session.username.as_deref().unwrap_or("unknown user"),
                    session.saved_at
                )
            } else {
                "none (run 'ctadmin login')".to_string()
            };
            println!("Token:            {}", token_source);
        }

        Commands::Journal { limit } => {
            let entries = db.recent_actions(limit).await?;
            if entries.is_empty() {
                println!("No actions recorded yet.");
                return Ok(());
            }

            println!(
                "\n{:<26} {:<14} {:<26} {:<10} {}",
                "TIME", "ACTION", "TARGET", "OUTCOME", "MESSAGE"
            );
            println!("{}", "-".repeat(100));

            for entry in entries {
                println!(
                    "{:<26} {:<14} {:<26} {:<10} {}",
                    truncate(&entry.recorded_at, 25),
                    entry.action,
                    entry.target_id.as_deref().unwrap_or("-"),
                    entry.outcome,
                    entry.message.unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}

/// Apply one lifecycle action to each purchase concurrently, journaling
/// every backend outcome. Fails if any of them failed.
async fn run_action(
    db: &Database,
    coordinator: &PurchaseCoordinator<AdminClient>,
    action: AdminAction,
    ids: &[String],
) -> Result<()> {
    let results = join_all(ids.iter().map(|id| {
        async move { (id, perform(coordinator, action, id).await) }
    }))
    .await;

    let mut failures = 0;
    for (id, result) in results {
        match result {
            Ok(details) => {
                db.record_lifecycle(action, id, ActionOutcome::Succeeded, action.success_message())
                    .await?;
                println!("{}: {}", id, action.success_message());
                for detail in details {
                    println!("  {}", detail);
                }
            }
            Err(e) => {
                failures += 1;
                let message = e.user_message(action.failure_message());
                if !e.is_local() {
                    db.record_lifecycle(action, id, ActionOutcome::Failed, &message)
                        .await?;
                }
                eprintln!("{}: {}", id, message);
            }
        }
    }

    if failures > 0 {
        return Err(anyhow!("{} of {} {} requests failed", failures, ids.len(), action));
    }
    Ok(())
}

/// Run a single action and describe any balance movement it reported.
async fn perform(
    coordinator: &PurchaseCoordinator<AdminClient>,
    action: AdminAction,
    id: &str,
) -> std::result::Result<Vec<String>, AdminError> {
    let mut details = Vec::new();
    match action {
        AdminAction::Approve | AdminAction::Reject => {
            let change = if action == AdminAction::Approve {
                coordinator.approve(id).await?
            } else {
                coordinator.reject(id).await?
            };
            details.extend(describe_deductions(&change.deductions));
            if let Some(balance) = change.new_account_balance {
                details.push(format!("New account balance: ${:.2}", balance));
            }
        }
        AdminAction::EndTrade => {
            let settlement = coordinator.end_trade(id).await?;
            let mut parts = Vec::new();
            if let Some(effect) = settlement.balance_effect() {
                parts.push(format!("Credited: ${:.2}", effect.delta()));
            }
            if let Some(value) = settlement.final_value {
                parts.push(format!("Final value: ${:.2}", value));
            }
            if let Some(roi) = settlement.final_roi {
                parts.push(format!("ROI: {:.2}%", roi));
            }
            if let Some(balance) = settlement.new_account_balance {
                parts.push(format!("New account balance: ${:.2}", balance));
            }
            if !parts.is_empty() {
                details.push(parts.join(" | "));
            }
        }
        AdminAction::Delete => details.extend(coordinator.delete(id).await?),
    }
    Ok(details)
}

/// One line per token holding taken from the user's portfolio.
fn describe_deductions(deductions: &[Deduction]) -> Vec<String> {
    deductions
        .iter()
        .map(|d| {
            format!(
                "Deducted {} {} (${:.2})",
                d.token_amount.normalize(),
                d.token_name,
                d.usd_value
            )
        })
        .collect()
}

/// Product catalog maintenance. Writes are journaled against the product id.
async fn run_products(
    db: &Database,
    coordinator: &PurchaseCoordinator<AdminClient>,
    command: ProductCommands,
) -> Result<()> {
    let (action, target, result) = match command {
        ProductCommands::List => {
            let products = coordinator
                .load_catalog()
                .await
                .map_err(|e| anyhow!(e.user_message("Failed to fetch copytrade options")))?;
            print_products(&products);
            return Ok(());
        }
        ProductCommands::Show { id } => {
            let product = coordinator
                .find_product(&id)
                .await
                .map_err(|e| anyhow!(e.user_message("Failed to fetch copytrade option")))?;
            print_product(&product);
            return Ok(());
        }
        ProductCommands::Create(args) => {
            let result = coordinator.create_product(&args.into()).await;
            let target = result.as_ref().ok().map(|p| p.id.clone());
            ("create_product", target, result.map(Some))
        }
        ProductCommands::Update { id, fields } => {
            let result = coordinator.update_product(&id, &fields.into()).await;
            ("update_product", Some(id), result.map(Some))
        }
        ProductCommands::Delete { id } => {
            let result = coordinator.delete_product(&id).await;
            ("delete_product", Some(id), result.map(|_| None))
        }
    };

    match result {
        Ok(product) => {
            let message = match action {
                "create_product" => "Copytrade option created successfully",
                "update_product" => "Copytrade option updated successfully",
                _ => "Copytrade option deleted successfully",
            };
            db.record_action(action, target.as_deref(), ActionOutcome::Succeeded, Some(message))
                .await?;
            println!("{}", message);
            if let Some(product) = product {
                print_product(&product);
            }
            Ok(())
        }
        Err(e) => {
            let fallback = match action {
                "create_product" => "Failed to create copytrade option",
                "update_product" => "Failed to update copytrade option",
                _ => "Failed to delete copytrade option",
            };
            let message = e.user_message(fallback);
            if !e.is_local() {
                db.record_action(action, target.as_deref(), ActionOutcome::Failed, Some(&message))
                    .await?;
            }
            Err(anyhow!(message))
        }
    }
}

fn print_products(products: &[CopyTradeProduct]) {
    if products.is_empty() {
        println!("No copytrade options found.");
        return;
    }

    println!(
        "\n{:<26} {:<28} {:<8} {:>10} {:>10}",
        "ID", "TITLE", "RISK", "MIN", "MAX"
    );
    println!("{}", "-".repeat(86));

    for product in products {
        println!(
            "{:<26} {:<28} {:<8} {:>10} {:>10}",
            product.id,
            truncate(&product.trade_title, 26),
            product.trade_risk,
            product.trade_min,
            product.trade_max
        );
    }
}

fn print_product(product: &CopyTradeProduct) {
    println!("\n=== {} ===", product.label());
    println!("ID:          {}", product.id);
    println!("Risk:        {}", product.trade_risk);
    println!("Investment:  ${} - ${}", product.trade_min, product.trade_max);
    println!("ROI range:   {}% - {}%", product.trade_roi_min, product.trade_roi_max);
    println!("Duration:    {} days", product.trade_duration);
    println!("Recommended: {}", if product.is_recommended { "Yes" } else { "No" });
    if !product.trade_description.is_empty() {
        println!("\n{}", product.trade_description);
    }
}

fn print_purchases(purchases: &[Purchase]) {
    if purchases.is_empty() {
        println!("No purchases found.");
        return;
    }

    println!(
        "\n{:<26} {:<24} {:<22} {:>10} {:<10} {:>10}",
        "ID", "USER", "PRODUCT", "INVESTED", "STATUS", "P&L"
    );
    println!("{}", "-".repeat(108));

    for p in purchases {
        let pnl = p
            .trade_profit_loss
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<26} {:<24} {:<22} {:>10.2} {:<10} {:>10}",
            p.id,
            truncate(&p.owner_label(), 22),
            truncate(&p.trade_title, 20),
            p.initial_investment,
            p.trade_status.as_str(),
            pnl
        );
    }
}

fn print_purchase(p: &Purchase) {
    println!("\n=== Purchase {} ===", p.id);
    println!("User:        {}", p.owner_label());
    println!("Product:     {}", p.trade_title);
    if let Some(risk) = &p.trade_risk {
        println!("Risk:        {}", risk);
    }
    println!("Status:      {}", p.trade_status);
    println!("Invested:    ${:.2}", p.initial_investment);
    if let Some(value) = p.trade_current_value {
        println!("Value:       ${:.2}", value);
    }
    if let Some(pnl) = p.trade_profit_loss {
        match p.profit_loss_pct() {
            Some(pct) => println!("P&L:         ${:.2} ({:.2}%)", pnl, pct),
            None => println!("P&L:         ${:.2}", pnl),
        }
    }
    println!("Created:     {}", p.created_at.format("%Y-%m-%d %H:%M"));
    if let Some(at) = p.trade_approval_date {
        println!("Approved:    {}", at.format("%Y-%m-%d %H:%M"));
    }
    if let Some(at) = p.trade_end_date {
        println!("Ended:       {}", at.format("%Y-%m-%d %H:%M"));
    }

    if p.trade_status == TradeStatus::Active {
        match FinalValueSource::for_purchase(p) {
            FinalValueSource::Tracked(value) => {
                println!("Settles at:  ${:.2} (tracked value)", value)
            }
            FinalValueSource::BackendResolved => {
                println!("Settles at:  resolved by the backend when ended")
            }
        }
    } else if p.trade_status.is_terminal() {
        println!("Closed:      no further transitions");
    }

    let actions: Vec<&str> = available_actions(p.trade_status)
        .iter()
        .map(|a| a.as_str())
        .collect();
    println!("Actions:     {}", actions.join(", "));
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
