mod api;
mod cli;
mod config;
mod dashboard;
mod models;
mod planner;
mod store;

use crate::cli::{Cli, Commands, ConfigCommands};
use crate::config::{Config, StoreBackend};
use crate::models::{ActivityType, NewActivity, format_date};
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => run_service(Config::resolve()?).await,
        Commands::Config { command } => handle_config_command(command),
        Commands::Doctor => run_blocking(handle_doctor).await,
        Commands::Seed => run_blocking(handle_seed).await,
        Commands::Dashboard { week } => run_blocking(move || handle_dashboard(week)).await,
        Commands::CarryForward { week } => run_blocking(move || handle_carry_forward(week)).await,
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    let config_path = Config::config_path();

    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load_from(&config_path)?;
            config.set_value(&key, &value)?;
            config.save_to(&config_path)?;

            let masked = if key.contains("api_key") {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = Config::resolve()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path();
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!(
            "[OK] config.json not found, using defaults: {}",
            config_path.display()
        );
    }

    let config = Config::resolve()?;
    println!("[OK] store backend: {}", config.store_backend);

    if config.store_backend == StoreBackend::Rest && config.rest_api_key.is_none() {
        println!("[WARN] rest backend selected but no API key is configured");
        issues.push("rest api key missing".to_string());
    }

    match store::open_store(&config).and_then(|store| {
        store
            .list_active_activities()
            .context("Failed to list activities")
    }) {
        Ok(activities) => println!(
            "[OK] store reachable ({} active activities)",
            activities.len()
        ),
        Err(error) => {
            println!("[WARN] store check failed: {error:#}");
            issues.push("store unreachable".to_string());
        }
    }

    if config.cors_origins.is_empty() {
        println!("[WARN] no CORS origins configured; browsers will be blocked");
        issues.push("cors origins empty".to_string());
    } else {
        println!("[OK] CORS origins: {}", config.cors_origins.join(", "));
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_seed() -> Result<()> {
    let config = Config::resolve()?;
    let store = store::open_store(&config)?;

    let existing = store.list_active_activities()?;
    if !existing.is_empty() {
        println!(
            "Store already has {} active activities. Nothing to seed.",
            existing.len()
        );
        return Ok(());
    }

    let samples = [
        NewActivity::new("Study", ActivityType::Time),
        NewActivity::new("Exercise", ActivityType::Time),
        NewActivity {
            target_unit: "pages".to_string(),
            ..NewActivity::new("Reading", ActivityType::Count)
        },
        NewActivity::new("Meditation", ActivityType::Time),
    ];

    samples.iter().try_for_each(|activity| {
        let created = store
            .insert_activity(activity)
            .with_context(|| format!("Failed to seed activity: {}", activity.name))?;
        println!("Seeded activity: {} ({})", created.name, created.activity_type);
        Ok::<_, anyhow::Error>(())
    })?;

    info!(count = samples.len(), "sample activities inserted");
    Ok(())
}

fn handle_dashboard(week: Option<String>) -> Result<()> {
    let config = Config::resolve()?;
    let store = store::open_store(&config)?;
    let week = week.unwrap_or_else(|| format_date(dashboard::current_week_start()));

    let view = dashboard::build_dashboard(store.as_ref(), &week)?;
    let pretty = serde_json::to_string_pretty(&view).context("Failed to serialize dashboard")?;
    println!("{pretty}");

    Ok(())
}

fn handle_carry_forward(week: Option<String>) -> Result<()> {
    let config = Config::resolve()?;
    let store = store::open_store(&config)?;
    let week = week.unwrap_or_else(|| format_date(dashboard::current_week_start()));

    let carried = planner::carry_forward(store.as_ref(), &week)?;
    println!(
        "Carried {} -> {}: {} goal(s), {} checklist item(s)",
        carried.previous_week_start_date,
        carried.week_start_date,
        carried.weekly_goals.len(),
        carried.activity_goals.len()
    );

    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    let shared_config = Arc::new(config);
    let store = store::open_store(&shared_config)?;

    info!(
        backend = store.backend_name(),
        environment = %shared_config.environment,
        "Momentum service started"
    );

    tokio::select! {
        api_result = api::run_server(Arc::clone(&shared_config), store) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

async fn run_blocking<F>(task: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .context("Command task failed")?
}
