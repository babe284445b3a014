mod client;
mod config;
mod error;
mod local_state;
mod render;
mod shell;

use chrono::NaiveDate;
use engine::Engine;

use crate::{
    client::HttpBackend,
    config::{AppConfig, Command, Selection},
    error::{AppError, Result},
    local_state::LocalState,
    render::Table,
    shell::Shell,
};

#[tokio::main]
async fn main() {
    let (settings, command) = match config::load() {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("blindcount: {err}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "blindcount={level},engine={level}",
                    level = settings.level
                )
                .into()
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(settings, command).await {
        tracing::error!("{err}");
        eprintln!("blindcount: {err}");
        std::process::exit(1);
    }
}

async fn run(settings: AppConfig, command: Command) -> Result<()> {
    let backend = HttpBackend::new(&settings.base_url)?;

    match command {
        Command::Health => {
            let health = backend.health().await.map_err(engine::EngineError::from)?;
            println!("{}: {}", settings.base_url, health.status);
        }
        Command::Warehouses => {
            let warehouses = backend.warehouses().await.map_err(engine::EngineError::from)?;
            let mut table = Table::new(["Id", "Name"]);
            for warehouse in warehouses {
                table.row(vec![warehouse.id, warehouse.name]);
            }
            print!("{table}");
        }
        Command::Show(selection) => {
            let (date, warehouse) = resolve(&settings, selection)?;
            let shell = open(&settings, backend, date, &warehouse).await?;
            println!("{}", shell.list()?);
        }
        Command::Count(selection) => {
            let (date, warehouse) = resolve(&settings, selection)?;
            let shell = open(&settings, backend, date, &warehouse).await?;
            shell::run(shell).await?;
        }
    }
    Ok(())
}

/// Fills in the date and warehouse the user left out.
fn resolve(settings: &AppConfig, selection: Selection) -> Result<(NaiveDate, String)> {
    let state = LocalState::load(&settings.state_path)?;
    let date = match selection.date {
        Some(date) => date,
        None => settings.today()?,
    };
    let warehouse = selection
        .warehouse
        .or_else(|| {
            state
                .recent_for(&settings.base_url)
                .map(|recent| recent.warehouse.clone())
        })
        .ok_or_else(|| {
            AppError::input("no warehouse selected, pass --warehouse (see `blindcount warehouses`)")
        })?;
    Ok((date, warehouse))
}

async fn open(
    settings: &AppConfig,
    backend: HttpBackend,
    date: NaiveDate,
    warehouse: &str,
) -> Result<Shell<HttpBackend>> {
    let engine = Engine::builder(backend).timeout(settings.timeout()).build();
    let shell = Shell::open(engine, date, warehouse).await?;

    let mut state = LocalState::load(&settings.state_path)?;
    state.remember(&settings.base_url, warehouse, date);
    if let Err(err) = state.save(&settings.state_path) {
        tracing::warn!("cannot store the last selection: {err}");
    }
    Ok(shell)
}
