use clap::{
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use lootcase::{
    AppServices,
    Deposit,
    cases::Case,
    config::AppConfig,
    seed::{
        SeedPhrase,
        session_rng,
    },
};
use lootcase_core::{
    ForceMode,
    OperationResult,
};
use std::sync::OnceLock;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Width of the roulette viewport the spin offsets are computed for.
const ROULETTE_WIDTH: f64 = 600.0;

#[derive(Parser, Debug)]
#[command(version, about = "Open loot cases on the game backend or in demo mode", long_about = None)]
struct Cli {
    /// Backend base URL, e.g. http://localhost:8000/api
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// auto, primary or fallback
    #[arg(long, global = true)]
    mode: Option<ForceMode>,

    /// Phrase to derive a reproducible RNG seed from
    #[arg(long, global = true)]
    seed: Option<String>,

    /// Config file (defaults to ~/.lootcase/config.json)
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    user_id: Option<u64>,

    #[arg(long, global = true, default_value = ".lootcase/logs")]
    log_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available cases
    Cases,
    /// Show drop chances for a case
    Odds { case_id: String },
    /// Open a case
    Open {
        case_id: String,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Show the current balance
    Balance,
    /// Top up the balance with Stars
    Deposit { stars: u64 },
    /// List owned items
    Inventory,
    /// Sell an owned item for its value in Stars
    Sell { item_id: String },
    /// Show profile totals
    Profile,
    /// Show recent balance movements
    History,
}

fn init_tracing(log_dir: &str) {
    let appender = rolling::daily(log_dir, "lootcase.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    let _ = LOG_GUARD.set(guard);
}

fn source_tag<T>(result: &OperationResult<T>) -> &'static str {
    if result.is_fallback() { " [demo]" } else { "" }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(&cli.log_dir);

    let mut config = AppConfig::load(cli.config.as_deref()).wrap_err("loading config")?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(mode) = cli.mode {
        config.force_mode = mode;
    }
    if let Some(user_id) = cli.user_id {
        config.user_id = user_id;
    }

    let (rng, seed) = session_rng(cli.seed.as_deref());
    if let Some(phrase) = cli.seed.as_deref() {
        println!("seed digest: {}", SeedPhrase::derive(phrase).digest);
    }
    tracing::info!(seed, "session RNG ready");

    let services = AppServices::bootstrap(&config, rng).wrap_err("starting services")?;
    let cancel = services.cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received interrupt, abandoning backend calls");
            cancel.cancel();
        }
    });

    if config.force_mode != ForceMode::Fallback && !services.backend().check_availability().await {
        println!("Backend unavailable at {}: running in demo mode", config.api_url);
    }

    run_command(&services, cli.command).await
}

async fn run_command(services: &AppServices<lootcase_api::ApiClient>, command: Command) -> Result<()> {
    let cases = services.cases();
    let balances = services.balances();
    match command {
        Command::Cases => {
            let (listed, balance) = futures::join!(cases.list_cases(), balances.balance());
            let listed = listed.wrap_err("listing cases")?;
            let balance = balance.ok().map(OperationResult::into_value);
            println!("Cases{}:", source_tag(&listed));
            for case in &listed.value {
                print_case_line(case, balance);
            }
        }
        Command::Odds { case_id } => {
            let odds = cases.odds(&case_id).await.wrap_err("loading case")?;
            println!("Drop chances{}:", source_tag(&odds));
            for entry in &odds.value {
                println!(
                    "  {:<20} {:<10} {:>6}★  {:>6.2}%",
                    entry.item.name,
                    entry.item.rarity_label(),
                    entry.item.value_stars,
                    entry.probability * 100.0
                );
            }
        }
        Command::Open { case_id, count } => {
            let openings = cases
                .open_many(&case_id, count.max(1))
                .await
                .wrap_err_with(|| format!("opening case {case_id}"))?;
            for opening in &openings {
                let spin = cases.spin(&opening.value.case, &opening.value.item, ROULETTE_WIDTH)?;
                let item = &opening.value.item;
                let flourish = match item.rarity {
                    Some(rarity) if rarity.is_rare_drop() => "!!",
                    _ => "",
                };
                println!(
                    "Won {}{} ({}, {}★), balance {}★{} [stop at {:.0}px]",
                    item.name,
                    flourish,
                    item.rarity_label(),
                    item.value_stars,
                    opening.value.new_balance,
                    source_tag(opening),
                    spin.offset
                );
            }
        }
        Command::Balance => {
            let balance = balances.balance().await.wrap_err("loading balance")?;
            println!("Balance: {}★{}", balance.value, source_tag(&balance));
        }
        Command::Deposit { stars } => {
            let deposit = balances.deposit(stars).await.wrap_err("depositing")?;
            match deposit.into_value() {
                Deposit::Credited { new_balance } => {
                    println!("Demo wallet credited with {stars}★, balance {new_balance}★");
                }
                Deposit::Invoice {
                    link,
                    mut subscription,
                } => {
                    println!("Pay the invoice to finish: {link}");
                    println!("Waiting for the payment to be confirmed (Ctrl-C to stop)...");
                    let status = balances.complete_deposit(&mut subscription).await;
                    println!("Invoice {}: {status}", subscription.invoice_id());
                }
            }
        }
        Command::Inventory => {
            let items = balances.inventory().await.wrap_err("loading inventory")?;
            println!("Inventory{}:", source_tag(&items));
            if items.value.is_empty() {
                println!("  No items yet");
            }
            for item in &items.value {
                println!(
                    "  {:<12} {:<20} {:<10} {:>6}★  {}",
                    item.id,
                    item.name,
                    item.rarity,
                    item.value_stars,
                    item.case_name.as_deref().unwrap_or("")
                );
            }
        }
        Command::Sell { item_id } => {
            let sale = balances
                .sell_item(&item_id)
                .await
                .wrap_err_with(|| format!("selling item {item_id}"))?;
            println!(
                "Sold {} for {}★, balance {}★{}",
                sale.value.item_id,
                sale.value.stars_earned,
                sale.value.new_balance,
                source_tag(&sale)
            );
        }
        Command::Profile => {
            let profile = balances.profile().await.wrap_err("loading profile")?;
            let p = &profile.value;
            println!(
                "{}{}",
                p.display_name.as_deref().unwrap_or("Player"),
                source_tag(&profile)
            );
            println!("  balance        {}★", p.balance_stars);
            println!("  cases opened   {}", p.total_cases_opened);
            println!("  stars spent    {}★", p.total_spent_stars);
            println!("  stars earned   {}★", p.total_earned_stars);
        }
        Command::History => {
            let history = balances.history().await.wrap_err("loading history")?;
            println!("History{}:", source_tag(&history));
            for entry in &history.value {
                println!(
                    "  {:<20} {:<14} {:>10} {:<6} {:<10} {}",
                    entry.at.as_deref().unwrap_or("-"),
                    entry.kind,
                    entry.amount,
                    entry.currency,
                    entry.status,
                    entry.description.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}

fn print_case_line(case: &Case, balance: Option<u64>) {
    let marker = match balance {
        Some(balance) if !case.can_afford(balance) => " (not enough stars)",
        _ => "",
    };
    println!(
        "  {:<22} {:<24} {:>6}★{}",
        case.id, case.name, case.price_stars, marker
    );
}
