// Command-line driver for the scanx list/detail stack

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

use scanx::{
    config::{self, CliArgs},
    models::{
        format_unix, Address, Block, Contract, Event, Nft, Organization, Series, Token,
        Transaction,
    },
    ApiError, App, DetailRequest, ErrorKind, ListView, OrderDirection, Resource,
};

/// scanx - blockchain explorer lists from the command line
///
/// Configuration priority: CLI args > Environment variables > Defaults
#[derive(Parser, Debug)]
#[command(name = "scanx")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Blockchain explorer lists and records", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: CliArgs,

    /// Print the resolved configuration before running
    #[arg(long, global = true)]
    verbose_config: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk a paginated list forward
    List {
        /// blocks, transactions, addresses, tokens, events, nfts, series, contracts, organizations
        resource: Resource,

        /// Number of pages to walk (stops early at the end of the list)
        #[arg(long, default_value_t = 1)]
        pages: u32,

        /// Start page (offset-paginated lists only)
        #[arg(long)]
        page: Option<u32>,

        /// Page size (persisted for later runs)
        #[arg(long)]
        page_size: Option<u32>,

        /// Sort field
        #[arg(long)]
        order_by: Option<String>,

        /// Sort direction: asc or desc
        #[arg(long)]
        order: Option<OrderDirection>,

        /// Free-text search
        #[arg(short, long)]
        q: Option<String>,

        /// Resource filter as key=value (repeatable), e.g. address=P2K...
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,

        /// Print raw JSON rows instead of a summary line per row
        #[arg(long)]
        json: bool,
    },

    /// Show a single record
    Show {
        resource: Resource,

        /// Record identifier (hash, address, symbol, ...)
        id: String,

        /// Nested data to include, e.g. balance (repeatable)
        #[arg(long = "with")]
        with: Vec<String>,
    },
}

fn parse_filter(s: &str) -> Result<(String, String)> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("filter must be key=value, got '{s}'"))?;
    let k = k.trim();
    if k.is_empty() {
        return Err(anyhow!("filter key cannot be empty"));
    }
    Ok((k.to_string(), v.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (safe to ignore if not found)
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config).context("Failed to load configuration")?;
    if cli.verbose_config {
        cfg.print_summary();
    }

    let app = App::new(cfg)?;

    tokio::select! {
        res = run(&app, cli.command) => res,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Interrupted");
            Ok(())
        }
    }
}

async fn run(app: &App, command: Command) -> Result<()> {
    match command {
        Command::List {
            resource,
            pages,
            page,
            page_size,
            order_by,
            order,
            q,
            filters,
            json,
        } => {
            let opts = ListOpts {
                pages,
                page,
                page_size,
                order_by,
                order,
                q,
                filters,
                json,
            };
            match resource {
                Resource::Blocks => list::<Block>(app, resource, opts).await,
                Resource::Transactions => list::<Transaction>(app, resource, opts).await,
                Resource::Addresses => list::<Address>(app, resource, opts).await,
                Resource::Tokens => list::<Token>(app, resource, opts).await,
                Resource::Events => list::<Event>(app, resource, opts).await,
                Resource::Nfts => list::<Nft>(app, resource, opts).await,
                Resource::Series => list::<Series>(app, resource, opts).await,
                Resource::Contracts => list::<Contract>(app, resource, opts).await,
                Resource::Organizations => list::<Organization>(app, resource, opts).await,
            }
        }
        Command::Show { resource, id, with } => {
            let detail = with
                .iter()
                .fold(DetailRequest::new(resource, id), |d, w| d.with(w));
            match app.detail(&detail).await {
                Ok(record) => {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                    Ok(())
                }
                Err(e) => Err(report(resource, &e)),
            }
        }
    }
}

struct ListOpts {
    pages: u32,
    page: Option<u32>,
    page_size: Option<u32>,
    order_by: Option<String>,
    order: Option<OrderDirection>,
    q: Option<String>,
    filters: Vec<(String, String)>,
    json: bool,
}

async fn list<T>(app: &App, resource: Resource, opts: ListOpts) -> Result<()>
where
    T: DeserializeOwned + serde::Serialize + RowSummary,
{
    let mut view: ListView<T> = app.list_view(resource);

    if let Some(size) = opts.page_size {
        if !app.config().allows_page_size(size) {
            return Err(anyhow!(
                "page size {size} is not one of {:?}",
                app.config().page_size_choices
            ));
        }
        view.pagination_mut()
            .set_page_size(size)
            .map_err(|e| anyhow!("{e}"))?;
    }
    view.set_order(opts.order_by.as_deref(), opts.order);
    for (k, v) in opts.filters {
        view.set_filter(k, v);
    }
    if let Some(q) = opts.q.as_deref() {
        view.search(q);
    }
    if let Some(page) = opts.page {
        if !view.goto(page) {
            log::warn!("page {page} is not reachable for {resource}, starting at page 1");
        }
    }

    for _ in 0..opts.pages.max(1) {
        let outcome = view.load().await.map_err(|e| report(resource, &e))?;
        let p = view.pagination();
        eprintln!(
            "-- {resource} page {} ({} rows, size {}, {} {}{})",
            outcome.page,
            outcome.rows.len(),
            p.page_size(),
            p.order_by(),
            p.order_direction(),
            outcome
                .total_results
                .map(|t| format!(", {t} total"))
                .unwrap_or_default()
        );
        if let Some(msg) = &outcome.api_error {
            log::warn!("API reported: {msg}");
        }
        for row in &outcome.rows {
            if opts.json {
                println!("{}", serde_json::to_string(row)?);
            } else {
                println!("{}", row.summary());
            }
        }
        if !view.next_page() {
            break;
        }
    }
    Ok(())
}

fn report(resource: Resource, e: &ApiError) -> anyhow::Error {
    match e.kind() {
        ErrorKind::NotFound => anyhow!("{resource}: not found ({})", e.url()),
        ErrorKind::RequestFailed => anyhow!("{resource}: failed to load: {e}"),
    }
}

/// One-line rendering of a row.
trait RowSummary {
    fn summary(&self) -> String;
}

fn or_dash(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("-")
}

fn when(date: Option<i64>) -> String {
    date.map(format_unix).unwrap_or_else(|| "-".into())
}

impl RowSummary for Block {
    fn summary(&self) -> String {
        format!(
            "#{:<10} {} {} txs={}",
            or_dash(&self.height),
            when(self.date),
            or_dash(&self.hash),
            self.transactions
                .as_ref()
                .map(|t| t.len().to_string())
                .unwrap_or_else(|| "-".into())
        )
    }
}

impl RowSummary for Transaction {
    fn summary(&self) -> String {
        format!(
            "{} {} block={} {} fee={}",
            when(self.date),
            or_dash(&self.hash),
            or_dash(&self.block_height),
            or_dash(&self.state),
            or_dash(&self.fee)
        )
    }
}

impl RowSummary for Address {
    fn summary(&self) -> String {
        format!(
            "{} {} stake={}",
            or_dash(&self.address),
            or_dash(&self.address_name),
            or_dash(&self.stake)
        )
    }
}

impl RowSummary for Token {
    fn summary(&self) -> String {
        format!(
            "{:<8} {} supply={} decimals={}",
            or_dash(&self.symbol),
            or_dash(&self.name),
            or_dash(&self.current_supply),
            self.decimals
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".into())
        )
    }
}

impl RowSummary for Event {
    fn summary(&self) -> String {
        format!(
            "{} {} {} tx={}",
            when(self.date),
            or_dash(&self.event_kind),
            or_dash(&self.address),
            or_dash(&self.transaction_hash)
        )
    }
}

impl RowSummary for Nft {
    fn summary(&self) -> String {
        format!(
            "{} {} creator={} minted={}",
            or_dash(&self.symbol),
            or_dash(&self.token_id),
            or_dash(&self.creator_address),
            when(self.mint_date)
        )
    }
}

impl RowSummary for Series {
    fn summary(&self) -> String {
        format!(
            "{} {} supply={}/{}",
            or_dash(&self.series_id),
            or_dash(&self.name),
            self.current_supply
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".into()),
            self.max_supply
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".into())
        )
    }
}

impl RowSummary for Contract {
    fn summary(&self) -> String {
        format!(
            "{} {} {}",
            or_dash(&self.name),
            or_dash(&self.symbol),
            or_dash(&self.hash)
        )
    }
}

impl RowSummary for Organization {
    fn summary(&self) -> String {
        format!(
            "{} {} members={}",
            or_dash(&self.id),
            or_dash(&self.name),
            self.size
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".into())
        )
    }
}
