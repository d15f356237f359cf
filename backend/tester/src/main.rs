use anyhow::{Context, bail};
use clap::Parser;
use link::{HttpSource, SyncConfig, Synchronizer, ViewState};
use protocol::{Collection, SortDirection, SortSpec};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// users, courses, newsletters, posts, products or partners.
    collection: Collection,

    #[arg(long, default_value = "http://localhost:1111")]
    base_url: String,

    /// Session token, required for everything but courses and products.
    #[arg(long)]
    token: Option<String>,

    #[arg(long)]
    page_size: Option<u32>,

    #[arg(long)]
    search: Option<String>,

    /// `column` or `column:desc`, repeatable.
    #[arg(long, value_parser = parse_sort)]
    sort: Vec<SortSpec>,

    /// Stop after this many pages.
    #[arg(long, default_value_t = 50)]
    max_pages: u32,
}

fn parse_sort(raw: &str) -> Result<SortSpec, String> {
    let (column, direction) = match raw.split_once(':') {
        Some((column, direction)) => (column, direction.parse().map_err(|e| format!("{e}"))?),
        None => (raw, SortDirection::Asc),
    };

    Ok(SortSpec {
        column_id: column.to_string(),
        direction,
    })
}

fn summary(view: &ViewState<Value>) -> String {
    let Some(envelope) = &view.envelope else {
        return "no envelope".to_string();
    };

    let ids = envelope
        .rows()
        .iter()
        .map(|row| row["id"].to_string())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "page {}/{} ({} of {} rows): [{ids}]",
        view.query.page_index + 1,
        envelope.page_count,
        envelope.rows().len(),
        envelope.total_count
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let mut config = SyncConfig::from_env()?;
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }

    let mut source = HttpSource::new(&args.base_url, args.collection);
    if let Some(token) = &args.token {
        source = source.with_token(token);
    }
    info!("Walking {}", source.url());

    let sync = Synchronizer::<Value>::new(source, args.collection, config)?;

    if !args.sort.is_empty() {
        sync.set_sorting(args.sort.clone())?;
    }
    if let Some(search) = &args.search {
        sync.set_search_value(search.as_str())?;
    }
    sync.refetch()?;

    for page_index in 0..args.max_pages {
        if page_index > 0 {
            sync.set_page_index(page_index)?;
        }

        let view = sync.settled().await;
        if let Some(error) = &view.error {
            bail!("{error}");
        }

        println!("{}", summary(&view));

        let page_count = view
            .envelope
            .as_ref()
            .map(|envelope| envelope.page_count)
            .context("no envelope after settling")?;

        if u64::from(page_index) + 1 >= page_count {
            break;
        }
    }

    Ok(())
}
