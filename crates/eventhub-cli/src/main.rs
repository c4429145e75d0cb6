use anyhow::{bail, Context};
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use eventhub_cli::{properties_map, AppContext, Command, Config, ExportFormat};
use eventhub_client::SourceClient;
use eventhub_core::load_config;
use eventhub_sync::ItemSaver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Parse command line arguments
    let cli = Config::parse();

    let Some(path) = cli.config_path() else {
        bail!("No configuration file found. Pass --config <PATH> or set EVENTHUB_CONFIG.");
    };
    let app_config = load_config(&path).map_err(|e| anyhow::anyhow!(e.user_message()))?;

    // Setup logging (stderr to keep stdout clean for exports)
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level(&app_config.logging.level))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    if let Command::Sources = cli.command {
        list_sources(&app_config);
        return Ok(());
    }

    let ctx = AppContext::build(app_config)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .context("Failed to open the store")?;

    match cli.command {
        Command::Run => run(&ctx).await?,
        Command::Import { source } => import(&ctx, &source).await?,
        Command::Items { source, format } => export(&ctx, &source, format).await?,
        Command::Show { source, key } => show(&ctx, &source, &key).await?,
        Command::Scan {
            source,
            key,
            action,
            properties,
        } => scan(&ctx, &source, &key, &action, &properties).await?,
        Command::Sources => {}
    }

    Ok(())
}

/// Run the keeper until Ctrl-C
async fn run(ctx: &AppContext) -> anyhow::Result<()> {
    let keeper = ctx.start_keeper()?;
    info!(
        sources = ctx.config.sources.len(),
        "Keeper running. Press Ctrl-C to stop."
    );

    let signal = tokio::signal::ctrl_c().await;
    keeper.stop().await;
    signal.context("Failed to listen for Ctrl-C")
}

/// One-shot import of a single source
async fn import(ctx: &AppContext, source: &str) -> anyhow::Result<()> {
    let descriptor = ctx.source(source)?.clone();
    let repository = ctx.repository(source)?;
    let client = SourceClient::new(descriptor, ctx.transport.clone())
        .with_page_size(ctx.config.keeper_config().page_size);

    let result = client.import(&ItemSaver::new(repository)).await;
    ctx.close().await;
    let summary = result.with_context(|| format!("Import of '{}' failed", source))?;

    println!("\nImport of '{}' complete\n", source);
    println!("  Pages fetched:         {}", summary.pages);
    println!("  Records received:      {}", summary.records);
    println!("  Records stored:        {}", summary.accepted);
    println!("  Records skipped:       {}", summary.rejected());
    println!();

    Ok(())
}

/// Export stored records to stdout
async fn export(ctx: &AppContext, source: &str, format: ExportFormat) -> anyhow::Result<()> {
    let items = ctx.repository(source)?.items().await;
    ctx.close().await;
    let items = items?;

    match format {
        ExportFormat::Jsonl => {
            for item in &items {
                println!("{}", serde_json::to_string(item)?);
            }
        }
        ExportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
    }

    info!(source, count = items.len(), "Export complete");
    Ok(())
}

/// Print one record with its activities
async fn show(ctx: &AppContext, source: &str, key: &str) -> anyhow::Result<()> {
    let detail = ctx.repository(source)?.get_item_detail(key).await;
    ctx.close().await;

    match detail? {
        Some(detail) => println!("{}", serde_json::to_string_pretty(&detail)?),
        None => bail!("No record '{}' in source '{}'", key, source),
    }
    Ok(())
}

/// Record a scan and wait for its replay
async fn scan(
    ctx: &AppContext,
    source: &str,
    key: &str,
    action: &str,
    properties: &[(String, String)],
) -> anyhow::Result<()> {
    ctx.source(source)?;
    let keeper = ctx.start_keeper()?;
    let detail = keeper
        .handle()
        .scan(source, key, action, properties_map(properties))
        .await;
    keeper.stop().await;

    match detail {
        Some(detail) => println!("{}", serde_json::to_string_pretty(&detail)?),
        None => bail!("No record '{}' in source '{}'", key, source),
    }
    Ok(())
}

/// List configured sources
fn list_sources(config: &eventhub_core::AppConfig) {
    if config.sources.is_empty() {
        println!("\nNo sources configured.\n");
        return;
    }

    println!("\nConfigured sources\n");
    for source in &config.sources {
        println!("  {}", source.name);
        println!("    id field:  {}", source.id_field);
        println!("    fetch:     {}", source.fetching_url);
        println!("    update:    {} {}", source.update_method, source.update_url);
    }
    println!();
}
