mod catalog;
mod crawler;
mod db;
mod feed;
mod parser;

use std::time::Instant;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "noteb_scraper", about = "noteb.com laptop spec pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl listing pages and upsert detail records into staging
    Scrape {
        /// Max detail pages to scrape (default: all discovered)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Promote staging rows into the models catalog + spec rows
    Promote,
    /// Scrape + promote in one pipeline
    Run {
        /// Max detail pages to scrape
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Show pipeline statistics
    Stats,
    /// Catalog overview table
    Overview {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Offline feed: Wikipedia pre-2021 models to CSV
    Feed {
        /// Output CSV path
        #[arg(long, default_value = "models_pre2021.csv")]
        out: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scrape { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let stats = crawler::scrape(&conn, limit).await?;
            println!(
                "Done: {} pages, {} staged, {} OS-skipped, {} without identity, {} errors.",
                stats.total, stats.saved, stats.skipped_os, stats.skipped_identity, stats.errors
            );
            Ok(())
        }
        Commands::Promote => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let counts = catalog::promote_all(&conn)?;
            counts.print();
            Ok(())
        }
        Commands::Run { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;

            let t_scrape = Instant::now();
            let stats = crawler::scrape(&conn, limit).await?;
            println!(
                "Scraped {} pages ({} staged, {} errors) in {:.1}s",
                stats.total,
                stats.saved,
                stats.errors,
                t_scrape.elapsed().as_secs_f64()
            );

            let counts = catalog::promote_all(&conn)?;
            counts.print();
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            let eligible = catalog::eligible_count(&conn)?;
            println!("Staged:    {}", s.staged);
            println!("Eligible:  {}", eligible);
            println!("Excluded:  {}", s.staged - eligible);
            println!("Models:    {}", s.models);
            println!("Specs:     {}", s.specs);
            println!("W11-ready: {}", s.w11_ready);
            Ok(())
        }
        Commands::Overview { limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, limit)?;
            if rows.is_empty() {
                println!("No catalog entries. Run 'promote' first.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<10} | {:<28} | {:>7} | {:<3} | {:<12} | {:<6}",
                "#", "Brand", "Model", "Max RAM", "W11", "Storage", "Arch"
            );
            println!("{}", "-".repeat(86));
            for (i, r) in rows.iter().enumerate() {
                let ram = r
                    .max_ram_gb
                    .map(|g| format!("{g} GB"))
                    .unwrap_or_else(|| "-".into());
                let w11 = match r.supports_w11 {
                    Some(1) => "yes",
                    Some(_) => "no",
                    None => "?",
                };
                println!(
                    "{:>3} | {:<10} | {:<28} | {:>7} | {:<3} | {:<12} | {:<6}",
                    i + 1,
                    truncate(&r.brand, 10),
                    truncate(&r.display_model, 28),
                    ram,
                    w11,
                    truncate(&r.storage, 12),
                    r.cpu_arch
                );
            }
            println!("\n{} catalog entries", rows.len());
            Ok(())
        }
        Commands::Feed { out } => feed::run(&out).await,
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
