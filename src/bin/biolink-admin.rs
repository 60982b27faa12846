use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use biolink::config::Config;
use biolink::ordering::{positions_are_contiguous, LinkOrdering};
use biolink::storage;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "biolink-admin")]
#[command(about = "Inspect and repair link position sequences", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show an owner's links in position order
    Links {
        /// Owner ID (sub claim of the session token)
        owner_id: String,
    },
    /// Report every owner whose positions are not 0..n-1
    Check,
    /// Rewrite positions to 0..n-1, keeping the current order
    Repair {
        /// Only repair this owner (default: all owners)
        owner_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage = storage::connect(&config.database).await?;
    let ordering = LinkOrdering::new(Arc::clone(&storage), config.ordering.append_max_attempts);

    match cli.command {
        Commands::Links { owner_id } => {
            let links = ordering.list(&owner_id).await?;
            if links.is_empty() {
                println!("No links found for '{}'.", owner_id);
            } else {
                println!("{:<10} {:<14} {:<8} {}", "Position", "ID", "Active", "Title");
                println!("{}", "-".repeat(80));
                for link in &links {
                    println!(
                        "{:<10} {:<14} {:<8} {}",
                        link.position,
                        link.id,
                        if link.is_active { "yes" } else { "no" },
                        link.title
                    );
                }
                if !positions_are_contiguous(&links) {
                    println!();
                    println!("⚠ Positions have gaps or duplicates; run `biolink-admin repair {}`", owner_id);
                }
            }
        }
        Commands::Check => {
            let owners = storage.list_owner_ids().await?;
            let mut broken = 0usize;
            for owner_id in &owners {
                let links = ordering.list(owner_id).await?;
                if !positions_are_contiguous(&links) {
                    broken += 1;
                    let positions: Vec<String> =
                        links.iter().map(|l| l.position.to_string()).collect();
                    println!("✗ {:<40} positions [{}]", owner_id, positions.join(", "));
                }
            }
            if broken == 0 {
                println!("✓ All {} owners have contiguous positions", owners.len());
            } else {
                println!("{} of {} owners need repair", broken, owners.len());
            }
        }
        Commands::Repair { owner_id } => {
            let owners = match owner_id {
                Some(owner_id) => vec![owner_id],
                None => storage.list_owner_ids().await?,
            };
            let mut repaired = 0usize;
            for owner_id in &owners {
                let changed = ordering
                    .normalize(owner_id)
                    .await
                    .with_context(|| format!("failed to repair positions for '{owner_id}'"))?;
                if changed {
                    repaired += 1;
                    println!("✓ Repaired '{}'", owner_id);
                }
            }
            println!("Repaired {} of {} owners", repaired, owners.len());
        }
    }

    Ok(())
}
