use anyhow::{bail, Context, Result};
use brimming::config::Args;
use brimming::report::RunReport;
use brimming::{CancelToken, DatabaseGateway, LoadResult, Loader, MemoryGateway, MySqlGateway};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let spec = args.load_spec()?;
    let loader = Loader::new(spec, args.schema_options()?, args.worker_options()?)
        .verify(!args.skip_verify);
    let connections = args.connections()?;

    let gateway: Arc<dyn DatabaseGateway> = if args.dry_run {
        info!("Dry run, rows go to an in-memory database");
        Arc::new(MemoryGateway::with_connection_limit(connections))
    } else {
        let gateway = MySqlGateway::connect(args.connect_options(), connections)
            .await
            .map_err(brimming::LoadError::Connection)
            .context("failed to open connection pool")?;
        gateway
            .ping()
            .await
            .map_err(brimming::LoadError::Connection)?;
        Arc::new(gateway)
    };

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling load");
                cancel.cancel();
            }
        });
    }

    let result = loader.run(Arc::clone(&gateway), &cancel).await?;
    print_summary(&loader, &result);

    if let Some(path) = &args.report {
        RunReport::new(loader.spec(), &result).write(path)?;
        println!("Report written to {}", path.display());
    }

    if !result.is_complete() {
        bail!(
            "{} of {} jobs failed, load is incomplete",
            result.failures.len(),
            result.jobs_total
        );
    }

    Ok(())
}

fn print_summary(loader: &Loader, result: &LoadResult) {
    let spec = loader.spec();
    println!("Rows requested:   {:>15}", spec.total_rows);
    println!("Rows inserted:    {:>15}", result.rows_inserted);
    println!("Tables:           {:>15}", spec.tables);
    println!("Batch size:       {:>15}", spec.batch_size);
    println!("Workers:          {:>15}", spec.workers);
    println!("Elapsed:          {:>14.2}s", result.elapsed.as_secs_f64());
    println!("Rows/second:      {:>15.0}", result.rows_per_second());

    for failure in &result.failures {
        println!(
            "Failed job {} ({} rows into {}): {}",
            failure.sequence, failure.rows, failure.table, failure.error
        );
    }

    if let Some(verification) = &result.verification {
        println!("Rows counted:     {:>15}", verification.measured);
        if verification.baseline > 0 {
            println!("Rows before load: {:>15}", verification.baseline);
        }
        for table in &verification.per_table {
            println!("  {:<30} {:>12} {:>12}", table.table, table.added(), table.rows);
        }
        if let Some(warning) = &verification.warning {
            println!("WARNING: {warning}");
        }
    }
}
