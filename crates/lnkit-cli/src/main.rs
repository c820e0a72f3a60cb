//! lnkit-paydb
//!
//! Operator tool for the payment store: list payments, inspect one, and
//! reclaim space taken by resolved payments.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use lnkit::{MpPayment, PaymentControl, PaymentHash, PaymentStatus};
use lnkit_redb::PaymentRedbDatabase;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::Settings;

mod cli;
mod config;

const DEFAULT_WORK_DIR: &str = ".lnkit";
const CONFIG_FILE_NAME: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let work_dir = match args.work_dir {
        Some(work_dir) => work_dir,
        None => home::home_dir()
            .ok_or(anyhow!("Unknown home dir"))?
            .join(DEFAULT_WORK_DIR),
    };
    std::fs::create_dir_all(&work_dir)?;

    let config_file: PathBuf = args
        .config
        .unwrap_or_else(|| work_dir.join(CONFIG_FILE_NAME));
    let settings = Settings::new(&config_file)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let db_path = settings.db_path(&work_dir);
    tracing::debug!("Opening payment store at {}", db_path.display());
    let localstore = Arc::new(PaymentRedbDatabase::new(&db_path)?);
    let control = PaymentControl::new(localstore);

    match args.command {
        Command::List => {
            for payment in control.fetch_payments().await? {
                println!("{}", summary(&payment));
            }
        }
        Command::Status { payment_hash } => {
            let payment_hash = PaymentHash::from_str(&payment_hash)
                .map_err(|err| anyhow!("Invalid payment hash: {err}"))?;

            match control.payment_status(&payment_hash).await? {
                PaymentStatus::Unknown => println!("{payment_hash} {}", PaymentStatus::Unknown),
                _ => {
                    let payment = control.fetch_payment(&payment_hash).await?;
                    println!("{}", serde_json::to_string_pretty(&payment)?);
                }
            }
        }
        Command::InFlight => {
            for payment in control.fetch_in_flight_payments().await? {
                println!("{}", summary(&payment));
            }
        }
        Command::DeleteResolved => {
            let removed = control.delete_payments().await?;
            println!("Deleted {removed} payments");
        }
    }

    Ok(())
}

fn summary(payment: &MpPayment) -> String {
    format!(
        "{} {} {} attempts={} in_flight={}",
        payment.payment_hash(),
        payment.status(),
        payment.info.value,
        payment.htlcs.len(),
        payment.in_flight_attempts().count()
    )
}
