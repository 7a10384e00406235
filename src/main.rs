use std::path::PathBuf;

use chrono::Local;
use clap::Parser;
use log::{error, info, warn};

use steward::dbf::{self, DbfConfig, Encoding};
use steward::excel;
use steward::range::DateRange;

/// Builds the monthly canteen billing workbook from the DBF tables in the
/// data directory.
#[derive(Parser, Debug)]
#[command(name = "mealrep", version, about)]
struct Cli {
    /// Directory holding stravnik.dbf, objednav.dbf and jidelnic.dbf
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Report on the previous calendar month instead of the current one
    #[arg(long)]
    previous: bool,

    /// Start date for reporting (dd-mm-yyyy)
    #[arg(long)]
    date_from: Option<String>,

    /// End date for reporting (dd-mm-yyyy)
    #[arg(long)]
    date_to: Option<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if cli.date_from.is_some() || cli.date_to.is_some() {
        // The legacy tool accepted these flags without ever applying them.
        // Kept for command-line compatibility until product decides otherwise.
        warn!("--date-from/--date-to are ignored, the calendar-month range is used");
    }

    let range = DateRange::month_of(Local::now().date_naive(), cli.previous);
    info!("start date {}", range.from.format("%d-%m-%Y"));
    info!("end date {}", range.to.format("%d-%m-%Y"));

    let cfg = DbfConfig {
        data_dir: cli.data_dir,
        encoding: Encoding::Cp1250,
    };

    // Each source fails alone: a broken table is logged and the run carries
    // on with an empty list, producing a degraded report instead of none.
    let menu = dbf::load_menu(&cfg, &range).unwrap_or_else(|e| {
        error!("cannot load menu: {e}");
        Vec::new()
    });
    let orders = dbf::load_orders(&cfg, &range).unwrap_or_else(|e| {
        error!("cannot load orders: {e}");
        Vec::new()
    });
    let subscribers = dbf::load_subscribers(&cfg).unwrap_or_else(|e| {
        error!("cannot load subscribers: {e}");
        Vec::new()
    });

    let reports = steward::build_reports(&subscribers, &menu, orders);

    match excel::render(&reports) {
        Ok(mut workbook) => {
            let file_name = excel::report_file_name(&range);
            match workbook.save(&file_name) {
                Ok(()) => info!("report written to {file_name}"),
                Err(e) => error!("cannot save report: {e}"),
            }
        }
        Err(e) => error!("cannot render report: {e}"),
    }
}
