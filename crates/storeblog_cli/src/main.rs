//! Command-line viewer over a blog database.
//!
//! Usage: `storeblog_cli <db-path> [recent|archive|tags|categories|period <day|month|year>]`
//!
//! Set `STOREBLOG_LOG_DIR` to an absolute directory to enable file logs.

use chrono::Utc;
use std::process::ExitCode;
use storeblog_core::db::open_db;
use storeblog_core::{
    default_log_level, init_logging, BlogConfig, BlogEntry, BlogServiceError, DateFilter, Period,
    SqliteBlogService, Taxonomy,
};

const USAGE: &str =
    "usage: storeblog_cli <db-path> [recent|archive|tags|categories|period <day|month|year>]";

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let Some(db_path) = args.next() else {
        eprintln!("{USAGE}");
        return ExitCode::FAILURE;
    };
    let command = args.next().unwrap_or_else(|| "recent".to_string());
    let argument = args.next();

    if let Ok(log_dir) = std::env::var("STOREBLOG_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(&db_path, &command, argument.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(db_path: &str, command: &str, argument: Option<&str>) -> Result<(), String> {
    let conn = open_db(db_path).map_err(|err| format!("cannot open `{db_path}`: {err}"))?;
    let service = SqliteBlogService::open(&conn, BlogConfig::default()).map_err(describe)?;

    match command {
        "recent" => {
            for entry in service.recent(None).map_err(describe)? {
                print_entry(&entry);
            }
        }
        "period" => {
            let period = argument.and_then(Period::parse).ok_or_else(|| USAGE.to_string())?;
            let filter = DateFilter::At {
                at: Utc::now(),
                period,
            };
            for entry in service.by_date(Some(filter)).map_err(describe)? {
                print_entry(&entry);
            }
        }
        "archive" => {
            let archive = service.organize_by_archive().map_err(describe)?;
            for year in &archive.years {
                println!("{}", year.year);
                for month in &year.months {
                    println!("  {} ({})", month.name, month.entries.len());
                }
            }
        }
        "tags" | "categories" => {
            let taxonomy = Taxonomy::parse(command).ok_or_else(|| USAGE.to_string())?;
            for tag in service.list_tags(taxonomy).map_err(describe)? {
                println!("{tag}");
            }
        }
        _ => return Err(USAGE.to_string()),
    }

    Ok(())
}

fn print_entry(entry: &BlogEntry) {
    let published = entry
        .published_at
        .map(|at| at.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    println!(
        "{published}  {}  {}",
        entry.permalink.as_deref().unwrap_or_default(),
        entry.title
    );
}

fn describe(err: BlogServiceError) -> String {
    format!("storeblog: {err}")
}
