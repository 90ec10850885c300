//! `telemon ports`: list the serial devices autodetection would try.

use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use telemon_ingest::serial::matching_ports;
use telemon_ingest::SystemPorts;

use crate::cli::{GlobalOpts, PortsArgs};
use crate::commands::load_config;
use crate::error::CliError;

#[derive(Debug, Serialize, Tabled)]
struct PortRow {
    #[tabled(rename = "#")]
    order: usize,
    #[tabled(rename = "Device")]
    path: String,
}

pub fn handle(args: &PortsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = load_config(global)?;
    let serial = telemon_config::serial_config(&config.transport);
    let search = args
        .search
        .as_deref()
        .or(config.transport.device_search_pattern.as_deref());

    let rows: Vec<PortRow> = matching_ports(&SystemPorts, &serial.pattern, search)?
        .into_iter()
        .enumerate()
        .map(|(i, path)| PortRow { order: i + 1, path })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        eprintln!("{}", "No serial devices match.".yellow());
        eprintln!("  platform pattern: {}", serial.pattern.dimmed());
        if let Some(search) = search {
            eprintln!("  search: {}", search.dimmed());
        }
        return Ok(());
    }

    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}
