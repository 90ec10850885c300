use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tabled::builder::Builder;
use tabled::settings::Style;
use telemon_ingest::Value;

use crate::element::{ElementError, Render, arg};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Column headers.
    pub headers: Vec<String>,
    /// Row names, shown in the left column.
    pub variables: Vec<String>,
    /// Width every data cell is centred or truncated to.
    pub column_width: usize,
    /// Width of the row-name column; unconstrained when unset.
    pub left_column_width: Option<usize>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            variables: Vec::new(),
            column_width: 6,
            left_column_width: None,
        }
    }
}

/// Grid of cells addressed by (row variable, column header).
///
/// Update arguments: `<variable> <header> <value>`. Unknown rows or
/// headers are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    config: TableConfig,
    cells: IndexMap<String, Vec<String>>,
}

impl Table {
    pub fn new(config: TableConfig) -> Self {
        let cells = config
            .variables
            .iter()
            .map(|var| (var.clone(), vec!["0".to_owned(); config.headers.len()]))
            .collect();
        Self { config, cells }
    }

    pub fn cell(&self, variable: &str, header: &str) -> Option<&str> {
        let column = self.column(header)?;
        self.cells.get(variable)?.get(column).map(String::as_str)
    }

    fn column(&self, header: &str) -> Option<usize> {
        self.config.headers.iter().position(|h| h == header)
    }
}

/// Truncate with `...` when too long, else centre.
fn fit(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len > width {
        let keep = width.saturating_sub(3);
        let mut out: String = text.chars().take(keep).collect();
        out.push_str(&"...".chars().take(width).collect::<String>());
        out
    } else {
        format!("{text:^width$}")
    }
}

impl Render for Table {
    fn update(&mut self, args: &[Value]) -> Result<(), ElementError> {
        let variable = arg(args, 0)?.to_string();
        let header = arg(args, 1)?.to_string();
        let value = arg(args, 2)?.to_string();

        let Some(column) = self.column(&header) else {
            tracing::trace!(header = %header, "Ignoring update for unknown table column");
            return Ok(());
        };
        match self.cells.get_mut(&variable).and_then(|row| row.get_mut(column)) {
            Some(cell) => *cell = value,
            None => tracing::trace!(variable = %variable, "Ignoring update for unknown table row"),
        }
        Ok(())
    }

    fn display(&self) -> String {
        let width = self.config.column_width;
        let left = |text: &str| match self.config.left_column_width {
            Some(w) => fit(text, w),
            None => text.to_owned(),
        };

        let mut builder = Builder::default();
        let mut header_row = vec![left("")];
        header_row.extend(self.config.headers.iter().map(|h| fit(h, width)));
        builder.push_record(header_row);

        for (variable, row) in &self.cells {
            let mut record = vec![left(variable)];
            record.extend(row.iter().map(|cell| fit(cell, width)));
            builder.push_record(record);
        }

        let mut table = builder.build();
        table.with(Style::modern());
        table.to_string()
    }

    fn height(&self) -> usize {
        self.display().lines().count()
    }
}
