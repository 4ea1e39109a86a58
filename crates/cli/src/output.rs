//! Output formatting for the CLI.

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Output format, selectable with the global `--format` flag.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Plain `key: value` format
    Plain,
}

/// Trait for items that can be displayed in a table.
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Print a single item.
pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(T::headers());
            table.add_row(item.row());
            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(item).unwrap_or_default());
        }
        OutputFormat::Plain => {
            let row = item.row();
            for (header, value) in T::headers().iter().zip(row.iter()) {
                println!("{header}: {value}");
            }
        }
    }
}

/// Print a list of items.
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }
            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                let row = item.row();
                for (header, value) in T::headers().iter().zip(row.iter()) {
                    println!("{header}: {value}");
                }
            }
        }
    }
}

/// Print raw JSON (already-serialized payload from the daemon) honoring
/// `--format`; table/plain both fall back to pretty-printed JSON since the
/// shape is caller-defined, not a fixed `TableDisplay`.
pub fn print_json_blob(raw: &str, format: OutputFormat) {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => {
            println!("{raw}");
            return;
        }
    };
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
        }
        _ => {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
        }
    }
}

pub fn print_success(message: &str) {
    println!("✓ {message}");
}

pub fn print_error(message: &str) {
    eprintln!("✗ {message}");
}

pub fn print_warning(message: &str) {
    println!("! {message}");
}
