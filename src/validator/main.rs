//! Standalone validator for prediction pool files.
//!
//! Checks that a pool file yields at least one item and reports blank
//! lines, duplicates, and overly long items.

use std::collections::HashMap;
use std::process::ExitCode;

use clap::Parser;

use prediction_bot::config::ContentPool;

/// Prediction pool validator.
#[derive(Parser, Debug)]
#[command(name = "validate_pool")]
#[command(about = "Validates prediction pool files for the prediction bot")]
#[command(version)]
struct Args {
    /// Path to the predictions file to validate.
    #[arg(short, long, default_value = "predictions.txt")]
    file: String,

    /// Warn about items longer than this many characters.
    #[arg(short, long, default_value_t = 280)]
    max_length: usize,

    /// Generate an example pool file at the specified path.
    #[arg(long)]
    generate_example: Option<String>,

    /// Show every item.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(output_path) = args.generate_example {
        return generate_example(&output_path);
    }

    validate_pool(&args.file, args.max_length, args.verbose)
}

fn generate_example(output_path: &str) -> ExitCode {
    let example = ContentPool::example();

    match example.save_to_file(output_path) {
        Ok(()) => {
            println!("✓ Example pool written to: {output_path}");
            println!("\nThe file contains {} example predictions.", example.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Failed to write example file: {e}");
            ExitCode::FAILURE
        }
    }
}

fn validate_pool(path: &str, max_length: usize, verbose: bool) -> ExitCode {
    println!("Validating: {path}\n");

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("✗ Failed to read pool: {e}");
            return ExitCode::FAILURE;
        }
    };

    let pool = match ContentPool::from_items(raw.lines()) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("✗ {e}");
            return ExitCode::FAILURE;
        }
    };

    let blank = raw.lines().filter(|l| l.trim().is_empty()).count();
    let report = inspect(&pool, max_length);

    for (index, item) in pool.iter().enumerate() {
        let chars = item.chars().count();
        if verbose {
            println!("[{index}] \"{}\" ({chars} chars)", truncate(item, 40));
        }
        if chars > max_length {
            println!("  ⚠ Item {index} is {chars} chars (limit {max_length})");
        }
    }

    for (item, indices) in &report.duplicates {
        println!("  ⚠ Duplicate item at {indices:?}: \"{}\"", truncate(item, 40));
    }

    println!();
    println!("✓ {} predictions loaded", pool.len());
    if blank > 0 {
        println!("  ({blank} blank line(s) skipped)");
    }

    let warnings = report.too_long + report.duplicates.len();
    if warnings > 0 {
        println!("  ({warnings} warning(s): duplicates repeat within a cycle, long items may not fit a message)");
    }

    ExitCode::SUCCESS
}

/// Findings that do not prevent the pool from loading.
#[derive(Debug, Default)]
struct Report {
    too_long: usize,
    duplicates: Vec<(String, Vec<usize>)>,
}

fn inspect(pool: &ContentPool, max_length: usize) -> Report {
    let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut too_long = 0;

    for (index, item) in pool.iter().enumerate() {
        if item.chars().count() > max_length {
            too_long += 1;
        }
        positions.entry(item).or_default().push(index);
    }

    let mut duplicates: Vec<(String, Vec<usize>)> = positions
        .into_iter()
        .filter(|(_, indices)| indices.len() > 1)
        .map(|(item, indices)| (item.to_owned(), indices))
        .collect();
    duplicates.sort_by_key(|(_, indices)| indices[0]);

    Report {
        too_long,
        duplicates,
    }
}

/// Truncates a string for display.
fn truncate(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", chars[..max_len].iter().collect::<String>())
    }
}
