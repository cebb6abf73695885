//! Formulary CLI - group formula/material CSV rows into formulas
//!
//! # Main Commands
//!
//! ```bash
//! formulary serve                        # Start HTTP server (port 3000)
//! formulary group formulas.csv           # Grouped formulas as JSON
//! formulary list formulas.csv --sort total_cost --desc
//! formulary show formulas.csv F001       # One formula with its materials
//! formulary export formulas.csv --formula F001 -o out.csv
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! formulary parse formulas.csv           # Just parse CSV to JSON
//! formulary validate formulas.json       # Validate formulas against schema
//! ```

use clap::{Parser, Subcommand};
use formulary::{
    aggregate_to_csv, aggregates_to_csv, group_rows_owned, group_rows_parallel, load_formulas_from_path,
    logging, parse_csv_file_auto, rows_from_json, validate_formula_aggregate, AppConfig, Catalog, CatalogQuery,
    FormulaAggregate, LoadOptions, LoadResult, SortKey,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "formulary")]
#[command(about = "Group flat formula/material CSV rows into formulas", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a CSV file and output its records as JSON
    Parse {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Group rows into formulas (CSV, or a JSON array of rows)
    Group {
        /// Input CSV or JSON file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Always group on the thread pool
        #[arg(long)]
        parallel: bool,
    },

    /// Search, filter, sort and page the formulas of a CSV
    List {
        /// Input CSV file
        input: PathBuf,

        /// Case-insensitive text matched against name, category and notes
        #[arg(short, long, default_value = "")]
        search: String,

        /// Exact category
        #[arg(short, long)]
        category: Option<String>,

        /// name, category, materials_count or total_cost
        #[arg(long)]
        sort: Option<SortKey>,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// 0-based page
        #[arg(long, default_value = "0")]
        page: usize,

        /// Formulas per page (default: FORMULARY_PAGE_SIZE)
        #[arg(long)]
        page_size: Option<usize>,
    },

    /// Show one formula with its materials
    Show {
        /// Input CSV file
        input: PathBuf,

        /// Formula id
        formula_id: String,
    },

    /// Export formulas back to CSV
    Export {
        /// Input CSV file
        input: PathBuf,

        /// Only this formula
        #[arg(short, long)]
        formula: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a JSON array of formulas against the schema
    Validate {
        /// Input JSON file
        input: PathBuf,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: FORMULARY_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present), before RUST_LOG and FORMULARY_* are read
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Parse { input, output } => cmd_parse(&input, output.as_deref()),

        Commands::Group {
            input,
            output,
            parallel,
        } => cmd_group(&input, output.as_deref(), parallel, &config),

        Commands::List {
            input,
            search,
            category,
            sort,
            desc,
            page,
            page_size,
        } => {
            let query = CatalogQuery {
                sort,
                descending: desc,
                page,
                page_size: page_size.unwrap_or(config.page_size),
            };
            cmd_list(&input, &search, category.as_deref(), &query, &config)
        }

        Commands::Show { input, formula_id } => cmd_show(&input, &formula_id, &config),

        Commands::Export {
            input,
            formula,
            output,
        } => cmd_export(&input, formula.as_deref(), output.as_deref(), &config),

        Commands::Validate { input } => cmd_validate(&input),

        Commands::Serve { port } => cmd_serve(port, config).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_parse(input: &Path, output: Option<&Path>) -> CmdResult {
    eprintln!("📄 Parsing CSV: {}", input.display());

    let result = parse_csv_file_auto(input)?;

    eprintln!("   Encoding: {}", result.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(result.delimiter));
    eprintln!("   Columns: {}", result.headers.join(", "));
    eprintln!("✅ Parsed {} records", result.records.len());

    let records: Vec<_> = result.records.iter().map(|r| &r.fields).collect();
    let json = serde_json::to_string_pretty(&records)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_group(input: &Path, output: Option<&Path>, parallel: bool, config: &AppConfig) -> CmdResult {
    eprintln!("📦 Grouping: {}", input.display());

    let is_json = input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let formulas = if is_json {
        let rows = rows_from_json(&fs::read_to_string(input)?)?;
        eprintln!("   {} rows", rows.len());
        if parallel {
            group_rows_parallel(&rows)
        } else {
            group_rows_owned(rows)
        }
    } else {
        let options = LoadOptions {
            parallel_threshold: if parallel { 0 } else { config.parallel_threshold },
            validate_output: false,
        };
        let result = load_formulas_from_path(input, &options)?;
        print_load_summary(&result);
        result.formulas
    };

    eprintln!("   {} formulas", formulas.len());

    let json = serde_json::to_string_pretty(&formulas)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_list(
    input: &Path,
    search: &str,
    category: Option<&str>,
    query: &CatalogQuery,
    config: &AppConfig,
) -> CmdResult {
    let catalog = load_catalog(input, config)?;
    let page = catalog.query_by(search, category, query);

    if page.items.is_empty() {
        eprintln!("📋 No formulas match.");
        return Ok(());
    }

    println!(
        "{:<12} {:<30} {:<16} {:>9} {:>12}",
        "ID", "NAME", "CATEGORY", "MATERIALS", "TOTAL COST"
    );
    for formula in &page.items {
        println!(
            "{:<12} {:<30} {:<16} {:>9} {:>12}",
            formula.formula_id,
            formula.name,
            formula.category.as_deref().unwrap_or("-"),
            formula.materials_count(),
            format_cost(formula.total_cost),
        );
    }

    eprintln!(
        "\nPage {} of {} ({} formulas)",
        page.page + 1,
        page.total_pages.max(1),
        page.total_items
    );

    Ok(())
}

fn cmd_show(input: &Path, formula_id: &str, config: &AppConfig) -> CmdResult {
    let catalog = load_catalog(input, config)?;
    let formula = catalog
        .get(formula_id)
        .ok_or_else(|| format!("Formula not found: {}", formula_id))?;

    print_formula(formula);
    Ok(())
}

fn cmd_export(input: &Path, formula_id: Option<&str>, output: Option<&Path>, config: &AppConfig) -> CmdResult {
    let catalog = load_catalog(input, config)?;

    let csv = match formula_id {
        Some(id) => {
            let formula = catalog.get(id).ok_or_else(|| format!("Formula not found: {}", id))?;
            aggregate_to_csv(formula)?
        }
        None => aggregates_to_csv(catalog.formulas())?,
    };

    write_output(csv.trim_end(), output)?;
    Ok(())
}

fn cmd_validate(input: &Path) -> CmdResult {
    eprintln!("✔️  Validating: {}", input.display());

    let content = fs::read_to_string(input)?;
    let formulas: Vec<Value> = serde_json::from_str(&content)?;

    let mut valid = 0;
    let mut invalid = 0;

    for (i, formula) in formulas.iter().enumerate() {
        match validate_formula_aggregate(formula) {
            Ok(()) => valid += 1,
            Err(errors) => {
                invalid += 1;
                if invalid <= 5 {
                    eprintln!("\n❌ Formula {} invalid:", i);
                    for err in errors.iter().take(3) {
                        eprintln!("   - {}", err);
                    }
                }
            }
        }
    }

    eprintln!("\n📊 Results: {} valid, {} invalid", valid, invalid);

    if invalid > 0 {
        std::process::exit(1);
    }

    Ok(())
}

async fn cmd_serve(port: Option<u16>, mut config: AppConfig) -> CmdResult {
    if let Some(port) = port {
        config.port = port;
    }
    eprintln!("🚀 Formulary server on http://localhost:{}", config.port);
    formulary::server::start_server(config).await?;
    Ok(())
}

fn load_catalog(input: &Path, config: &AppConfig) -> Result<Catalog, Box<dyn std::error::Error>> {
    let options = LoadOptions {
        parallel_threshold: config.parallel_threshold,
        validate_output: false,
    };
    let result = load_formulas_from_path(input, &options)?;
    print_load_summary(&result);
    Ok(Catalog::new(result.formulas))
}

fn print_load_summary(result: &LoadResult) {
    eprintln!("   Encoding: {}", result.csv_info.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(result.csv_info.delimiter));
    eprintln!("   Rows: {}", result.row_count);

    if !result.skipped.is_empty() {
        eprintln!("   ⚠️  Skipped: {}", result.skipped.len());
        for skip in result.skipped.iter().take(5) {
            eprintln!("     - line {}: missing {}", skip.line, skip.missing.join(", "));
        }
    }
    if !result.coercions.is_empty() {
        eprintln!("   ⚠️  Unreadable numbers: {}", result.coercions.len());
    }
}

fn print_formula(formula: &FormulaAggregate) {
    println!("{} - {}", formula.formula_id, formula.name);
    if let Some(category) = &formula.category {
        println!("Category: {}", category);
    }
    if let Some(notes) = &formula.notes {
        println!("Notes:    {}", notes);
    }
    println!();

    println!(
        "{:<12} {:<30} {:>10} {:<6} {:>10}",
        "MATERIAL", "NAME", "QTY", "UOM", "UNIT COST"
    );
    for line in &formula.materials {
        println!(
            "{:<12} {:<30} {:>10} {:<6} {:>10}",
            line.material_id,
            line.material_name,
            line.qty.value(),
            line.uom.as_deref().unwrap_or(""),
            format_cost(line.unit_cost),
        );
    }

    println!();
    println!("Materials:  {}", formula.materials_count());
    println!("Total cost: {}", format_cost(formula.total_cost));
}

fn format_cost(cost: Option<f64>) -> String {
    cost.map(|c| format!("{:.2}", c)).unwrap_or_else(|| "-".to_string())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> CmdResult {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
