use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tasador::config::{self, Config};
use tasador::convert::{self, Applicability};
use tasador::io;
use tasador::models::{ModelFile, PopulationBounds, Registry};
use tasador::output;
use tasador::scoring::{self, BatchSummary, PropertyRecord, RawValue};

const EXIT_SUCCESS: i32 = 0;
const EXIT_EVALUATION: i32 = 1;
const EXIT_IO: i32 = 2;
const EXIT_CONFIG: i32 = 4;

#[derive(Subcommand, Debug)]
enum Commands {
    /// List loaded models (default if no subcommand)
    Models,
    /// Validate configuration and model files, then exit
    Check,
    /// Value a single property
    Score {
        /// Municipality population (selects the model)
        #[arg(short, long, required_unless_present = "input")]
        population: Option<u64>,

        /// Municipality code
        #[arg(short, long)]
        municipality: Option<String>,

        /// Feature value, repeatable (e.g. --set superficie=80)
        #[arg(short = 's', long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
        values: Vec<(String, String)>,

        /// Read the record from a JSON file instead
        #[arg(short, long, conflicts_with_all = ["population", "municipality", "values"])]
        input: Option<PathBuf>,

        /// Companion model to score as well, repeatable
        #[arg(long = "model", value_name = "ID")]
        models: Vec<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Value every row of a CSV or workbook sheet
    Batch {
        /// Input CSV or workbook (.xlsx, .xls, .ods) with a header row
        input: PathBuf,

        /// Worksheet to read from a workbook (first sheet when omitted)
        #[arg(long)]
        worksheet: Option<String>,

        /// Write results to a .csv or .json file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Companion model to score as well, repeatable
        #[arg(long = "model", value_name = "ID")]
        models: Vec<String>,

        /// Score rows in parallel
        #[arg(long)]
        parallel: bool,

        /// Tab-separated output for scripting
        #[arg(long, conflicts_with = "output")]
        tsv: bool,
    },
    /// Show model formula and variables
    Docs {
        /// Model id (all models when omitted)
        model: Option<String>,
    },
    /// Convert an exported coefficient sheet (CSV) into a model file
    Convert {
        /// Coefficient sheet (CSV or workbook)
        sheet: PathBuf,

        /// Worksheet to read from a workbook (first sheet when omitted)
        #[arg(long)]
        worksheet: Option<String>,

        /// Model id
        #[arg(long)]
        id: String,

        /// Display name
        #[arg(long)]
        name: Option<String>,

        /// Lower population bound (inclusive)
        #[arg(long, default_value_t = 0)]
        min_population: u64,

        /// Upper population bound (exclusive); unbounded when omitted
        #[arg(long)]
        max_population: Option<u64>,

        /// Emit a companion model instead of a population-selected one
        #[arg(long, conflicts_with_all = ["min_population", "max_population"])]
        companion: bool,

        /// Output file (.yaml or .json)
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(name = "tasador")]
#[command(about = "Discount rate and risk premium valuation from coefficient models", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/tasador/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", s)),
    }
}

fn main() {
    let cli = Cli::parse();
    tasador::logging::init(cli.verbose);

    let command = cli.command.unwrap_or(Commands::Models);
    let start_time = Instant::now();

    // Conversion works on files only and needs no config
    let command = match command {
        Commands::Convert {
            sheet,
            worksheet,
            id,
            name,
            min_population,
            max_population,
            companion,
            output,
        } => {
            let applicability = if companion {
                Applicability::Companion
            } else {
                Applicability::Population(PopulationBounds {
                    min: min_population,
                    max: max_population,
                })
            };
            std::process::exit(run_convert(
                &sheet,
                worksheet.as_deref(),
                &id,
                name.as_deref(),
                applicability,
                &output,
            ));
        }
        other => other,
    };

    // Load config
    let config_path = cli.config.map(PathBuf::from);
    let config = match config::load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    // Models are validated at startup; nothing can be scored without them
    let registry = match config::load_registry(&config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Model config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    let use_colors = output::should_use_colors();

    let code = match command {
        Commands::Models => {
            println!("{}", output::format_model_list(registry.models(), use_colors));
            EXIT_SUCCESS
        }
        Commands::Check => {
            println!(
                "{} models OK ({} selectors, {} companions)",
                registry.models().len(),
                registry.selectors().count(),
                registry.companions().count()
            );
            EXIT_SUCCESS
        }
        Commands::Docs { model } => run_docs(&registry, model.as_deref(), use_colors),
        Commands::Score {
            population,
            municipality,
            values,
            input,
            models,
            json,
        } => {
            let record = match input {
                Some(path) => match io::read_record(&path) {
                    Ok(r) => r,
                    Err(e) => {
                        eprintln!("{:#}", e);
                        std::process::exit(EXIT_IO);
                    }
                },
                None => build_record(population.unwrap_or_default(), municipality, values),
            };
            run_score(&registry, &record, &models, json, use_colors)
        }
        Commands::Batch {
            input,
            worksheet,
            output: output_path,
            models,
            parallel,
            tsv,
        } => run_batch(
            &registry,
            &config,
            &input,
            worksheet.as_deref(),
            output_path,
            &models,
            parallel,
            tsv,
            use_colors,
        ),
        Commands::Convert { .. } => unreachable!("handled before config load"),
    };

    tracing::debug!(elapsed = ?start_time.elapsed(), "done");
    std::process::exit(code);
}

fn run_convert(
    sheet: &Path,
    worksheet: Option<&str>,
    id: &str,
    name: Option<&str>,
    applicability: Applicability,
    output_path: &Path,
) -> i32 {
    let result = io::read_table(sheet, worksheet)
        .and_then(|table| convert::sheet_to_model(&table, id, name, applicability))
        .and_then(|model| convert::write_model_file(output_path, &ModelFile { models: vec![model] }));
    match result {
        Ok(()) => {
            println!("Wrote model '{}' to {}", id, output_path.display());
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("Conversion failed: {:#}", e);
            EXIT_IO
        }
    }
}

fn build_record(
    population: u64,
    municipality: Option<String>,
    values: Vec<(String, String)>,
) -> PropertyRecord {
    let mut record = PropertyRecord::new(population);
    record.municipality = municipality;
    for (name, value) in values {
        record.features.insert(name, RawValue::Text(value));
    }
    record
}

fn run_docs(registry: &Registry, model: Option<&str>, use_colors: bool) -> i32 {
    match model {
        Some(id) => match registry.get(id) {
            Some(m) => {
                println!("{}", output::format_model_doc(m, use_colors));
                EXIT_SUCCESS
            }
            None => {
                eprintln!("Unknown model '{}'", id);
                EXIT_EVALUATION
            }
        },
        None => {
            let docs: Vec<String> = registry
                .models()
                .iter()
                .map(|m| output::format_model_doc(m, use_colors))
                .collect();
            println!("{}", docs.join("\n\n"));
            EXIT_SUCCESS
        }
    }
}

fn run_score(
    registry: &Registry,
    record: &PropertyRecord,
    requested: &[String],
    json: bool,
    use_colors: bool,
) -> i32 {
    match registry.evaluate(record, requested) {
        Ok(evaluation) => {
            if json {
                let results: Vec<&scoring::ScoringResult> = std::iter::once(&evaluation.primary)
                    .chain(&evaluation.companions)
                    .collect();
                match serde_json::to_string_pretty(&results) {
                    Ok(s) => println!("{}", s),
                    Err(e) => {
                        eprintln!("Failed to serialize result: {}", e);
                        return EXIT_IO;
                    }
                }
                for err in &evaluation.companion_errors {
                    eprintln!("{}", err);
                }
            } else {
                println!("{}", output::format_evaluation(&evaluation, use_colors));
            }
            // A companion that could not be scored still fails the command
            if evaluation.is_complete() {
                EXIT_SUCCESS
            } else {
                EXIT_EVALUATION
            }
        }
        Err(e) => {
            eprintln!("{}", output::format_evaluation_error(&e, use_colors));
            EXIT_EVALUATION
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_batch(
    registry: &Registry,
    config: &Config,
    input: &Path,
    worksheet: Option<&str>,
    output_path: Option<PathBuf>,
    requested: &[String],
    parallel: bool,
    tsv: bool,
    use_colors: bool,
) -> i32 {
    if let Err(e) = registry.check_requested(requested) {
        eprintln!("{}", output::format_evaluation_error(&e, use_colors));
        return EXIT_EVALUATION;
    }

    let table = match io::read_table(input, worksheet) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{:#}", e);
            return EXIT_IO;
        }
    };

    let records = table.records(&config.batch);
    let rows = if parallel || config.batch.parallel {
        scoring::run_batch_parallel(registry, &records, requested)
    } else {
        scoring::run_batch_rows(registry, &records, requested)
    };
    let summary = BatchSummary::of(&rows);
    tracing::info!(
        total = summary.total,
        scored = summary.scored,
        failed = summary.failed,
        "batch finished"
    );

    match output_path {
        Some(path) => {
            let is_json = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            let written = if is_json {
                io::write_results_json(&path, &rows)
            } else {
                let companions = companion_columns(registry, requested);
                io::write_results_csv(&path, &table, &rows, &companions)
            };
            if let Err(e) = written {
                eprintln!("{:#}", e);
                return EXIT_IO;
            }
            println!(
                "{} -> {}",
                output::format_batch_summary(&summary),
                path.display()
            );
        }
        None if tsv => println!("{}", output::format_tsv(&rows)),
        None => {
            println!("{}", output::format_batch_table(&rows, use_colors));
            println!();
            println!("{}", output::format_batch_summary(&summary));
        }
    }

    // Row failures are reported per row; the batch itself succeeded
    EXIT_SUCCESS
}

/// Companion ids that get their own column in CSV output.
fn companion_columns(registry: &Registry, requested: &[String]) -> Vec<String> {
    use tasador::models::CompanionPolicy;
    match registry.policy().companions {
        CompanionPolicy::Always => registry.companions().map(|m| m.id.clone()).collect(),
        CompanionPolicy::Independent => registry
            .companions()
            .filter(|m| requested.contains(&m.id))
            .map(|m| m.id.clone())
            .collect(),
    }
}
