//! flowtrace CLI tool.
//!
//! Runs the analysis engine over a CSV ledger and lists the detectors.

use anyhow::Context;
use clap::{Parser, Subcommand};
use flowtrace::catalog::{detectors, families, FamilyInfo};
use flowtrace::core::config::EngineConfig;
use flowtrace::core::logging::{LogConfig, LogLevel};
use flowtrace::core::traits::BatchAnalyzer;
use flowtrace::engine::{AnalysisEngine, AnalysisOutcome};
use flowtrace::graph::input::RawTransaction;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "flowtrace")]
#[command(version, about = "Transaction graph analysis for money-laundering investigation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a CSV ledger
    Analyze {
        /// CSV with transaction_id, sender_id, receiver_id, amount, timestamp
        input: PathBuf,

        /// TOML configuration file (defaults to FLOWTRACE_* environment)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pretty-print the report
        #[arg(long)]
        pretty: bool,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the visualization graph as JSON
        #[arg(long)]
        graph: Option<PathBuf>,
    },

    /// List available detectors
    Detectors {
        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,
    },

    /// Print a configuration as TOML
    Config {
        /// Preset: development or production
        #[arg(long, default_value = "development")]
        preset: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a demonstration CSV ledger
    Sample,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let mut logging = LogConfig::default().with_level(level);
    logging.structured = cli.json_logs;
    logging.init()?;

    match cli.command {
        Commands::Analyze {
            input,
            config,
            pretty,
            output,
            graph,
        } => {
            cmd_analyze(&input, config.as_deref(), pretty, output.as_deref(), graph.as_deref())
                .await?;
        }

        Commands::Detectors { detailed } => {
            cmd_detectors(detailed);
        }

        Commands::Config { preset, output } => {
            cmd_config(&preset, output.as_deref())?;
        }

        Commands::Sample => {
            cmd_sample()?;
        }
    }

    Ok(())
}

async fn cmd_analyze(
    input: &Path,
    config: Option<&Path>,
    pretty: bool,
    output: Option<&Path>,
    graph: Option<&Path>,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::from_env()?,
    };
    let engine = AnalysisEngine::new(config)?;

    let records = read_records(input)?;
    tracing::info!(rows = records.len(), input = %input.display(), "ledger loaded");

    let outcome: AnalysisOutcome = engine.execute(records).await?;
    let report = outcome.report.to_json(pretty)?;
    match output {
        Some(path) => std::fs::write(path, report)
            .with_context(|| format!("writing report {}", path.display()))?,
        None => println!("{report}"),
    }

    if let Some(path) = graph {
        let json = if pretty {
            serde_json::to_string_pretty(&outcome.graph)?
        } else {
            serde_json::to_string(&outcome.graph)?
        };
        std::fs::write(path, json).with_context(|| format!("writing graph {}", path.display()))?;
    }

    let summary = &outcome.report.summary;
    tracing::info!(
        flagged = summary.suspicious_accounts_flagged,
        rings = summary.fraud_rings_detected,
        seconds = summary.processing_time_seconds,
        "report written"
    );
    Ok(())
}

/// Read a CSV ledger. Headers must match the record field names.
fn read_records(path: &Path) -> anyhow::Result<Vec<RawTransaction>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut records = Vec::new();
    for (row, record) in reader.deserialize::<RawTransaction>().enumerate() {
        let record = record.with_context(|| format!("reading CSV row {row}"))?;
        records.push(record);
    }
    Ok(records)
}

fn cmd_detectors(detailed: bool) {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║              flowtrace Detector Catalogue                        ║");
    println!("╚══════════════════════════════════════════════════════════════════╝\n");

    let all = detectors();
    for info in families() {
        print_family(&info, detailed);
        for detector in all.iter().filter(|d| d.family == info.family) {
            let rings = if detector.forms_rings { "rings" } else { "     " };
            if detailed {
                println!(
                    "│  [{rings}] {:<28} v{} - {}",
                    detector.id, detector.version, detector.description
                );
            } else {
                println!("│  [{rings}] {}", detector.id);
            }
        }
        println!("└─────────────────────────────────────────────────────────────────┘\n");
    }

    println!("Total: {} detectors", all.len());
}

fn print_family(info: &FamilyInfo, detailed: bool) {
    println!("┌─────────────────────────────────────────────────────────────────┐");
    println!("│ {} ({} detectors)", info.name, info.detector_count);
    if detailed {
        println!("│ {}", info.description);
    }
    println!("├─────────────────────────────────────────────────────────────────┤");
}

fn cmd_config(preset: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let toml = EngineConfig::preset(preset)?.to_toml()?;
    match output {
        Some(path) => {
            std::fs::write(path, toml).with_context(|| format!("writing {}", path.display()))?;
        }
        None => print!("{toml}"),
    }
    Ok(())
}

fn cmd_sample() -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    write_sample(&mut handle)?;
    handle.flush()?;
    Ok(())
}

/// Demonstration ledger: a cycle, a fan-in star, a shell chain and some
/// ordinary traffic.
fn sample_records() -> Vec<RawTransaction> {
    let mut rows = Vec::new();
    let mut push = |sender: &str, receiver: &str, amount: f64, hour: u32, minute: u32| {
        let day = 1 + hour / 24;
        let id = format!("TX_{:04}", rows.len() + 1);
        rows.push(RawTransaction::new(
            id,
            sender,
            receiver,
            format!("{amount:.2}"),
            format!("2024-03-{day:02} {:02}:{minute:02}:00", hour % 24),
        ));
    };

    // Cycle
    push("ACC_A", "ACC_B", 9_800.0, 0, 5);
    push("ACC_B", "ACC_C", 4_700.0, 2, 10);
    push("ACC_C", "ACC_A", 2_300.0, 4, 15);

    // Fan-in
    for i in 0..12 {
        push(&format!("SMURF_{i:02}"), "COLLECTOR", 950.0 + f64::from(i) * 5.0, 10 + i, 0);
    }

    // Shell chain
    push("ORIGIN", "SHELL_1", 50_000.0, 30, 0);
    push("SHELL_1", "SHELL_2", 48_500.0, 31, 30);
    push("SHELL_2", "SHELL_3", 47_000.0, 33, 0);
    push("SHELL_3", "OFFSHORE", 46_000.0, 35, 45);

    // Ordinary traffic
    for i in 0..8 {
        push(&format!("CUST_{i}"), "GROCER", 35.0 + f64::from(i) * 7.5, 40 + i * 3, 20);
    }
    push("GROCER", "WHOLESALER", 150.0, 70, 0);

    rows
}

fn write_sample(writer: impl Write) -> anyhow::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for record in sample_records() {
        csv.serialize(record)?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_roundtrips_through_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.csv");
        let file = std::fs::File::create(&path).unwrap();
        write_sample(file).unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records, sample_records());
    }

    #[test]
    fn test_sample_triggers_every_ring_pattern() {
        let outcome = AnalysisEngine::default()
            .analyze_records(&sample_records())
            .unwrap();
        let patterns: Vec<&str> = outcome
            .report
            .fraud_rings
            .iter()
            .map(|r| r.pattern_type.as_str())
            .collect();
        assert_eq!(patterns, vec!["cycle", "shell_chain", "fan_in"]);
    }

    #[test]
    fn test_read_records_trims_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        std::fs::write(
            &path,
            "transaction_id, sender_id, receiver_id, amount, timestamp\n\
             T1, A, B, \"$1,200.50\", 2024-01-15 10:30:00\n",
        )
        .unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sender_id, "A");
        assert_eq!(records[0].amount, "$1,200.50");
    }

    #[test]
    fn test_missing_column_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        std::fs::write(&path, "transaction_id,sender_id,amount\nT1,A,10\n").unwrap();
        assert!(read_records(&path).is_err());
    }

    #[test]
    fn test_config_rejects_unknown_preset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        assert!(cmd_config("staging", Some(&path)).is_err());
        assert!(!path.exists());

        cmd_config("production", Some(&path)).unwrap();
        assert!(EngineConfig::from_file(&path).is_ok());
    }

    #[test]
    fn test_cli_parses_analyze() {
        let cli = Cli::try_parse_from([
            "flowtrace",
            "analyze",
            "ledger.csv",
            "--pretty",
            "--graph",
            "graph.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze {
                input,
                pretty,
                graph,
                ..
            } => {
                assert_eq!(input, PathBuf::from("ledger.csv"));
                assert!(pretty);
                assert_eq!(graph, Some(PathBuf::from("graph.json")));
            }
            _ => panic!("expected analyze"),
        }
    }
}
