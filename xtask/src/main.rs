use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "linkage workspace automation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the list and thread-cache benchmarks and write a comparison report
    Bench {
        /// Run quickly (lower sample size/time)
        #[arg(long, default_value_t = false)]
        quick: bool,

        /// Generate report only (skip running benchmarks)
        #[arg(long, default_value_t = false)]
        report_only: bool,
    },
    /// Repeat the stress suite with synthetic stalls at critical points
    Stress {
        /// Number of passes over the stress suite
        #[arg(long, default_value_t = 10)]
        iterations: u32,
    },
    /// Model-check the tagged roots under loom
    Loom,
}

const BENCHES: &[&str] = &["list_benchmark", "thread_cache_benchmark"];
const STRESS_CONFIG: &str = r#"{"test_critical_stall":true}"#;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Bench { quick, report_only } => {
            if !report_only {
                run_benchmarks(quick)?;
            }
            generate_report()?;
        }
        Commands::Stress { iterations } => run_stress(iterations)?,
        Commands::Loom => run_loom()?,
    }

    Ok(())
}

fn run_benchmarks(quick: bool) -> Result<()> {
    println!("Running benchmarks...");

    for bench in BENCHES {
        println!("\n>>> {bench}");
        let start = Instant::now();

        let mut cmd = Command::new("cargo");
        cmd.env("CARGO_INCREMENTAL", "0");
        cmd.args(["bench", "-p", "linkage", "--bench", bench]);

        // Args for the test runner (Criterion) go after --
        cmd.arg("--");
        if quick {
            cmd.arg("--measurement-time").arg("0.1");
            cmd.arg("--noplot");
            cmd.arg("--sample-size").arg("10");
        }

        let status = cmd
            .status()
            .with_context(|| format!("Failed to run bench {bench}"))?;
        if !status.success() {
            eprintln!("Warning: benchmark {bench} failed");
        } else {
            println!("Finished {bench} in {:.2?}", start.elapsed());
        }
    }

    Ok(())
}

fn run_stress(iterations: u32) -> Result<()> {
    for pass in 1..=iterations {
        println!(">>> stress pass {pass}/{iterations}");
        let status = Command::new("cargo")
            .env("LINKAGE_CONFIG", STRESS_CONFIG)
            .args(["test", "-p", "linkage"])
            .args(["--test", "stress", "--test", "lifo_test", "--test", "fifo_test"])
            .status()
            .context("Failed to run the stress suite")?;
        if !status.success() {
            anyhow::bail!("stress pass {pass} failed");
        }
    }
    Ok(())
}

fn run_loom() -> Result<()> {
    let status = Command::new("cargo")
        .env("RUSTFLAGS", "--cfg loom")
        .env("CARGO_TARGET_DIR", "target/loom")
        .args(["test", "-p", "linkage", "--release", "--test", "loom_stack"])
        .status()
        .context("Failed to run loom models")?;
    if !status.success() {
        anyhow::bail!("loom models failed");
    }
    Ok(())
}

/// group -> implementation -> elements per second
type Results = BTreeMap<String, BTreeMap<String, f64>>;

fn generate_report() -> Result<()> {
    println!("\n>>> Generating Report...");
    let criterion_dir = Path::new("target/criterion");
    if !criterion_dir.exists() {
        eprintln!("No criterion output found at {}", criterion_dir.display());
        return Ok(());
    }

    let mut results = Results::new();
    collect_results(criterion_dir, &mut results)?;

    let report_path = Path::new("benchmark_results/report.md");
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }

    use std::fmt::Write as _;
    let mut out = String::from("# Benchmark Report\n");
    for (workload, by_impl) in &results {
        let baseline = by_impl
            .iter()
            .find(|(name, _)| name.starts_with("mutex"))
            .map(|(_, ops)| *ops);

        writeln!(out, "\n## {workload}\n")?;
        writeln!(out, "| Implementation | Ops/s | vs Mutex |")?;
        writeln!(out, "|---|---|---|")?;
        for (name, ops) in by_impl {
            let rel = match baseline {
                Some(base) if base > 0.0 => format!("**{:.2}x**", ops / base),
                _ => "-".to_owned(),
            };
            writeln!(out, "| {name} | {} | {rel} |", format_ops(*ops))?;
        }
    }

    fs::write(report_path, out)?;
    println!("Report written to {}", report_path.display());
    Ok(())
}

fn format_ops(ops: f64) -> String {
    if ops > 1_000_000.0 {
        format!("{:.2}M", ops / 1_000_000.0)
    } else if ops > 1_000.0 {
        format!("{:.2}K", ops / 1_000.0)
    } else {
        format!("{ops:.0}")
    }
}

/// Walks `target/criterion/<group>/<function>[/<param>]/new/estimates.json`.
fn collect_results(dir: &Path, results: &mut Results) -> Result<()> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Ok(());
    };
    let skip: BTreeSet<&str> = ["report", "base", "change"].into_iter().collect();

    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_dir() {
            if !skip.contains(name.as_str()) {
                collect_results(&path, results)?;
            }
            continue;
        }
        if name != "estimates.json" {
            continue;
        }
        let Some(run_dir) = path.parent() else { continue };
        if run_dir.file_name().and_then(|s| s.to_str()) != Some("new") {
            continue;
        }

        let bench: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(run_dir.join("benchmark.json"))
                .with_context(|| format!("missing benchmark.json next to {}", path.display()))?,
        )?;
        let estimates: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;

        // Parameterized runs get one table per parameter.
        let mut group = bench["group_id"].as_str().unwrap_or("unknown").to_owned();
        if let Some(param) = bench["value_str"].as_str() {
            group = format!("{group}/{param}");
        }
        let function = bench["function_id"].as_str().unwrap_or("").to_owned();
        let elements = bench["throughput"]["Elements"].as_f64().unwrap_or(1.0);
        let time_ns = estimates["mean"]["point_estimate"].as_f64().unwrap_or(0.0);
        if time_ns > 0.0 {
            results
                .entry(group)
                .or_default()
                .insert(function, elements * 1e9 / time_ns);
        }
    }
    Ok(())
}
