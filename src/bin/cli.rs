//! CLI application for the children vs adults experiment.
//!
//! Usage:
//!   face-age-pca                                  # Fixed component count
//!   face-age-pca --search                         # Component search + C sweep
//!   face-age-pca --search --json -o report.json   # Save the report as JSON
//!   face-age-pca --save-model age.bin             # Keep the trained model

use clap::Parser;
use face_age_pca::{experiment, Evaluation, ExperimentArgs, Report};
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "face-age-pca")]
#[command(author, version, about = "Children vs adults face classification with PCA", long_about = None)]
struct Args {
    #[command(flatten)]
    experiment: ExperimentArgs,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the trained model to this file
    #[arg(long)]
    save_model: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.experiment.to_config()?;
    let report = experiment::run(&config)?;

    if let Some(ref path) = args.save_model {
        report.model.save(path)?;
        info!("model written to {}", path.display());
    }

    let output_str = if args.json {
        serde_json::to_string_pretty(&report)?
    } else {
        format_human_readable(&report)
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output_str)?;
        info!("output written to {}", path.display());
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

fn format_human_readable(report: &Report) -> String {
    let mut s = String::new();

    s.push_str(&format!(
        "Components: {} of {} ({:.2}% of the variance)\n",
        report.components,
        report.input_dimension,
        report.explained_variance * 100.0
    ));
    s.push_str(&format!("Unpenalized test F1: {:.4}\n", report.holdout_f1));

    if let Some(ref selection) = report.selection {
        s.push_str(&format!(
            "\nCross-validated F1 ({} penalty):\n",
            selection.penalty.name()
        ));
        s.push_str(&format!("  {:>10}  {:>8}  {:>8}\n", "C", "mean", "std"));
        for point in &selection.points {
            let marker = if point.c == selection.selected_c { " *" } else { "" };
            s.push_str(&format!(
                "  {:>10}  {:>8.4}  {:>8.4}{}\n",
                point.c, point.cv.mean, point.cv.std_dev, marker
            ));
        }
    }

    push_evaluation(&mut s, "training", &report.train);
    push_evaluation(&mut s, "test", &report.test);

    s.push_str(&format!("\nROC AUC (on test set): {:.4}\n", report.roc_auc));
    s
}

fn push_evaluation(s: &mut String, set: &str, eval: &Evaluation) {
    let cm = &eval.confusion;
    s.push_str(&format!("\n(on {} set)\n", set));
    s.push_str(&format!("tn: {}, fp: {}, fn: {}, tp: {}\n", cm.tn, cm.fp, cm.fn_, cm.tp));
    s.push_str(&format!("accuracy: {}\n", eval.accuracy));
    s.push_str(&format!("f1 score: {}\n", eval.f1));
}
