use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use radiodx::{ClassifierRegistry, DiagnosticEngine, Diagnosis, DiseaseMode, EngineConfig};

#[derive(Parser)]
#[command(name = "radiodx")]
#[command(about = "Screen grayscale radiographs for fractures or tuberculosis")]
struct Cli {
    /// Path to input image file
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// Which condition to screen for: fracture or tb
    #[arg(short, long, value_name = "MODE")]
    disease: String,

    /// Config file with model paths (defaults to ./radiodx.toml if present)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Fracture model file, overrides the config
    #[arg(long, value_name = "FILE")]
    fracture_model: Option<PathBuf>,

    /// Tuberculosis model file, overrides the config
    #[arg(long, value_name = "FILE")]
    tb_model: Option<PathBuf>,

    /// Print the diagnosis as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mode: DiseaseMode = args.disease.parse()?;

    let config = match &args.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::discover()?,
    }
    .with_overrides(args.fracture_model, args.tb_model);

    let registry = ClassifierRegistry::load(&config.models);
    let engine = DiagnosticEngine::new(registry);

    let diagnosis = engine.diagnose_path(&args.image_path, mode)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&diagnosis)?);
    } else {
        print_diagnosis(&diagnosis);
    }

    Ok(())
}

fn print_diagnosis(diagnosis: &Diagnosis) {
    let verdict = &diagnosis.verdict;
    println!("\n=== {} Screening ===", verdict.mode.display_name());
    println!("Result: {} ({:.2}% confidence)", verdict.label, verdict.confidence);
    println!("{}", verdict.explanation.rationale);
    if let Some(note) = &verdict.explanation.override_note {
        println!("Note: {}", note);
    }

    println!("\nFeatures:");
    for fe in &verdict.feature_explanations {
        println!(
            "  {:<20} {:>12.4}  [{}] {}",
            fe.feature.as_str(),
            fe.value,
            fe.importance,
            fe.interpretation
        );
    }

    if let Some(texture) = &diagnosis.texture {
        let bins: Vec<String> = texture.iter().map(|v| format!("{:.3}", v)).collect();
        println!("  texture histogram    [{}]", bins.join(", "));
    }

    println!("\nRecommendation: {}", verdict.explanation.recommendation);
}
