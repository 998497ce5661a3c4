mod input;
mod settings;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use palta_core::{
    BatchRunner, CareGuide, ClassifierService, Diagnosis, DiagnosisConfig, FsImageStore,
    LanguagePreference, Language, care_guide, diagnose, export_csv,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;

/// Avocado crop diagnosis by majority vote over several photos
#[derive(Parser, Debug)]
#[command(name = "palta", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE", env = "PALTA_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output language: es, en or system
    #[arg(long, value_parser = parse_language, global = true)]
    lang: Option<LanguagePreference>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a batch of images and print the consensus diagnosis
    Diagnose {
        /// Image files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Override the maximum batch size
        #[arg(long)]
        max_images: Option<usize>,

        /// Override the model file
        #[arg(long, value_name = "FILE")]
        model: Option<PathBuf>,

        /// Directory uploads are stored in
        #[arg(long, value_name = "DIR")]
        uploads: Option<PathBuf>,

        /// Classify images in parallel
        #[arg(long)]
        parallel: bool,

        /// Print the diagnosis as JSON
        #[arg(long)]
        json: bool,

        /// Also write per-image votes to this CSV file
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,
    },
    /// Show the care guide for a label
    Care { label: String },
    /// List the configured labels in model output order
    Labels,
}

fn parse_language(value: &str) -> Result<LanguagePreference, String> {
    match value.to_ascii_lowercase().as_str() {
        "es" | "spanish" | "español" => Ok(LanguagePreference::Spanish),
        "en" | "english" => Ok(LanguagePreference::English),
        "system" | "auto" => Ok(LanguagePreference::System),
        other => Err(format!("unsupported language '{other}'")),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    let mut cfg = settings::load(cli.config.as_deref())?;
    if let Some(lang) = cli.lang {
        cfg.language = lang;
    }
    let lang = cfg.language.resolve(sys_locale::get_locale().as_deref());

    match cli.command {
        Command::Diagnose {
            paths,
            recursive,
            max_images,
            model,
            uploads,
            parallel,
            json,
            csv,
        } => {
            if let Some(n) = max_images {
                cfg.max_images = n;
            }
            if let Some(path) = model {
                cfg.model_path = path;
            }
            if let Some(dir) = uploads {
                cfg.upload_dir = dir;
            }
            cfg.parallel |= parallel;
            cfg.validate()?;
            run_diagnose(&cfg, lang, &paths, recursive, json, csv)
        }
        Command::Care { label } => {
            let guide = care_guide(&label, lang);
            if guide.is_empty() {
                println!("{}: {label}", lang.tr("Sin información para", "No guidance for"));
            } else {
                print_guide(&guide, lang);
            }
            Ok(())
        }
        Command::Labels => {
            for (idx, label) in cfg.labels.iter().enumerate() {
                println!("{idx}\t{label}");
            }
            Ok(())
        }
    }
}

/// Constructed once; the classifier is shared read-only from here on.
fn load_classifier(cfg: &DiagnosisConfig) -> ClassifierService {
    #[cfg(feature = "ort")]
    {
        match palta_core::onnx::OnnxClassifier::new(&cfg.model_path) {
            Ok(model) => return ClassifierService::new(Arc::new(model), cfg.labels.clone()),
            Err(e) => tracing::warn!("model not loaded: {e:#}"),
        }
    }
    #[cfg(not(feature = "ort"))]
    tracing::warn!(
        "built without the `ort` feature; cannot load {}",
        cfg.model_path.display()
    );
    ClassifierService::unavailable(cfg.labels.clone())
}

/// Refuses before touching the upload directory when no model is loaded.
fn build_runner(service: &ClassifierService, cfg: &DiagnosisConfig) -> Result<BatchRunner> {
    service.require()?;
    let store = FsImageStore::new(&cfg.upload_dir)
        .with_context(|| format!("creating upload directory {}", cfg.upload_dir.display()))?;
    Ok(BatchRunner::new(service, Arc::new(store), cfg)?)
}

#[derive(Serialize)]
struct Report<'a> {
    analyzed_at: DateTime<Utc>,
    #[serde(flatten)]
    diagnosis: &'a Diagnosis,
}

fn run_diagnose(
    cfg: &DiagnosisConfig,
    lang: Language,
    paths: &[PathBuf],
    recursive: bool,
    json: bool,
    csv: Option<PathBuf>,
) -> Result<()> {
    let service = load_classifier(cfg);
    let runner = build_runner(&service, cfg)?;

    let files = input::collect_paths(paths, recursive)?;
    let uploads = input::read_uploads(&files);
    let diagnosis = diagnose(&runner, &uploads, lang)?;

    if let Some(path) = csv {
        export_csv(&diagnosis.results, &diagnosis.consensus, &path)
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::info!("CSV written: {}", path.display());
    }

    if json {
        let report = Report {
            analyzed_at: Utc::now(),
            diagnosis: &diagnosis,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_diagnosis(&diagnosis, lang);
    }
    Ok(())
}

fn print_diagnosis(d: &Diagnosis, lang: Language) {
    let c = &d.consensus;
    println!("{}", c.interpretation);
    println!();
    println!(
        "{}: {}  ({}: {:.2}%, {}: {})",
        lang.tr("Diagnóstico", "Diagnosis"),
        c.label,
        lang.tr("confianza", "confidence"),
        c.confidence_final,
        lang.tr("nivel", "level"),
        c.tier.name(lang)
    );
    println!(
        "{}: {:.2}%   {}: {}/{} ({:.2}%)",
        lang.tr("Promedio de probabilidades", "Mean probability"),
        c.raw_probability,
        lang.tr("Votos", "Votes"),
        c.votes,
        c.total_images,
        c.majority_percentage
    );
    if c.has_contradiction {
        println!();
        println!("{}:", lang.tr("Detalle por clase", "Breakdown by class"));
        for b in &c.breakdown {
            println!(
                "  {:<16} {:>2} ({:>5.1}%)  {:.2}%  [{}]",
                b.label,
                b.count,
                b.percentage,
                b.average_confidence,
                b.sources.join(", ")
            );
        }
    }
    if !d.skipped.is_empty() {
        println!();
        println!(
            "{}: {}",
            lang.tr("Imágenes omitidas", "Skipped images"),
            d.skipped.join(", ")
        );
    }
    println!();
    print_guide(&d.guide, lang);
}

fn print_guide(guide: &CareGuide, lang: Language) {
    if guide.is_empty() {
        return;
    }
    println!("{}", guide.description);
    println!();
    println!("{}: {}", lang.tr("Severidad", "Severity"), guide.severity);
    println!();
    println!("{}", guide.care_instructions);
    println!();
    println!("{}", guide.recommendations);
}
