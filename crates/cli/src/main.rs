use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use recibo_core::{PipelineConfig, RegionSource};
use recibo_llm::OllamaClient;
use recibo_ocr::{HttpOcrEngine, HttpRegionDetector, OcrEngine};
use recibo_pipeline::{PipelineError, PipelineOutcome, ReceiptPipeline};

#[derive(Parser)]
#[command(name = "recibo")]
#[command(about = "Extract structured data from receipt images via OCR and a local LLM")]
#[command(version)]
struct Cli {
    /// Path to the receipt image (PNG/JPEG)
    image: PathBuf,

    /// TOML config file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where recognized text comes from
    #[arg(long, value_enum)]
    regions: Option<RegionsArg>,

    /// Directory for extracted JSON records
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Ollama model name (e.g. llama2:7b)
    #[arg(long)]
    model: Option<String>,

    /// Use the embedded Tesseract backend instead of the OCR sidecar
    #[cfg(feature = "tesseract")]
    #[arg(long)]
    tesseract: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RegionsArg {
    WholeImage,
    Layout,
    Object,
}

impl From<RegionsArg> for RegionSource {
    fn from(arg: RegionsArg) -> Self {
        match arg {
            RegionsArg::WholeImage => RegionSource::WholeImage,
            RegionsArg::Layout => RegionSource::Layout,
            RegionsArg::Object => RegionSource::Object,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    tracing::debug!("Effective config: {config:?}");
    println!("--- Processing receipt: {} ---", cli.image.display());

    let result = run(&cli, config).await;
    match result {
        Ok(outcome) => {
            println!("\n--- OCR Text Output ---");
            println!("{}", outcome.ocr_text);
            println!("\n--- Extracted Structured Data ---");
            match serde_json::to_string_pretty(&outcome.record) {
                Ok(pretty) => println!("{pretty}"),
                Err(e) => eprintln!("error rendering record: {e}"),
            }
            println!("\nSaved to {}", outcome.output_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let PipelineError::Extraction(inner) = &e {
                eprintln!("LLM raw output:\n{}", inner.raw);
            }
            eprintln!("error: {e}");
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Distinct exit codes per failure class, so scripts can tell a bad image
/// from a bad model response.
fn exit_code(err: &PipelineError) -> u8 {
    match err {
        PipelineError::ImageLoad(_) => 2,
        PipelineError::EmptyOcr => 3,
        PipelineError::Extraction(_) => 4,
        PipelineError::Model(_) => 5,
        _ => 1,
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(regions) = cli.regions {
        config.region_source = regions.into();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(model) = &cli.model {
        config.model.model = model.clone();
    }
    Ok(config)
}

async fn run(cli: &Cli, config: PipelineConfig) -> Result<PipelineOutcome, PipelineError> {
    #[cfg(feature = "tesseract")]
    if cli.tesseract {
        let engine = recibo_ocr::recognizer::tesseract_backend::TesseractEngine::new(
            None,
            &config.ocr.lang,
        );
        return run_with_engine(engine, &cli.image, config).await;
    }

    let engine = HttpOcrEngine::new(&config.ocr);
    run_with_engine(engine, &cli.image, config).await
}

async fn run_with_engine<E: OcrEngine>(
    engine: E,
    image: &std::path::Path,
    config: PipelineConfig,
) -> Result<PipelineOutcome, PipelineError> {
    let model = OllamaClient::new(&config.model).map_err(PipelineError::Model)?;
    let detector = match config.region_source {
        RegionSource::WholeImage => None,
        RegionSource::Layout | RegionSource::Object => {
            Some(HttpRegionDetector::new(&config.detector))
        }
    };
    let pipeline = ReceiptPipeline::new(engine, detector, model, config);
    pipeline.process(image).await
}
