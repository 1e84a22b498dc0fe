use anyhow::{bail, Context};
use clap::Parser;
use log::info;
use smsguard::{ArtifactStore, ClassifierError, DetectorService, InferenceResult, SpamDetector};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::Instant;

const HAM_EXAMPLES: [&str; 3] = ["Hey, are you free?", "Meeting at 3 PM", "Mom: Coming home?"];
const SPAM_EXAMPLES: [&str; 3] = ["You won £1000!", "URGENT: Verify now", "FREE money!"];
const SCORE_BAR_WIDTH: usize = 30;

#[derive(Parser)]
#[command(author, version, about = "SMS spam detection", long_about = None)]
struct Args {
    /// Message to analyze. Without one, messages are read from stdin, one per line
    message: Option<String>,

    /// Directory holding vectorizer.json and spam_model.json
    /// (defaults to $SMSGUARD_ARTIFACTS, then the user data directory)
    #[arg(short, long)]
    artifacts: Option<PathBuf>,

    /// Vectorizer artifact, overrides the one in the artifacts directory
    #[arg(long)]
    vectorizer: Option<PathBuf>,

    /// Classifier artifact (.json dense network or .onnx graph)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Spam probability above which a message is flagged
    #[arg(short, long, default_value_t = smsguard::SPAM_THRESHOLD)]
    threshold: f32,

    /// Classify the built-in ham and spam examples
    #[arg(short, long)]
    examples: bool,

    /// Print information about the loaded artifacts
    #[arg(long)]
    info: bool,

    /// Record SHA-256 checksums of the artifacts directory in manifest.json and exit
    #[arg(long)]
    write_manifest: bool,
}

fn load_detector(args: &Args, store: &ArtifactStore) -> Result<SpamDetector, ClassifierError> {
    let builder = SpamDetector::builder().with_threshold(args.threshold)?;
    let builder = match (&args.vectorizer, &args.model) {
        (None, None) => builder.with_store(store)?,
        (vectorizer, model) => builder
            .with_vectorizer(vectorizer.clone().unwrap_or_else(|| store.vectorizer_path()))?
            .with_model(model.clone().unwrap_or_else(|| store.model_path()))?,
    };
    builder.build()
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let store = ArtifactStore::new(
        args.artifacts
            .clone()
            .unwrap_or_else(ArtifactStore::get_default_artifacts_dir),
    );

    if args.write_manifest {
        let manifest = store
            .write_manifest()
            .with_context(|| format!("Failed to write manifest in {:?}", store.root()))?;
        for (file, hash) in &manifest.files {
            println!("{}  {}", hash, file);
        }
        return Ok(());
    }

    info!("=== Starting SMS Spam Detector ===");
    let start_time = Instant::now();
    let service = DetectorService::new().load_with(|| load_detector(&args, &store));

    if let Some(err) = service.failure() {
        eprintln!("❌ Model not loaded: {}", err);
        eprintln!("Analysis is disabled. Consider:");
        eprintln!("  - Checking that {:?} contains vectorizer.json and spam_model.json", store.root());
        eprintln!("  - Pointing --artifacts or $SMSGUARD_ARTIFACTS at the right directory");
        eprintln!("  - Using a vectorizer and model produced by the same training run");
        bail!("artifacts failed to load");
    }
    info!("Artifacts loaded in {:.2?}", start_time.elapsed());

    if args.info {
        if let Some(detector) = service.detector() {
            let info = detector.info();
            println!("📈 Model Stats");
            println!("  Vectorizer: {}", info.vectorizer_path.display());
            if let Some(model_path) = &info.model_path {
                println!("  Model: {}", model_path.display());
            }
            println!("  Scorer: {}", info.scorer);
            println!("  Vocabulary size: {}", info.vocabulary_size);
            println!("  Threshold: {}", info.threshold);
        }
    }

    if args.examples {
        println!("📝 Examples");
        println!("\n✅ HAM");
        for text in HAM_EXAMPLES {
            analyze(&service, text)?;
        }
        println!("\n🚨 SPAM");
        for text in SPAM_EXAMPLES {
            analyze(&service, text)?;
        }
        return Ok(());
    }

    match &args.message {
        Some(text) => analyze(&service, text)?,
        None => {
            if args.info {
                return Ok(());
            }
            info!("Reading messages from stdin, one per line");
            for line in io::stdin().lock().lines() {
                let line = line.context("Failed to read from stdin")?;
                analyze(&service, &line)?;
            }
        }
    }

    Ok(())
}

fn analyze(service: &DetectorService, text: &str) -> anyhow::Result<()> {
    if text.trim().is_empty() {
        println!("⚠️ Please enter a message!");
        return Ok(());
    }

    println!("\n🔍 {}", text);
    let result = service
        .classify(text)
        .with_context(|| format!("Failed to classify {:?}", text))?;
    render(&result);
    Ok(())
}

fn render(result: &InferenceResult) {
    if result.is_spam {
        println!("🚨 SPAM DETECTED");
        println!("Spam Confidence: {:.1}%", result.probability * 100.0);
        println!("⚠️ Warning:");
        println!("  - May be fraudulent");
        println!("  - Don't click links");
        println!("  - Don't share personal info");
    } else {
        println!("✅ LEGITIMATE MESSAGE");
        println!("Ham Confidence: {:.1}%", (1.0 - result.probability) * 100.0);
        println!("✓ Safe message");
    }
    println!(
        "Spam Score: [{}] {:.1}%",
        score_bar(result.probability, SCORE_BAR_WIDTH),
        result.probability * 100.0
    );
}

fn score_bar(probability: f32, width: usize) -> String {
    let filled = ((probability.clamp(0.0, 1.0) * width as f32).round() as usize).min(width);
    format!("{}{}", "#".repeat(filled), "-".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bar() {
        assert_eq!(score_bar(0.0, 4), "----");
        assert_eq!(score_bar(0.5, 4), "##--");
        assert_eq!(score_bar(1.0, 4), "####");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["smsguard", "--threshold", "0.7", "-e", "hello"]);
        assert_eq!(args.threshold, 0.7);
        assert!(args.examples);
        assert_eq!(args.message.as_deref(), Some("hello"));
    }
}
