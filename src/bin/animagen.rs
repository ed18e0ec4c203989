// animagen - generate anime-style art from a prompt and an optional reference image

use animagen::orchestration::image::default_file_name;
use animagen::orchestration::{AnalysisOutcome, PromptMerge};
use animagen::{AppConfig, Orchestrator};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Text prompt describing the image
    #[arg(short, long, default_value = "")]
    prompt: String,

    /// Reference image to upload
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// Describe the reference image and use the description as the prompt
    #[arg(short, long, requires = "reference")]
    analyze: bool,

    /// How the description is merged into the prompt: replace or append (overrides config)
    #[arg(long)]
    merge: Option<PromptMerge>,

    /// Save the generated image here (a directory gets a timestamped file name)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Service host (overrides config and ANIMAGEN_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(merge) = args.merge {
        config.analysis_merge = merge;
    }

    println!("🎨 animagen");
    println!("===========\n");
    println!("📡 Service host: {}\n", config.base_url);

    let orchestrator = Orchestrator::from_config(&config)?;
    orchestrator.set_prompt(args.prompt);

    if let Some(reference) = &args.reference {
        println!("📤 Uploading reference image {}...", reference.display());
        match orchestrator.upload_path(reference).await {
            Ok(url) => println!("✓ Reference uploaded: {}\n", url),
            Err(e) => eprintln!("❌ {}\n", e),
        }
    }

    if args.analyze {
        println!("🔍 Analyzing reference image...");
        match orchestrator.analyze().await {
            Ok(AnalysisOutcome::Applied(prompt)) => {
                println!("✓ Prompt from image:\n  {}\n", prompt)
            }
            Ok(AnalysisOutcome::NoDescription) => {
                println!("⚠ No description returned, prompt unchanged\n")
            }
            Ok(AnalysisOutcome::NoReference) => {
                println!("⚠ No reference image, skipping analysis\n")
            }
            Err(e) => eprintln!("❌ {}\n", e),
        }
    }

    if !orchestrator.snapshot().can_generate() {
        anyhow::bail!("A prompt is required: pass --prompt or --reference with --analyze");
    }

    println!("✨ Generating...");
    let image = orchestrator.generate().await?;
    if image.starts_with("data:") {
        println!("✓ Image generated (inline data, {} chars)\n", image.len());
    } else {
        println!("✓ Image generated: {}\n", image);
    }

    if let Some(output) = args.output {
        let path = if output.is_dir() { default_file_name(&output) } else { output };
        let written = orchestrator.save_result(&path).await?;
        println!("💾 Saved {} bytes to {}", written, path.display());
    }

    Ok(())
}
