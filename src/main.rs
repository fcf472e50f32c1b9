use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shot_clips::remote::{StatsClient, StatsSource};
use shot_clips::video::TesseractRecognizer;
use shot_clips::{ClipExtractor, ClipRequest, Config, DatasetBuilder, DatasetSplitter, Normalizer, ShotTableBuilder};

#[derive(Parser)]
#[command(name = "shot-clips")]
#[command(version, about = "Build a labeled basketball shot-clip dataset")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to shot-clips.toml or config/shot-clips.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and cut every usable shot of one or more games
    Build {
        /// Game identifier, e.g. 0022300001
        #[arg(long = "game-id", required = true)]
        game_ids: Vec<String>,
    },
    /// Print the filtered shot table of a game as JSON
    Shots {
        #[arg(long = "game-id")]
        game_id: String,
    },
    /// Cut one clip around a scoreboard clock reading
    Cut {
        input: PathBuf,
        output: PathBuf,
        /// Play-by-play clock, MM:SS
        #[arg(long)]
        clock: String,
        #[arg(long)]
        before: Option<f64>,
        #[arg(long)]
        after: Option<f64>,
        #[command(flatten)]
        format: FormatArgs,
    },
    /// Re-encode a clip to a common size and frame rate
    Normalize {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        format: FormatArgs,
    },
    /// Split extracted clips into train/validation/test folders
    Split {
        /// Directory laid out as <category>/<event_id>/cut_video.avi
        root: PathBuf,
        /// Defaults to dataset.output_dir from the configuration
        output: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show the effective configuration
    Config,
}

#[derive(Args)]
struct FormatArgs {
    /// Output frame rate
    #[arg(long)]
    fps: Option<f64>,
    /// Output width, requires --height
    #[arg(long, requires = "height")]
    width: Option<i32>,
    /// Output height, requires --width
    #[arg(long, requires = "width")]
    height: Option<i32>,
}

impl FormatArgs {
    fn apply(&self, config: &mut Config) {
        if self.fps.is_some() {
            config.extraction.target_fps = self.fps;
        }
        if let (Some(width), Some(height)) = (self.width, self.height) {
            config.extraction.width = Some(width);
            config.extraction.height = Some(height);
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Ok(Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        })),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose {
        "shot_clips=debug,info"
    } else {
        "shot_clips=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Build { game_ids } => {
            info!("🚀 Shot Clips starting for {} game(s)", game_ids.len());
            info!("📂 Output directory: {}", config.output.base_dir.display());

            let start_time = std::time::Instant::now();
            let builder = DatasetBuilder::new(config)?;
            let reports = builder.process_games(&game_ids).await?;

            let written: usize = reports.iter().map(|r| r.written).sum();
            let skipped: usize = reports.iter().map(|r| r.skipped).sum();
            let failed: usize = reports.iter().map(|r| r.failed).sum();
            info!("🎉 Processing completed in {:.2}s", start_time.elapsed().as_secs_f64());
            info!("✅ Written: {}", written);
            info!("⚠️ Skipped: {}", skipped);
            info!("❌ Failed: {}", failed);
        }
        Commands::Shots { game_id } => {
            let client = StatsClient::new(&config.api)?;
            let events = client.play_by_play(&game_id).await?;
            let shots = ShotTableBuilder::new().build(&events)?;
            info!("🎯 {} usable shots out of {} events", shots.len(), events.len());
            println!("{}", serde_json::to_string_pretty(&shots)?);
        }
        Commands::Cut {
            input,
            output,
            clock,
            before,
            after,
            format,
        } => {
            format.apply(&mut config);
            if let Some(before) = before {
                config.extraction.seconds_before = before;
            }
            if let Some(after) = after {
                config.extraction.seconds_after = after;
            }
            config.validate()?;

            let target_clock = shot_clips::shift_clock(&clock, config.extraction.clock_offset_secs)?;
            let request = ClipRequest::new(input, output, target_clock)
                .with_window(config.extraction.seconds_before, config.extraction.seconds_after)
                .with_resolution(config.extraction.resolution())
                .with_target_fps(config.extraction.target_fps);

            let recognizer = TesseractRecognizer::from_config(&config.ocr)?;
            let extractor = ClipExtractor::new(config.extraction.min_duration_secs);
            let outcome = tokio::task::spawn_blocking(move || extractor.extract_file(&request, &recognizer)).await??;

            if !outcome.is_success() {
                return Err(anyhow!("No clip written: {:?}", outcome));
            }
            info!("✅ {:?}", outcome);
        }
        Commands::Normalize { input, output, format } => {
            format.apply(&mut config);
            config.validate()?;

            let resolution = config.extraction.resolution();
            let fps = config.extraction.target_fps;
            let normalizer = Normalizer::new(config.extraction.fps_tolerance);
            let outcome = tokio::task::spawn_blocking(move || {
                normalizer.normalize_file(&input, &output, resolution, fps)
            })
            .await??;

            if !outcome.is_success() {
                return Err(anyhow!("Normalization produced no output: {:?}", outcome));
            }
            info!("✅ {:?}", outcome);
        }
        Commands::Split { root, output, seed } => {
            let output = config.dataset.split_output(output);
            let splitter = DatasetSplitter::new(
                config.dataset.ratios(),
                seed.unwrap_or(config.dataset.seed),
            );
            let summary = splitter.split(&root, &output)?;
            let summary_path = output.join("split.json");
            tokio::fs::write(&summary_path, serde_json::to_string_pretty(&summary)?).await?;
            info!("💾 Split summary saved to: {}", summary_path.display());
        }
        Commands::Config => {
            println!("{}", config.summary());
            if let Err(e) = config.validate() {
                warn!("Configuration is invalid: {}", e);
            }
        }
    }

    Ok(())
}
