use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, ErrorKind, Parser, Subcommand};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use montage::video::{Composer, SceneDetector};
use montage::{Config, Error};

#[derive(Debug, Subcommand)]
enum Commands {
    #[clap(after_help = "Displays info about montage and its dependencies.")]
    Info,

    #[clap(
        arg_required_else_help = true,
        after_help = "Analyze one or more videos for scene transitions. Each config file drives one independent detection run: the input video is decoded frame by frame, adjacent frames are compared by color histogram correlation, and cuts are written to a timestamps YAML file alongside a processed copy of the video. The timestamps file is the input to the 'compose' command."
    )]
    Detect {
        #[clap(
            short,
            long = "config",
            required = true,
            multiple_values = true,
            value_parser = clap::value_parser!(PathBuf),
            help = "YAML config file(s) with a scene_detection section, one per run."
        )]
        configs: Vec<PathBuf>,
    },

    #[clap(
        arg_required_else_help = true,
        after_help = "Assemble a highlight reel from a timestamps file produced by 'detect'. Segment durations are taken from the gaps between consecutive timestamps; each segment is cut at a random, non-overlapping offset from a randomly chosen video in the source pool."
    )]
    Compose {
        #[clap(
            short,
            long = "config",
            value_parser = clap::value_parser!(PathBuf),
            help = "YAML config file with a composition section."
        )]
        config: PathBuf,

        #[clap(
            required = true,
            value_parser = clap::value_parser!(PathBuf),
            help = "Timestamps YAML file produced by the 'detect' command."
        )]
        timeline: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(
        long,
        global = true,
        default_value = "false",
        action(ArgAction::SetTrue),
        help = "By default, video files are validated using FFmpeg, which is extremely accurate. Setting this flag will switch to just checking file headers."
    )]
    file_headers_only: bool,
}

impl Cli {
    fn validate(&self) {
        let mut cmd = Cli::command();
        let configs: Vec<&PathBuf> = match &self.command {
            Commands::Info => Vec::new(),
            Commands::Detect { configs } => configs.iter().collect(),
            Commands::Compose { config, .. } => vec![config],
        };
        for config in configs {
            if !config.is_file() {
                cmd.error(
                    ErrorKind::InvalidValue,
                    format!("config file not found: {}", config.display()),
                )
                .exit();
            }
        }
    }
}

// Maps an error onto the user-facing failure categories.
fn report_failure(e: &Error) {
    match e {
        Error::InputNotFound(_) | Error::TimelineNotFound(_) | Error::EmptySourcePool(_) => {
            eprintln!("File error: {}", e)
        }
        Error::Config(_) => eprintln!("Configuration error: {}", e),
        Error::MissingVideoStream(_)
        | Error::OutputInit(_)
        | Error::TimelineTooShort(_)
        | Error::ClipExtraction(_)
        | Error::FFmpegError(_) => eprintln!("Processing error: {}", e),
        _ => eprintln!("Unexpected error: {}", e),
    }
}

fn detect_one(config_path: &PathBuf) -> montage::Result<()> {
    println!("Loading configuration from: {}", config_path.display());
    let config = Config::load(config_path)?;
    let detection = config.scene_detection.ok_or_else(|| {
        Error::Config(format!(
            "{}: no scene_detection section",
            config_path.display()
        ))
    })?;

    let detector = SceneDetector::new(detection)?;
    let report = detector.run()?;

    println!("Detection completed successfully!");
    println!(" - Detected events: {}", report.timeline.timestamps.len());
    println!(" - Output video: {}", report.output_path.display());
    println!(" - Timestamps file: {}", report.timeline_path.display());
    if report.frames_skipped > 0 {
        println!(" - Skipped corrupt frames: {}", report.frames_skipped);
    }
    Ok(())
}

fn compose(config_path: &PathBuf, timeline: &PathBuf, full_validation: bool) -> montage::Result<()> {
    println!("Loading configuration from: {}", config_path.display());
    let config = Config::load(config_path)?;
    let composition = config.composition.ok_or_else(|| {
        Error::Config(format!(
            "{}: no composition section",
            config_path.display()
        ))
    })?;

    let composer = Composer::new(composition)?.with_full_validation(full_validation);
    let report = composer.run(timeline)?;

    println!("Composition completed successfully!");
    println!(" - Placed clips: {}", report.clips.len());
    println!(" - Output video: {}", report.output_path.display());
    println!(" - Manifest file: {}", report.manifest_path.display());
    Ok(())
}

fn main() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    ffmpeg_next::init().unwrap();

    let args = Cli::parse();
    args.validate();

    let results: Vec<montage::Result<()>> = match &args.command {
        Commands::Detect { configs } => {
            // Detection runs are independent; fan them out when rayon is enabled.
            #[cfg(feature = "rayon")]
            let results = configs.par_iter().map(detect_one).collect();
            #[cfg(not(feature = "rayon"))]
            let results = configs.iter().map(detect_one).collect();
            results
        }
        Commands::Compose { config, timeline } => {
            vec![compose(config, timeline, !args.file_headers_only)]
        }
        Commands::Info => {
            println!("FFmpeg version: {}", montage::util::ffmpeg_version_string());
            Vec::new()
        }
    };

    let mut failed = false;
    for result in &results {
        if let Err(e) = result {
            report_failure(e);
            failed = true;
        }
    }
    if failed {
        std::process::exit(1);
    }
}
