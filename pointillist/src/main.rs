use anyhow::Context;
use clap::Parser;
use env_logger::{Builder, Env};
use log::{error, info};
use std::io::Write;

use pointillist::color_utils::{init_color_config, level_tag, symbols};
use pointillist::config::{DetectCommand, GlobalArgs, KeypointConfig};
use pointillist::model_access::WEIGHTS_NAME;
use pointillist::progress::suspend_progress;
use pointillist::{run_keypoint_batch, RunSummary};

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Extract SuperPoint keypoints from every image in a folder
    Detect(DetectCommand),

    /// Show version information
    Version,
}

#[derive(Parser)]
#[command(name = "pointillist")]
#[command(about = "SuperPoint keypoint extraction for image folders")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn get_log_level_from_verbosity(
    verbosity: &clap_verbosity_flag::Verbosity<clap_verbosity_flag::ErrorLevel>,
) -> log::LevelFilter {
    // clap-verbosity-flag cannot tell -q apart from the default, check it directly
    if verbosity.is_silent() {
        return log::LevelFilter::Error;
    }

    match verbosity.log_level_filter() {
        log::LevelFilter::Off => log::LevelFilter::Off,
        log::LevelFilter::Error => log::LevelFilter::Warn, // default
        log::LevelFilter::Warn => log::LevelFilter::Info, // -v
        log::LevelFilter::Info => log::LevelFilter::Debug, // -vv
        log::LevelFilter::Debug | log::LevelFilter::Trace => log::LevelFilter::Trace,
    }
}

fn init_logging(global: &GlobalArgs) {
    // Without -v/-q, an explicit RUST_LOG wins
    let use_env = !global.verbosity.is_present() && std::env::var_os("RUST_LOG").is_some();

    let mut logger = if use_env {
        Builder::from_env(Env::default())
    } else {
        let mut b = Builder::new();
        b.filter_level(get_log_level_from_verbosity(&global.verbosity));
        b
    };

    logger
        .format(|buf, record| {
            let line = format!("[{}] {}", level_tag(record.level()), record.args());
            suspend_progress(|| writeln!(buf, "{line}"))
        })
        .init();
}

fn report(summary: &RunSummary) {
    let mean = summary.mean_keypoints().unwrap_or(0.0);
    println!(
        "Processed {} of {} images, average {:.1} keypoints per image",
        summary.count(),
        summary.total_images(),
        mean
    );
    println!("Summary: {}", summary.summary_path.display());
}

fn run_detect(global: &GlobalArgs, detect: &DetectCommand) -> anyhow::Result<()> {
    info!(
        "{}Keypoint extraction: {} | size: {}x{} | keep: {} | device: {}",
        symbols::extraction_start(),
        detect.input_dir.display(),
        detect.size.0,
        detect.size.1,
        detect.keep_k_points,
        global.device
    );

    let config = KeypointConfig::from_args(global.clone(), detect.clone());
    let summary = run_keypoint_batch(&config).with_context(|| {
        format!(
            "keypoint extraction failed for {}",
            config.input_dir.display()
        )
    })?;

    report(&summary);
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    init_color_config(cli.global.no_color);
    init_logging(&cli.global);

    match &cli.command {
        Some(Commands::Detect(detect_cmd)) => {
            if let Err(e) = run_detect(&cli.global, detect_cmd) {
                error!("{} {e:#}", symbols::operation_failed());
                std::process::exit(1);
            }
        }
        Some(Commands::Version) => {
            println!("pointillist v{}", env!("CARGO_PKG_VERSION"));
            println!("Weights: {WEIGHTS_NAME}");
        }
        None => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            if let Err(e) = cmd.print_help() {
                error!("Failed to print help: {e}");
            }
        }
    }
}
