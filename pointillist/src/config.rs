//! Configuration layer separating CLI arguments from the internal run configuration.
//!
//! - `GlobalArgs`: options shared by every subcommand
//! - `DetectCommand`: arguments of `pointillist detect`
//! - `KeypointConfig`: what the batch runner actually consumes

use clap::Parser;
use clap_verbosity_flag::Verbosity;
use serde::Serialize;
use std::path::PathBuf;

pub const DEFAULT_IMAGE_SIZE: (u32, u32) = (640, 480);
pub const DEFAULT_KEEP_K_POINTS: usize = 1000;
pub const DEFAULT_OUTPUT_DIR: &str = "keypoints_output";

/// Parse an image size like "640x480" into (width, height)
pub fn parse_image_size(s: &str) -> Result<(u32, u32), String> {
    let (width, height) = s
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("Size must be in format 'WIDTHxHEIGHT' (e.g., '640x480'), got '{s}'"))?;

    let parse_dim = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|_| format!("Invalid size component: '{part}'"))
    };
    let (width, height) = (parse_dim(width)?, parse_dim(height)?);

    if width == 0 || height == 0 {
        return Err(format!("Size must be non-zero, got {width}x{height}"));
    }

    Ok((width, height))
}

/// Global CLI arguments that apply to all pointillist commands
#[derive(Parser, Debug, Clone)]
pub struct GlobalArgs {
    /// Verbosity level (-q/--quiet, -v/-vv/-vvv/-vvvv for info/debug/trace)
    #[command(flatten)]
    pub verbosity: Verbosity,

    /// Device to use for inference (auto, cpu, coreml)
    #[arg(long, default_value = "auto", global = true)]
    pub device: String,

    /// Disable colored output (also respects NO_COLOR and POINTILLIST_NO_COLOR env vars)
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// CLI command for keypoint extraction (only command-specific arguments)
#[derive(Parser, Debug, Clone)]
pub struct DetectCommand {
    /// Folder of input images (jpg, jpeg, png, bmp)
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// SuperPoint weights: a directory named sp_v6 holding model.onnx, or a file named sp_v6.onnx
    #[arg(long, value_name = "PATH")]
    pub weights: PathBuf,

    /// Output folder for tables, overlays and the run summary
    #[arg(long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Size images are resized to before inference, as WIDTHxHEIGHT
    #[arg(long, default_value = "640x480", value_parser = parse_image_size)]
    pub size: (u32, u32),

    /// Maximum number of keypoints kept per image
    #[arg(short = 'k', long, default_value_t = DEFAULT_KEEP_K_POINTS)]
    pub keep_k_points: usize,

    /// Also write processing_summary.toml with run metadata
    #[arg(long)]
    pub metadata: bool,
}

/// Internal configuration for a keypoint extraction run
#[derive(Debug, Clone, Serialize)]
pub struct KeypointConfig {
    pub input_dir: PathBuf,
    pub weights: PathBuf,
    pub output_dir: PathBuf,
    pub image_width: u32,
    pub image_height: u32,
    pub keep_k_points: usize,
    pub device: String,
    #[serde(skip)]
    pub write_metadata: bool,
}

impl KeypointConfig {
    /// Configuration with default size, keypoint budget and device.
    pub fn new(
        input_dir: impl Into<PathBuf>,
        weights: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let (image_width, image_height) = DEFAULT_IMAGE_SIZE;
        Self {
            input_dir: input_dir.into(),
            weights: weights.into(),
            output_dir: output_dir.into(),
            image_width,
            image_height,
            keep_k_points: DEFAULT_KEEP_K_POINTS,
            device: "auto".to_string(),
            write_metadata: false,
        }
    }

    /// Create configuration from global args and command-specific args
    pub fn from_args(global: GlobalArgs, cmd: DetectCommand) -> Self {
        let (image_width, image_height) = cmd.size;
        Self {
            input_dir: cmd.input_dir,
            weights: cmd.weights,
            output_dir: cmd.output_dir,
            image_width,
            image_height,
            keep_k_points: cmd.keep_k_points,
            device: global.device,
            write_metadata: cmd.metadata,
        }
    }

    /// Target (width, height) for preprocessing
    pub fn image_size(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global_args() -> GlobalArgs {
        GlobalArgs {
            verbosity: Verbosity::new(0, 0),
            device: "cpu".to_string(),
            no_color: false,
        }
    }

    #[test]
    fn test_detect_command_conversion() {
        let cmd = DetectCommand {
            input_dir: PathBuf::from("frames"),
            weights: PathBuf::from("saved_models/sp_v6"),
            output_dir: PathBuf::from("out"),
            size: (320, 240),
            keep_k_points: 250,
            metadata: true,
        };

        let config = KeypointConfig::from_args(global_args(), cmd);

        assert_eq!(config.input_dir, PathBuf::from("frames"));
        assert_eq!(config.weights, PathBuf::from("saved_models/sp_v6"));
        assert_eq!(config.image_size(), (320, 240));
        assert_eq!(config.keep_k_points, 250);
        assert_eq!(config.device, "cpu");
        assert!(config.write_metadata);
    }

    #[test]
    fn test_defaults() {
        let config = KeypointConfig::new("in", "sp_v6", "out");
        assert_eq!(config.image_size(), (640, 480));
        assert_eq!(config.keep_k_points, 1000);
        assert_eq!(config.device, "auto");
        assert!(!config.write_metadata);
    }

    #[test]
    fn test_parse_image_size() {
        assert_eq!(parse_image_size("640x480"), Ok((640, 480)));
        assert_eq!(parse_image_size("320X240"), Ok((320, 240)));
        assert_eq!(parse_image_size(" 64 x 48 "), Ok((64, 48)));

        assert!(parse_image_size("640").is_err());
        assert!(parse_image_size("640x").is_err());
        assert!(parse_image_size("0x480").is_err());
        assert!(parse_image_size("-1x480").is_err());
        assert!(parse_image_size("widexhigh").is_err());
    }

    #[test]
    fn test_cli_parses_detect_arguments() {
        #[derive(Parser)]
        struct TestCli {
            #[command(flatten)]
            global: GlobalArgs,
            #[command(flatten)]
            detect: DetectCommand,
        }

        let cli = TestCli::parse_from([
            "pointillist",
            "frames",
            "--weights",
            "models/sp_v6.onnx",
            "--size",
            "160x120",
            "-k",
            "50",
            "--device",
            "cpu",
        ]);
        let config = KeypointConfig::from_args(cli.global, cli.detect);

        assert_eq!(config.image_size(), (160, 120));
        assert_eq!(config.keep_k_points, 50);
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(config.device, "cpu");
    }
}
