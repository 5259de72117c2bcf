//! Color and styling utilities with support for NO_COLOR and TERM environment variables.
//!
//! Colors are turned off by any of:
//! - `--no-color` CLI flag
//! - `NO_COLOR` environment variable (https://no-color.org/)
//! - `POINTILLIST_NO_COLOR` environment variable
//! - `TERM=dumb`
//! - stderr not being a TTY

use colored::{ColoredString, Colorize};
use log::Level;
use std::io::{stderr, IsTerminal};
use std::sync::OnceLock;

static COLOR_CONFIG: OnceLock<ColorConfig> = OnceLock::new();

/// Check environment variables and TTY state for color support.
/// `var` looks up one environment variable by name.
fn should_disable_colors<V>(var: V, stderr_is_terminal: bool) -> bool
where
    V: Fn(&str) -> Option<String>,
{
    let set = |name: &str| var(name).is_some_and(|value| !value.is_empty());

    set("NO_COLOR")
        || set("POINTILLIST_NO_COLOR")
        || var("TERM").as_deref() == Some("dumb")
        // log messages go to stderr
        || !stderr_is_terminal
}

fn should_disable_colors_from_env() -> bool {
    should_disable_colors(|name| std::env::var(name).ok(), stderr().is_terminal())
}

#[derive(Debug, Clone)]
struct ColorConfig {
    colors_enabled: bool,
}

impl ColorConfig {
    fn new(no_color_flag: bool) -> Self {
        Self::with_env_disabled(no_color_flag, should_disable_colors_from_env())
    }

    fn with_env_disabled(no_color_flag: bool, env_disabled: bool) -> Self {
        Self {
            colors_enabled: !no_color_flag && !env_disabled,
        }
    }
}

/// Initialize the color configuration with the CLI flag state.
/// Call once at startup, after parsing CLI arguments.
pub fn init_color_config(no_color_flag: bool) {
    let config = ColorConfig::new(no_color_flag);
    if COLOR_CONFIG.set(config).is_err() {
        log::debug!("Color configuration already initialized");
    }
}

/// Whether stderr output should be colored
pub fn colors_enabled() -> bool {
    COLOR_CONFIG
        .get()
        .map(|config| config.colors_enabled)
        .unwrap_or_else(|| !should_disable_colors_from_env())
}

/// Apply color to a string only if colors are enabled for stderr output
pub fn maybe_color_stderr<F>(text: &str, color_fn: F) -> String
where
    F: FnOnce(&str) -> ColoredString,
{
    if colors_enabled() {
        color_fn(text).to_string()
    } else {
        text.to_string()
    }
}

/// Colored level tag for log lines, e.g. `WARN` in yellow.
pub fn level_tag(level: Level) -> String {
    match level {
        Level::Error => maybe_color_stderr("ERROR", |s| s.red().bold()),
        Level::Warn => maybe_color_stderr("WARN", |s| s.yellow()),
        Level::Info => maybe_color_stderr("INFO", |s| s.green()),
        Level::Debug => maybe_color_stderr("DEBUG", |s| s.blue()),
        Level::Trace => maybe_color_stderr("TRACE", |s| s.magenta()),
    }
}

/// Semantic symbols for different operation types and states
pub mod symbols {
    use super::colors_enabled;

    fn pick(symbol: &'static str, plain: &'static str) -> &'static str {
        if colors_enabled() {
            symbol
        } else {
            plain
        }
    }

    pub fn model_loaded() -> &'static str {
        pick("✅ ", "")
    }

    /// Symbol for starting a keypoint extraction run
    pub fn extraction_start() -> &'static str {
        pick("🔍 ", "")
    }

    /// Symbol for operation failures
    pub fn operation_failed() -> &'static str {
        pick("❌", "[FAILED]")
    }

    /// Symbol for technical setup and configuration
    pub fn system_setup() -> &'static str {
        pick("⚙️ ", "")
    }

    /// Symbol for finding/targeting resources
    pub fn resources_found() -> &'static str {
        pick("🎯", "")
    }

    /// Symbol for successful completion
    pub fn completed_successfully() -> &'static str {
        pick("✅", "[SUCCESS]")
    }

    /// Symbol for partial success (some successes, some failures)
    pub fn completed_partially_successfully() -> &'static str {
        pick("⚠️ ", "[PARTIAL-SUCCESS] ")
    }

    pub fn warning() -> &'static str {
        pick("⚠️ ", "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| {
            vars.iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn test_color_config_respects_no_color_flag() {
        let config = ColorConfig::with_env_disabled(true, false);
        assert!(!config.colors_enabled);
        assert!(ColorConfig::with_env_disabled(false, false).colors_enabled);
    }

    #[test]
    fn test_interactive_terminal_keeps_colors() {
        assert!(!should_disable_colors(env(&[("TERM", "xterm-256color")]), true));
        assert!(!should_disable_colors(env(&[("NO_COLOR", "")]), true));
    }

    #[test]
    fn test_no_color_env_disables_colors() {
        assert!(should_disable_colors(env(&[("NO_COLOR", "1")]), true));
    }

    #[test]
    fn test_pointillist_no_color_env_disables_colors() {
        assert!(should_disable_colors(
            env(&[("POINTILLIST_NO_COLOR", "1")]),
            true
        ));
    }

    #[test]
    fn test_dumb_terminal_and_pipes_disable_colors() {
        assert!(should_disable_colors(env(&[("TERM", "dumb")]), true));
        assert!(should_disable_colors(env(&[]), false));
    }

    #[test]
    fn test_plain_output_when_colors_disabled() {
        COLOR_CONFIG
            .set(ColorConfig {
                colors_enabled: false,
            })
            .ok();

        if !colors_enabled() {
            assert_eq!(maybe_color_stderr("test", |s| s.red()), "test");
            assert_eq!(level_tag(Level::Warn), "WARN");
            assert_eq!(symbols::operation_failed(), "[FAILED]");
        }
    }
}
