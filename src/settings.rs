use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::agent::{DecisionSettings, FallbackPolicy, LoopConfig, StoryBounds};
use crate::coords::ScreenSize;
use crate::input::InputTiming;
use crate::overlay::{HudConfig, MarkerConfig};

pub const DEFAULT_SETTINGS_PATH: &str = "settings.json";
pub const DEFAULT_HUD_TEXT: &str = "I am FRANZ.

I use my curiosity, pain, and boredom to decide what to do next.
NEVER CLOSE the CYAN window, its your own existence you have.

I am looking for some task to do, when I decide to do it, i will keep my focus on completing it in the best of my abilities using my capabilities as computer control AI
";

/// Size of the image sent to the decision service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Low,
    Med,
    #[default]
    High,
}

impl Resolution {
    pub fn size(self) -> ScreenSize {
        match self {
            Resolution::Low => ScreenSize::new(512, 288),
            Resolution::Med => ScreenSize::new(1024, 576),
            Resolution::High => ScreenSize::new(1536, 864),
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Low => write!(f, "low"),
            Resolution::Med => write!(f, "med"),
            Resolution::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Endpoint, model, prompts and sampling for the decision service.
    #[serde(default)]
    pub decision: DecisionSettings,
    #[serde(default)]
    pub resolution: Resolution,
    /// Use the scripted decider instead of the HTTP service.
    #[serde(default)]
    pub test_mode: bool,
    /// Run against the in-memory platform.
    #[serde(default)]
    pub headless: bool,
    /// Root for per-run screenshots and the execution log. `None` disables it.
    #[serde(default = "default_dump_dir")]
    pub dump_dir: Option<String>,
    /// Open the HUD paused so the opening story can be edited first.
    #[serde(default = "default_start_paused")]
    pub start_paused: bool,
    #[serde(default = "default_initial_story")]
    pub initial_story: String,
    #[serde(default)]
    pub hud: HudConfig,
    #[serde(default)]
    pub markers: MarkerConfig,
    #[serde(default = "default_story_min")]
    pub story_min: usize,
    #[serde(default = "default_story_max")]
    pub story_max: usize,
    #[serde(default)]
    pub fallback: FallbackPolicy,
    /// Pause after each routed step, in milliseconds.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub max_steps: Option<u64>,
    #[serde(default)]
    pub input: InputTiming,
    /// When enabled the application initialises the logger at debug level.
    #[serde(default)]
    pub debug_logging: bool,
    #[serde(default)]
    pub log_file: Option<String>,
}

fn default_dump_dir() -> Option<String> {
    Some("dump".into())
}

fn default_start_paused() -> bool {
    true
}

fn default_initial_story() -> String {
    DEFAULT_HUD_TEXT.to_string()
}

fn default_story_min() -> usize {
    StoryBounds::default().min
}

fn default_story_max() -> usize {
    StoryBounds::default().max
}

fn default_settle_ms() -> u64 {
    300
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            decision: DecisionSettings::default(),
            resolution: Resolution::default(),
            test_mode: false,
            headless: false,
            dump_dir: default_dump_dir(),
            start_paused: default_start_paused(),
            initial_story: default_initial_story(),
            hud: HudConfig::default(),
            markers: MarkerConfig::default(),
            story_min: default_story_min(),
            story_max: default_story_max(),
            fallback: FallbackPolicy::default(),
            settle_ms: default_settle_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            max_steps: None,
            input: InputTiming::default(),
            debug_logging: false,
            log_file: None,
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn story_bounds(&self) -> StoryBounds {
        let min = self.story_min;
        StoryBounds {
            min,
            max: self.story_max.max(min).max(1),
        }
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            target: self.resolution.size(),
            settle: Duration::from_millis(self.settle_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            fallback: self.fallback.clone(),
            max_steps: self.max_steps,
        }
    }
}

/// Command-line switches, read once at start-up.
#[derive(Parser, Debug, Clone, Default, PartialEq, Eq)]
#[command(name = "franz", about = "Autonomous desktop-control agent with an operator HUD")]
pub struct CliArgs {
    /// Use scripted decisions instead of the decision service.
    #[arg(long, action = ArgAction::SetTrue)]
    pub test: bool,
    /// Run against the in-memory platform.
    #[arg(long, action = ArgAction::SetTrue)]
    pub headless: bool,
    /// Size of the image sent to the decision service.
    #[arg(long = "res", value_enum)]
    pub resolution: Option<Resolution>,
    /// Settings file to load.
    #[arg(long = "settings", value_name = "PATH")]
    pub settings_path: Option<String>,
}

impl CliArgs {
    pub fn settings_path(&self) -> &str {
        self.settings_path.as_deref().unwrap_or(DEFAULT_SETTINGS_PATH)
    }

    /// Command-line switches win over the settings file.
    pub fn apply(&self, settings: &mut Settings) {
        if self.test {
            settings.test_mode = true;
        }
        if self.headless {
            settings.headless = true;
        }
        if let Some(res) = self.resolution {
            settings.resolution = res;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_presets() {
        assert_eq!(Resolution::Low.size(), ScreenSize::new(512, 288));
        assert_eq!(Resolution::Med.size(), ScreenSize::new(1024, 576));
        assert_eq!(Resolution::default().size(), ScreenSize::new(1536, 864));
    }

    #[test]
    fn cli_flags() {
        let args =
            CliArgs::try_parse_from(["franz", "--test", "--res", "low", "--settings=alt.json"])
                .unwrap();
        assert!(args.test && !args.headless);
        assert_eq!(args.resolution, Some(Resolution::Low));
        assert_eq!(args.settings_path(), "alt.json");

        let mut settings = Settings::default();
        args.apply(&mut settings);
        assert!(settings.test_mode);
        assert_eq!(settings.resolution, Resolution::Low);
    }

    #[test]
    fn cli_rejects_bad_input() {
        assert!(CliArgs::try_parse_from(["franz", "--res"]).is_err());
        assert!(CliArgs::try_parse_from(["franz", "--res", "huge"]).is_err());
        assert!(CliArgs::try_parse_from(["franz", "--verbose"]).is_err());
        let defaults = CliArgs::try_parse_from(["franz"]).unwrap();
        assert_eq!(defaults, CliArgs::default());
        assert_eq!(defaults.settings_path(), DEFAULT_SETTINGS_PATH);
    }

    #[test]
    fn cli_resolution_values() {
        for (value, expected) in [
            ("low", Resolution::Low),
            ("med", Resolution::Med),
            ("high", Resolution::High),
        ] {
            let args = CliArgs::try_parse_from(["franz", "--res", value]).unwrap();
            assert_eq!(args.resolution, Some(expected));
        }
        let args = CliArgs::try_parse_from(["franz", "--res=med", "--headless"]).unwrap();
        assert_eq!(args.resolution, Some(Resolution::Med));
        assert!(args.headless);
    }

    #[test]
    fn story_bounds_stay_ordered() {
        let settings = Settings {
            story_min: 300,
            story_max: 100,
            ..Settings::default()
        };
        assert_eq!(settings.story_bounds(), StoryBounds { min: 300, max: 300 });
    }

    #[test]
    fn loop_config_from_settings() {
        let cfg = Settings::default().loop_config();
        assert_eq!(cfg.settle, Duration::from_millis(300));
        assert_eq!(cfg.retry_delay, Duration::from_secs(1));
        assert!(cfg.fallback.attend_on_injection_failure);
        assert!(!cfg.fallback.attend_on_decision_failure);
    }
}
