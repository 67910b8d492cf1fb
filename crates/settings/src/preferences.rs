use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const FONT_SIZE_RANGE: (u32, u32) = (10, 28);
pub const TAB_SIZE_RANGE: (u32, u32) = (1, 8);

const DEFAULT_FONT_SIZE: u32 = 14;
const DEFAULT_TAB_SIZE: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(format!("unknown theme '{other}' (expected dark or light)")),
        }
    }
}

/// Editor appearance preferences, kept within documented ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_tab_size")]
    pub tab_size: u32,
}

fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}

fn default_tab_size() -> u32 {
    DEFAULT_TAB_SIZE
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            font_size: DEFAULT_FONT_SIZE,
            tab_size: DEFAULT_TAB_SIZE,
        }
    }
}

impl Preferences {
    pub fn sanitize(&mut self) {
        self.font_size = self.font_size.clamp(FONT_SIZE_RANGE.0, FONT_SIZE_RANGE.1);
        self.tab_size = self.tab_size.clamp(TAB_SIZE_RANGE.0, TAB_SIZE_RANGE.1);
    }
}
