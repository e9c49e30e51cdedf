//! Theme preference
//!
//! A dark/light choice stored in its own key-value slot, independent of the
//! session data. Read once at startup and written on every change.

use crate::error::Result;
use crate::session::{KeyValueStore, THEME_KEY};
use colored::{ColoredString, Colorize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Colour theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    /// Light text on a dark terminal
    #[default]
    Dark,
    /// Dark text on a light terminal
    Light,
}

impl Theme {
    /// The other theme
    pub fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    /// Persisted name of the theme
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    /// Palette used to render the transcript
    pub fn palette(self) -> Palette {
        Palette { theme: self }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            other => Err(format!("Unknown theme: {}", other)),
        }
    }
}

/// Colours for each kind of transcript line
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    theme: Theme,
}

impl Palette {
    /// Label for user messages
    pub fn user_label(&self, text: &str) -> ColoredString {
        match self.theme {
            Theme::Dark => text.cyan().bold(),
            Theme::Light => text.blue().bold(),
        }
    }

    /// Label for assistant messages
    pub fn assistant_label(&self, text: &str) -> ColoredString {
        match self.theme {
            Theme::Dark => text.green().bold(),
            Theme::Light => text.magenta().bold(),
        }
    }

    /// Assistant message body
    pub fn body(&self, text: &str) -> ColoredString {
        match self.theme {
            Theme::Dark => text.bright_white(),
            Theme::Light => text.black(),
        }
    }

    /// Secondary information such as ids and hints
    pub fn muted(&self, text: &str) -> ColoredString {
        match self.theme {
            Theme::Dark => text.bright_black(),
            Theme::Light => text.dimmed(),
        }
    }

    /// Inline notices and errors
    pub fn notice(&self, text: &str) -> ColoredString {
        text.yellow()
    }
}

/// The theme preference bound to its storage slot
pub struct ThemeSetting {
    backend: Arc<dyn KeyValueStore>,
    theme: Theme,
}

impl ThemeSetting {
    /// Load the stored preference, defaulting to dark
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use chatdeck::session::MemoryStore;
    /// use chatdeck::theme::{Theme, ThemeSetting};
    ///
    /// let backend = Arc::new(MemoryStore::new());
    /// let mut setting = ThemeSetting::load(backend.clone());
    /// assert_eq!(setting.theme(), Theme::Dark);
    ///
    /// setting.toggle().unwrap();
    /// assert_eq!(ThemeSetting::load(backend).theme(), Theme::Light);
    /// ```
    pub fn load(backend: Arc<dyn KeyValueStore>) -> Self {
        let theme = match backend.get(THEME_KEY) {
            Ok(Some(bytes)) => String::from_utf8_lossy(&bytes)
                .parse()
                .unwrap_or_else(|e| {
                    tracing::warn!("Ignoring stored theme: {}", e);
                    Theme::default()
                }),
            Ok(None) => Theme::default(),
            Err(e) => {
                tracing::warn!("Failed to read theme preference: {}", e);
                Theme::default()
            }
        };
        Self { backend, theme }
    }

    /// Current theme
    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// Change and persist the theme
    pub fn set(&mut self, theme: Theme) -> Result<()> {
        self.backend.put(THEME_KEY, theme.as_str().as_bytes())?;
        self.theme = theme;
        tracing::debug!("Theme set to {}", theme);
        Ok(())
    }

    /// Switch to the other theme and persist it
    pub fn toggle(&mut self) -> Result<Theme> {
        let next = self.theme.toggled();
        self.set(next)?;
        Ok(next)
    }
}
