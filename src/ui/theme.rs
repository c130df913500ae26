//! Terminal colors for human output

use owo_colors::{OwoColorize, Style};
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// What a piece of text is, as far as coloring goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Banner title
    Title,
    /// Section heading, e.g. "Review"
    Heading,
    /// Left column of a summary row
    Label,
    /// Secondary text such as the database location
    Muted,
    /// Confirmation of a completed write
    Done,
}

#[derive(Debug, Clone, Copy)]
pub struct Theme {
    colors: bool,
}

impl Theme {
    /// Colors only on an interactive stdout, and never when `NO_COLOR` is set
    pub fn detect() -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        Self {
            colors: !no_color && console::Term::stdout().is_term(),
        }
    }

    pub fn plain() -> Self {
        Self { colors: false }
    }

    pub fn colored() -> Self {
        Self { colors: true }
    }

    pub fn style(&self, role: Role) -> Style {
        if !self.colors {
            return Style::new();
        }
        match role {
            Role::Title => Style::new().bright_red().bold(),
            Role::Heading => Style::new().yellow().bold(),
            Role::Label => Style::new().bright_black(),
            Role::Muted => Style::new().dimmed().italic(),
            Role::Done => Style::new().green(),
        }
    }

    pub fn paint(&self, role: Role, text: &str) -> String {
        text.style(self.style(role)).to_string()
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
