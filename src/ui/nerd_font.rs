/// Icons used in backgrounder's terminal output.
///
/// Requires a nerd font in the terminal; JSON output carries the same glyphs
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NerdFont {
    Check,
    CrossCircle,
    Warning,
    Info,
    Image,
    Desktop,
    Gear,
    Lock,
    Undo,
}

impl NerdFont {
    pub const fn unicode(&self) -> char {
        match self {
            Self::Check => '\u{f00c}',       // fa-check
            Self::CrossCircle => '\u{f057}', // fa-times-circle
            Self::Warning => '\u{f071}',     // fa-exclamation-triangle
            Self::Info => '\u{f05a}',        // fa-info-circle
            Self::Image => '\u{f03e}',       // fa-image
            Self::Desktop => '\u{f108}',     // fa-desktop
            Self::Gear => '\u{f013}',        // fa-gear
            Self::Lock => '\u{f023}',        // fa-lock
            Self::Undo => '\u{f0e2}',        // fa-undo
        }
    }
}

impl From<NerdFont> for char {
    fn from(icon: NerdFont) -> Self {
        icon.unicode()
    }
}
