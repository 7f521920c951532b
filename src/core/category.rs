//! File category definitions.

/// Kind of script file, determines whether the source transform runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    /// Base-language script (.js) - passed through verbatim
    Plain,
    /// Strict-superset script (.ts) - stripped down to the base language
    Typed,
}

/// Category of a logical file, determines compilation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    /// Style sheet (.css) - copied verbatim into the style output
    Style,
    /// Script module (.js/.ts) - written to both client and SSR slots
    Script(ScriptKind),
    /// Structured data (.json) - re-emitted as a default-export module
    Data,
    /// Single-file component (.sfc) - full multi-stage compilation
    Component,
    /// Anything else - ignored
    Other,
}

impl FileCategory {
    /// Detect category from a logical file path.
    pub fn from_path(path: &str) -> Self {
        match extension(path) {
            Some(ext) if ext.eq_ignore_ascii_case("css") => Self::Style,
            Some(ext) if ext.eq_ignore_ascii_case("js") => Self::Script(ScriptKind::Plain),
            Some(ext) if ext.eq_ignore_ascii_case("ts") => Self::Script(ScriptKind::Typed),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Data,
            Some(ext) if ext.eq_ignore_ascii_case("sfc") => Self::Component,
            _ => Self::Other,
        }
    }

    /// Display name for this category.
    pub fn name(self) -> &'static str {
        match self {
            Self::Style => "style",
            Self::Script(ScriptKind::Plain) => "script",
            Self::Script(ScriptKind::Typed) => "typed-script",
            Self::Data => "data",
            Self::Component => "component",
            Self::Other => "other",
        }
    }

    /// Returns true if this category produces compiled output.
    pub fn is_compilable(self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// Extension after the last dot, if any.
fn extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}
