//! Logical files and their compiled output slots.

/// Compiled artifacts for one logical file.
///
/// The pipeline is the only writer; the embedding store owns the record and
/// reads it after each compile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSlot {
    /// Client-rendering script module
    pub client: String,
    /// Server-rendering script module
    pub ssr: String,
    /// Style text (compiled or placeholder comment)
    pub css: String,
}

impl OutputSlot {
    pub fn is_empty(&self) -> bool {
        self.client.is_empty() && self.ssr.is_empty() && self.css.is_empty()
    }
}

/// An editable source file in the playground store.
///
/// The path is the unique store key and carries the category-determining
/// suffix. The pipeline reads `source` and writes `output`.
#[derive(Debug, Clone, Default)]
pub struct LogicalFile {
    pub path: String,
    pub source: String,
    pub output: OutputSlot,
}

impl LogicalFile {
    pub fn new(path: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
            output: OutputSlot::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_file_has_empty_output() {
        let file = LogicalFile::new("App.sfc", "<template/>");
        assert_eq!(file.path, "App.sfc");
        assert!(file.output.is_empty());
    }
}
