//! Compilation pipeline for playground files.
//!
//! Every edit re-compiles the touched [`LogicalFile`]: the pipeline
//! dispatches on the path's category and writes compiled artifacts into the
//! file's output slot, returning diagnostics as data instead of panicking.
//!
//! | Category        | Strategy                                            |
//! |-----------------|-----------------------------------------------------|
//! | style           | copy source verbatim into the style slot            |
//! | script          | optional superset strip, same text to client + SSR  |
//! | data            | parse, re-emit as a default-export module           |
//! | component       | multi-stage compile via the injected compiler       |
//! | other           | no-op                                               |

pub mod capability;
mod component;
pub mod transform;


use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::core::{FileCategory, LogicalFile, ScriptKind};

pub use capability::{
    BindingMetadata, CompiledScript, ComponentCompiler, ComponentDescriptor, ParseOptions,
    ParseOutcome, ScriptBlock, ScriptFailure, ScriptOptions, StyleBlock, StyleOutcome,
    StyleRequest, TemplateBlock, TemplateOutcome, TemplateRequest,
};
pub use component::COMPONENT_IDENT;
pub use transform::{PassThrough, TransformError, TransformSource};

// =============================================================================
// Results
// =============================================================================

/// Outcome of one compile call.
///
/// `diagnostics` is the success sentinel: empty means the compile ran to
/// completion and the output slot was committed. `style_errors` collects
/// non-fatal style-compile failures for the same call; styles never abort
/// a compile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileReport {
    pub diagnostics: Vec<String>,
    pub style_errors: Vec<String>,
}

impl CompileReport {
    /// Failure with a single diagnostic.
    pub fn fail(diagnostic: impl Into<String>) -> Self {
        Self {
            diagnostics: vec![diagnostic.into()],
            style_errors: Vec::new(),
        }
    }

    /// Failure carrying a compiler-provided error list.
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            diagnostics: errors,
            style_errors: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

// =============================================================================
// Options
// =============================================================================

static DEFAULT_CE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.ce\.sfc$").expect("default custom-element pattern is valid"));

/// How a file path is classified as a custom element.
#[derive(Clone)]
pub enum CustomElementMatcher {
    Always,
    Never,
    /// Arbitrary host-supplied predicate over the file path.
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
    /// Path pattern, e.g. `\.ce\.sfc$`.
    Pattern(Regex),
}

impl CustomElementMatcher {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Predicate(predicate) => predicate(path),
            Self::Pattern(pattern) => pattern.is_match(path),
        }
    }
}

impl Default for CustomElementMatcher {
    fn default() -> Self {
        Self::Pattern(DEFAULT_CE_PATTERN.clone())
    }
}

impl fmt::Debug for CustomElementMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "Always"),
            Self::Never => write!(f, "Never"),
            Self::Predicate(_) => write!(f, "Predicate(..)"),
            Self::Pattern(pattern) => write!(f, "Pattern({pattern})"),
        }
    }
}

/// Compile policy derived from config (see [`crate::config`]).
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Inline the render function into script-setup output.
    pub inline_template: bool,
    /// Custom-element classification over file paths.
    pub custom_element: CustomElementMatcher,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            inline_template: true,
            custom_element: CustomElementMatcher::default(),
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// The compilation pipeline, parameterized over the injected compiler and
/// source-transform capabilities.
pub struct CompilePipeline<C, T> {
    compiler: C,
    transform: T,
    options: CompileOptions,
}

impl<C: ComponentCompiler, T: TransformSource> CompilePipeline<C, T> {
    pub fn new(compiler: C, transform: T) -> Self {
        Self {
            compiler,
            transform,
            options: CompileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile one logical file, dispatching on its path category.
    ///
    /// Failures are returned as diagnostics, never panicked; a failed
    /// compile leaves the output slot at its prior values.
    pub async fn compile(&self, file: &mut LogicalFile) -> CompileReport {
        if file.source.trim().is_empty() {
            return CompileReport::default();
        }

        match FileCategory::from_path(&file.path) {
            FileCategory::Style => {
                file.output.css = file.source.clone();
                CompileReport::default()
            }
            FileCategory::Script(kind) => self.compile_script_file(file, kind),
            FileCategory::Data => compile_data_file(file),
            FileCategory::Component => component::compile_component(self, file).await,
            FileCategory::Other => CompileReport::default(),
        }
    }

    /// Plain and typed script modules: the same text goes to both rendering
    /// variants, after the superset strip when needed.
    fn compile_script_file(&self, file: &mut LogicalFile, kind: ScriptKind) -> CompileReport {
        let code = match kind {
            ScriptKind::Plain => file.source.clone(),
            ScriptKind::Typed => match self.transform.transform(&file.source) {
                Ok(code) => code,
                Err(err) => return CompileReport::fail(err.to_string()),
            },
        };
        file.output.client = code.clone();
        file.output.ssr = code;
        CompileReport::default()
    }
}

/// Structured-data files become a synthetic default-export module.
fn compile_data_file(file: &mut LogicalFile) -> CompileReport {
    let value: serde_json::Value = match serde_json::from_str(&file.source) {
        Ok(value) => value,
        Err(err) => {
            crate::debug!("compile"; "data parse failed for {}: {}", file.path, err);
            return CompileReport::fail(err.to_string());
        }
    };
    let module = format!("export default {value}");
    file.output.client = module.clone();
    file.output.ssr = module;
    CompileReport::default()
}
