//! External component-format compiler capability.
//!
//! The playground never parses component source itself - parsing, script and
//! template codegen, and style rewriting are delegated to an injected
//! implementation of [`ComponentCompiler`]. The pipeline drives these
//! operations and assembles their outputs into the file's output slot.
//!
//! Error conventions mirror the operations: `parse`, `compile_template` and
//! `compile_style` report failures as error lists in their outcome,
//! `compile_script` is the one operation that fails with a carried stack
//! trace (see [`ScriptFailure`]).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compiler::transform::TransformError;

/// Binding analysis produced by the client script compile and consumed by
/// the template compile. Opaque to the pipeline; insertion order is
/// preserved so re-compiles emit identical output.
pub type BindingMetadata = serde_json::Map<String, serde_json::Value>;

// =============================================================================
// Descriptor
// =============================================================================

/// A script section of a component file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptBlock {
    pub content: String,
    /// Declared source language, e.g. `ts`. `None` means the base language.
    pub lang: Option<String>,
}

/// The template section of a component file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateBlock {
    pub content: String,
    /// Declared pre-processor language. Only `None` is supported.
    pub lang: Option<String>,
}

/// A style section of a component file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleBlock {
    pub content: String,
    pub scoped: bool,
    pub module: bool,
    pub lang: Option<String>,
}

/// Parsed shape of one component file. Ephemeral - exists only within a
/// single compile call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentDescriptor {
    pub script: Option<ScriptBlock>,
    pub script_setup: Option<ScriptBlock>,
    pub template: Option<TemplateBlock>,
    pub styles: Vec<StyleBlock>,
    /// CSS variable binding names, in declaration order.
    pub css_vars: Vec<String>,
}

impl ComponentDescriptor {
    /// Declared script language: the script block's, or script-setup's.
    pub fn script_lang(&self) -> Option<&str> {
        self.script
            .as_ref()
            .and_then(|s| s.lang.as_deref())
            .or_else(|| self.script_setup.as_ref().and_then(|s| s.lang.as_deref()))
    }

    pub fn has_script(&self) -> bool {
        self.script.is_some() || self.script_setup.is_some()
    }

    pub fn has_scoped_style(&self) -> bool {
        self.styles.iter().any(|s| s.scoped)
    }
}

// =============================================================================
// Operation requests and outcomes
// =============================================================================

/// Options for [`ComponentCompiler::parse`].
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub filename: String,
    pub source_map: bool,
}

/// Result of parsing component source.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub errors: Vec<String>,
    pub descriptor: ComponentDescriptor,
}

/// Options for [`ComponentCompiler::compile_script`].
#[derive(Debug, Clone)]
pub struct ScriptOptions {
    /// Compile identity (hex), scopes generated identifiers.
    pub id: String,
    /// Server-rendering variant requested.
    pub ssr: bool,
    /// Script source is the strict-typing superset.
    pub typed: bool,
    /// Inline the render function into script-setup output.
    pub inline_template: bool,
    /// CSS variable bindings to inject at render time.
    pub css_vars: Vec<String>,
}

/// Successful script compile.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    pub content: String,
    pub bindings: Option<BindingMetadata>,
}

/// Script compilation failure carrying the compiler's stack rendering.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ScriptFailure {
    pub message: String,
    pub stack: String,
}

impl ScriptFailure {
    pub fn new(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: stack.into(),
        }
    }

    /// First `max_lines` lines of the stack, falling back to the message
    /// when no stack was captured.
    pub fn stack_excerpt(&self, max_lines: usize) -> String {
        if self.stack.is_empty() {
            return self.message.clone();
        }
        self.stack
            .lines()
            .take(max_lines)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<TransformError> for ScriptFailure {
    fn from(err: TransformError) -> Self {
        Self::new(err.to_string(), String::new())
    }
}

/// Request for [`ComponentCompiler::compile_template`].
#[derive(Debug, Clone)]
pub struct TemplateRequest {
    pub source: String,
    pub filename: String,
    /// Compile identity (hex), scopes generated selectors.
    pub id: String,
    /// Any style block is scoped.
    pub scoped: bool,
    pub ssr: bool,
    pub typed: bool,
    /// Binding metadata from the client script compile.
    pub bindings: Option<BindingMetadata>,
    pub css_vars: Vec<String>,
}

/// Result of a template compile.
#[derive(Debug, Clone, Default)]
pub struct TemplateOutcome {
    pub code: String,
    pub errors: Vec<String>,
}

/// Request for [`ComponentCompiler::compile_style`].
#[derive(Debug, Clone)]
pub struct StyleRequest {
    pub source: String,
    pub filename: String,
    /// Compile identity (hex), used for the scoping attribute.
    pub id: String,
    pub scoped: bool,
    pub module: bool,
}

/// Result of a style compile.
#[derive(Debug, Clone, Default)]
pub struct StyleOutcome {
    pub code: String,
    pub errors: Vec<String>,
}

// =============================================================================
// Capability trait
// =============================================================================

/// The injected component-format compiler.
///
/// Implementations are black boxes to the pipeline; only the operation
/// signatures and their error conventions are contractual.
#[allow(async_fn_in_trait)]
pub trait ComponentCompiler: Send + Sync {
    /// Split component source into a descriptor. Structural failures come
    /// back in `errors`, never as a panic.
    fn parse(&self, source: &str, options: &ParseOptions) -> ParseOutcome;

    /// Compile the script portion for one rendering variant.
    fn compile_script(
        &self,
        descriptor: &ComponentDescriptor,
        options: &ScriptOptions,
    ) -> Result<CompiledScript, ScriptFailure>;

    /// Compile the template into a render function.
    fn compile_template(&self, request: &TemplateRequest) -> TemplateOutcome;

    /// Compile one style block. May suspend (external processors).
    async fn compile_style(&self, request: &StyleRequest) -> StyleOutcome;

    /// Rewrite the module's default export to a named constant.
    fn rewrite_default(&self, content: &str, export_name: &str, typed: bool) -> String;
}
