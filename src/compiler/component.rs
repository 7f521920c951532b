//! Full multi-stage compilation for component files.
//!
//! Produces two script variants (client and server-rendering) plus style
//! text from one parsed descriptor. Step order matters: script compilation
//! yields binding metadata the template compile consumes, and the shared
//! trailer references everything compiled before it.
//!
//! Failure policy per stage:
//! - parse errors and unsupported-feature rejections abort with diagnostics
//! - a script-compile failure aborts with a truncated stack excerpt (the
//!   one place a carried failure becomes a multi-line diagnostic)
//! - SSR-side failures degrade that variant to an inline error comment and
//!   leave the client output intact
//! - style failures are collected per call and never abort

use std::sync::LazyLock;

use regex::Regex;

use crate::compiler::capability::{
    BindingMetadata, ComponentCompiler, ComponentDescriptor, ParseOptions, ScriptFailure,
    ScriptOptions, StyleRequest, TemplateBlock, TemplateRequest,
};
use crate::compiler::transform::TransformSource;
use crate::compiler::{CompilePipeline, CompileReport};
use crate::core::{CompileIdentity, LogicalFile};

/// Canonical in-module component object identifier.
pub const COMPONENT_IDENT: &str = "__sfc__";

/// Style slot placeholder for custom elements.
const CE_STYLE_PLACEHOLDER: &str =
    "/* The component style of the custom element will be compiled into the component object */";

/// Style slot placeholder when the component has no style blocks.
const NO_STYLE_PLACEHOLDER: &str = "/* No <style> tags present */";

/// Matches the generic exported render function for renaming.
static RENDER_EXPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\nexport (function|const) (render|ssrRender)")
        .expect("render export pattern is valid")
});

pub(super) async fn compile_component<C: ComponentCompiler, T: TransformSource>(
    pipeline: &CompilePipeline<C, T>,
    file: &mut LogicalFile,
) -> CompileReport {
    let id = CompileIdentity::from_path(&file.path);

    let parsed = pipeline.compiler.parse(
        &file.source,
        &ParseOptions {
            filename: file.path.clone(),
            source_map: true,
        },
    );
    if !parsed.errors.is_empty() {
        return CompileReport::from_errors(parsed.errors);
    }
    let descriptor = parsed.descriptor;

    if descriptor.styles.iter().any(|s| s.lang.is_some())
        || descriptor
            .template
            .as_ref()
            .is_some_and(|t| t.lang.is_some())
    {
        return CompileReport::fail(
            "lang=\"x\" pre-processors for <template> or <style> are currently not supported.",
        );
    }

    let script_lang = descriptor.script_lang();
    let typed = script_lang == Some("ts");
    if script_lang.is_some() && !typed {
        return CompileReport::fail("Only lang=\"ts\" is supported for <script> blocks.");
    }

    let has_scoped = descriptor.has_scoped_style();
    let mut client_code = String::new();
    let mut ssr_code = String::new();

    let (client_script, bindings) =
        match compile_script_block(pipeline, &descriptor, id, false, typed) {
            Ok(result) => result,
            // The one stage where a carried failure becomes a diagnostic.
            Err(failure) => return CompileReport::fail(failure.stack_excerpt(12)),
        };
    client_code.push_str(&client_script);

    // A dedicated SSR script compile is needed when the render function is
    // inlined by script-setup, or when css variable bindings must be
    // injected differently at render time. Otherwise the client output is
    // reused verbatim.
    if descriptor.script_setup.is_some() || !descriptor.css_vars.is_empty() {
        match compile_script_block(pipeline, &descriptor, id, true, typed) {
            Ok((ssr_script, _)) => ssr_code.push_str(&ssr_script),
            Err(failure) => ssr_code = format!("/* SSR compile error: {failure} */"),
        }
    } else {
        ssr_code.push_str(&client_script);
    }

    // Dedicated template compilation, unless script-setup already inlined
    // the render function.
    if let Some(template) = &descriptor.template
        && (descriptor.script_setup.is_none() || !pipeline.options.inline_template)
    {
        match compile_template_block(
            pipeline,
            &descriptor,
            template,
            &file.path,
            id,
            bindings.as_ref(),
            false,
            typed,
        ) {
            Ok(code) => {
                client_code.push(';');
                client_code.push_str(&code);
            }
            Err(errors) => return CompileReport::from_errors(errors),
        }

        match compile_template_block(
            pipeline,
            &descriptor,
            template,
            &file.path,
            id,
            bindings.as_ref(),
            true,
            typed,
        ) {
            Ok(code) => {
                ssr_code.push(';');
                ssr_code.push_str(&code);
            }
            // SSR template failure is non-fatal; the client output stands.
            Err(errors) => {
                let first = errors.first().map(String::as_str).unwrap_or("unknown");
                ssr_code = format!("/* SSR compile error: {first} */");
            }
        }
    }

    if has_scoped {
        append_shared(
            &mut client_code,
            &mut ssr_code,
            &format!(
                "\n{COMPONENT_IDENT}.__scopeId = {}",
                json_string(&id.scope_attr())
            ),
        );
    }

    let is_custom_element = pipeline.options.custom_element.matches(&file.path);

    let mut report = CompileReport::default();
    let mut css = String::new();
    let mut ce_styles: Vec<String> = Vec::new();
    for style in &descriptor.styles {
        if style.module {
            report
                .diagnostics
                .push("<style module> is not supported.".into());
            return report;
        }

        let outcome = pipeline
            .compiler
            .compile_style(&StyleRequest {
                source: style.content.clone(),
                filename: file.path.clone(),
                id: id.to_hex(),
                scoped: style.scoped,
                module: style.module,
            })
            .await;
        if !outcome.errors.is_empty() {
            // Absolute-path resolution warnings cannot occur inside the
            // sandbox; every other failure is surfaced.
            if !outcome.errors[0].contains("pathToFileURL") {
                report.style_errors.push(outcome.errors[0].clone());
            }
            continue;
        }
        if is_custom_element {
            ce_styles.push(outcome.code);
        } else {
            css.push_str(&outcome.code);
            css.push('\n');
        }
    }

    file.output.css = if !css.is_empty() {
        css.trim().to_string()
    } else if is_custom_element {
        CE_STYLE_PLACEHOLDER.to_string()
    } else {
        NO_STYLE_PLACEHOLDER.to_string()
    };

    if !client_code.is_empty() || !ssr_code.is_empty() {
        let mut trailer = format!(
            "\n{COMPONENT_IDENT}.__file = {}",
            json_string(&file.path)
        );
        if is_custom_element {
            let styles = serde_json::to_string(&ce_styles).unwrap_or_else(|_| "[]".into());
            trailer.push_str(&format!("\n{COMPONENT_IDENT}.styles = {styles}"));
        }
        trailer.push_str(&format!("\nexport default {COMPONENT_IDENT}"));
        append_shared(&mut client_code, &mut ssr_code, &trailer);

        file.output.client = client_code.trim_start().to_string();
        file.output.ssr = ssr_code.trim_start().to_string();
    }

    report
}

/// Compile the script portion for one rendering variant.
///
/// Emits the analyzed-bindings comment, rewrites the default export onto
/// the canonical component object, and strips superset syntax when the
/// script is typed. An absent script block yields an empty object.
#[allow(clippy::type_complexity)]
fn compile_script_block<C: ComponentCompiler, T: TransformSource>(
    pipeline: &CompilePipeline<C, T>,
    descriptor: &ComponentDescriptor,
    id: CompileIdentity,
    ssr: bool,
    typed: bool,
) -> Result<(String, Option<BindingMetadata>), ScriptFailure> {
    if !descriptor.has_script() {
        return Ok((format!("\nconst {COMPONENT_IDENT} = {{}}"), None));
    }

    let compiled = pipeline.compiler.compile_script(
        descriptor,
        &ScriptOptions {
            id: id.to_hex(),
            ssr,
            typed,
            inline_template: pipeline.options.inline_template,
            css_vars: descriptor.css_vars.clone(),
        },
    )?;

    let mut code = String::new();
    if let Some(bindings) = &compiled.bindings {
        let rendered = serde_json::to_string_pretty(bindings).unwrap_or_else(|_| "{}".into());
        code.push_str(&format!("\n/* Analyzed bindings: {rendered} */"));
    }
    code.push('\n');
    code.push_str(
        &pipeline
            .compiler
            .rewrite_default(&compiled.content, COMPONENT_IDENT, typed),
    );

    if typed {
        code = pipeline.transform.transform(&code)?;
    }

    Ok((code, compiled.bindings))
}

/// Compile the template for one rendering variant and bind the generated
/// function onto the component object under the variant's name.
#[allow(clippy::too_many_arguments)]
fn compile_template_block<C: ComponentCompiler, T: TransformSource>(
    pipeline: &CompilePipeline<C, T>,
    descriptor: &ComponentDescriptor,
    template: &TemplateBlock,
    filename: &str,
    id: CompileIdentity,
    bindings: Option<&BindingMetadata>,
    ssr: bool,
    typed: bool,
) -> Result<String, Vec<String>> {
    let outcome = pipeline.compiler.compile_template(&TemplateRequest {
        source: template.content.clone(),
        filename: filename.to_string(),
        id: id.to_hex(),
        scoped: descriptor.has_scoped_style(),
        ssr,
        typed,
        bindings: bindings.cloned(),
        css_vars: descriptor.css_vars.clone(),
    });
    if !outcome.errors.is_empty() {
        return Err(outcome.errors);
    }

    let fn_name = if ssr { "ssrRender" } else { "render" };
    let renamed = RENDER_EXPORT.replace(&outcome.code, format!("$1 {fn_name}"));
    let mut code = format!("\n{renamed}\n{COMPONENT_IDENT}.{fn_name} = {fn_name}");

    if typed {
        code = pipeline
            .transform
            .transform(&code)
            .map_err(|err| vec![err.to_string()])?;
    }

    Ok(code)
}

fn append_shared(client: &mut String, ssr: &mut String, code: &str) {
    client.push_str(code);
    ssr.push_str(code);
}

fn json_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".into())
}
