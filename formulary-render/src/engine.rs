//! Tera rendering engine: [`UnitKind`] enum and [`Renderer`].
//!
//! # Outputs
//!
//! | Kind     | Template                  | Consumer                         |
//! |----------|---------------------------|----------------------------------|
//! | Launchd  | `launchd.plist.tera`      | `~/Library/LaunchAgents/*.plist` |
//! | Systemd  | `systemd.service.tera`    | `~/.config/systemd/user/*.service` |
//! | Caveats  | `caveats.txt.tera`        | printed after install            |

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::{Tera, Value};

use formulary_core::{Formula, ServiceDescriptor};

use crate::context::ServiceContext;
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates: baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("launchd.plist.tera", include_str!("templates/launchd.plist.tera")),
    ("systemd.service.tera", include_str!("templates/systemd.service.tera")),
    ("caveats.txt.tera", include_str!("templates/caveats.txt.tera")),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .to_lowercase()
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    let mut templates = Vec::new();
    for path in files {
        if path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

// ---------------------------------------------------------------------------
// systemd filters
// ---------------------------------------------------------------------------

/// Escape `%` specifiers so systemd takes the value literally.
fn escape_specifiers(s: &str) -> String {
    s.replace('%', "%%")
}

/// `systemd_path`: a bare path value (`WorkingDirectory=`, `append:`).
fn systemd_path(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = tera::try_get_value!("systemd_path", "value", String, value);
    Ok(Value::String(escape_specifiers(&s)))
}

/// `systemd_quote`: one double-quoted word of a command line or
/// `Environment=` assignment.
fn systemd_quote(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = tera::try_get_value!("systemd_quote", "value", String, value);
    let escaped = escape_specifiers(&s)
        .replace('\\', "\\\\")
        .replace('"', "\\\"");
    Ok(Value::String(format!("\"{escaped}\"")))
}

/// `systemd_exec_quote`: one double-quoted `ExecStart=` word. systemd expands
/// `$VAR` on command lines, so `$` is doubled as well.
fn systemd_exec_quote(value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
    let quoted = systemd_quote(value, args)?;
    let s = tera::try_get_value!("systemd_exec_quote", "value", String, quoted);
    Ok(Value::String(s.replace('$', "$$")))
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = HashMap::new();
    for (name, content) in TPLS {
        templates.insert(
            normalize_template_name(Path::new(name)),
            (*content).to_string(),
        );
    }
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    tera.register_filter("systemd_path", systemd_path);
    tera.register_filter("systemd_quote", systemd_quote);
    tera.register_filter("systemd_exec_quote", systemd_exec_quote);
    let items: Vec<(String, String)> = templates.into_iter().collect();
    tera.add_raw_templates(items)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// UnitKind
// ---------------------------------------------------------------------------

/// Everything a descriptor can be rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Launchd,
    Systemd,
    Caveats,
}

impl UnitKind {
    /// All variants in a stable order.
    pub fn all() -> &'static [UnitKind] {
        &[UnitKind::Launchd, UnitKind::Systemd, UnitKind::Caveats]
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            UnitKind::Launchd => "launchd.plist.tera",
            UnitKind::Systemd => "systemd.service.tera",
            UnitKind::Caveats => "caveats.txt.tera",
        }
    }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine for rendering templates with optional user overrides.
///
/// `user_template_dir` may contain `.tera` files that override embedded
/// defaults by name (e.g. `systemd.service.tera`).
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Construct a new [`TemplateEngine`], loading embedded templates plus any
    /// overrides found in `user_template_dir`.
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        let tera = build_tera(user_template_dir)?;
        Ok(TemplateEngine { tera })
    }

    /// Render `kind` with the supplied context. Line endings are LF.
    pub fn render(&self, ctx: &ServiceContext, kind: UnitKind) -> Result<String, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        let content = self.tera.render(kind.template_name(), &tera_ctx)?;
        Ok(content.replace("\r\n", "\n"))
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renders service descriptors. Create once and reuse.
pub struct Renderer {
    engine: TemplateEngine,
}

impl Renderer {
    /// Construct a new [`Renderer`] with embedded templates.
    pub fn new() -> Result<Self, RenderError> {
        Ok(Renderer { engine: TemplateEngine::new(None)? })
    }

    /// Construct a [`Renderer`] whose templates may be overridden from `dir`.
    pub fn with_overrides(dir: &Path) -> Result<Self, RenderError> {
        Ok(Renderer { engine: TemplateEngine::new(Some(dir))? })
    }

    /// Render `kind` for a bare descriptor.
    pub fn render(
        &self,
        descriptor: &ServiceDescriptor,
        formula_ref: &str,
        kind: UnitKind,
    ) -> Result<String, RenderError> {
        let ctx = ServiceContext::from_descriptor(descriptor, formula_ref);
        self.engine.render(&ctx, kind)
    }

    /// Render `kind` for a descriptor, with release metadata from `formula`.
    pub fn render_for_formula(
        &self,
        descriptor: &ServiceDescriptor,
        formula: &Formula,
        formula_ref: &str,
        kind: UnitKind,
    ) -> Result<String, RenderError> {
        let ctx = ServiceContext::from_descriptor(descriptor, formula_ref).with_formula(formula);
        self.engine.render(&ctx, kind)
    }

    /// The post-install help text.
    pub fn caveats(
        &self,
        descriptor: &ServiceDescriptor,
        formula: &Formula,
        formula_ref: &str,
    ) -> Result<String, RenderError> {
        self.render_for_formula(descriptor, formula, formula_ref, UnitKind::Caveats)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use formulary_core::{describe_service, FormulaName, InstallLayout};

    fn descriptor(prefix: &str) -> ServiceDescriptor {
        let layout = InstallLayout::new(
            Path::new(prefix),
            &FormulaName::from("ha-apple_content_cache-client"),
            "ha_apple_content_cache_client.sh",
        );
        describe_service(&layout)
    }

    #[test]
    fn renderer_new_succeeds() {
        Renderer::new().expect("Renderer::new should succeed with embedded templates");
    }

    #[test]
    fn all_kinds_render_without_error() {
        let renderer = Renderer::new().unwrap();
        let d = descriptor("/opt/fm");
        for kind in UnitKind::all() {
            let content = renderer
                .render(&d, "client.yaml", *kind)
                .unwrap_or_else(|e| panic!("render failed for {:?}: {e}", kind));
            assert!(
                content.contains("ha-apple_content_cache-client"),
                "rendered {:?} should mention the package",
                kind
            );
        }
    }

    #[test]
    fn systemd_quote_escapes_quotes_and_specifiers() {
        let out = systemd_quote(&Value::String("a \"b\" 100%".into()), &HashMap::new()).unwrap();
        assert_eq!(out, Value::String("\"a \\\"b\\\" 100%%\"".into()));
    }

    #[test]
    fn exec_words_double_dollar_signs() {
        let out =
            systemd_exec_quote(&Value::String("/opt/$HOME/c%.sh".into()), &HashMap::new()).unwrap();
        assert_eq!(out, Value::String("\"/opt/$$HOME/c%%.sh\"".into()));

        // Environment= values are not expanded, so `$` stays single there.
        let env = systemd_quote(&Value::String("A=$B".into()), &HashMap::new()).unwrap();
        assert_eq!(env, Value::String("\"A=$B\"".into()));
    }

    #[test]
    fn systemd_path_only_escapes_specifiers() {
        let out = systemd_path(&Value::String("/opt/my dir/%h".into()), &HashMap::new()).unwrap();
        assert_eq!(out, Value::String("/opt/my dir/%%h".into()));
    }

    #[test]
    fn plist_escapes_xml_in_paths() {
        let renderer = Renderer::new().unwrap();
        let d = descriptor("/opt/a&b");
        let plist = renderer.render(&d, "client.yaml", UnitKind::Launchd).unwrap();
        assert!(plist.contains("/opt/a&amp;b/bin/ha_apple_content_cache_client.sh"));
        assert!(!plist.contains("/opt/a&b/"));
    }

    #[test]
    fn no_crlf_in_any_rendered_output() {
        let renderer = Renderer::new().unwrap();
        let d = descriptor("/opt/fm");
        for kind in UnitKind::all() {
            let content = renderer.render(&d, "client.yaml", *kind).unwrap();
            assert!(!content.contains('\r'), "{:?} output contains CR", kind);
        }
    }
}
