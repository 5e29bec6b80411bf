//! Tree-to-text generator.
//!
//! One [`Generator`] lowers one module, start to finish, into two in-memory
//! text units; [`Units::write`] then persists them under `.norn/` with
//! overwrite protection. All mutable generation state lives here and is
//! threaded through the lowering methods, so single constructs can be
//! generated in isolation by the tests.

mod decl;
mod expr;
mod frames;
mod ident;
mod stmt;
mod typedesc;

use crate::ast::{Decl, Ident, Import, Module, ProcDecl, Stmt};
use crate::GenError;
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

pub(crate) use frames::Frame;

const GENERATED_BY: &str = "/*GENERATED BY NORNC";

pub struct Config {
    /// Path of the module's source file; the module name is its stem.
    pub source: PathBuf,
    /// Entry-point modules compile to a program `main` and get no interface
    /// unit.
    pub entry_point: bool,
    /// Link-disambiguation prefix. `None` derives it from the current
    /// directory's name; an empty string disables the wrapper macros.
    pub dir_prefix: Option<String>,
    /// Prefix under which installed library modules live; imports below it
    /// use angle-bracket includes.
    pub lib_prefix: Option<PathBuf>,
}

impl Config {
    pub fn new(source: impl Into<PathBuf>, entry_point: bool) -> Config {
        Config {
            source: source.into(),
            entry_point,
            dir_prefix: None,
            lib_prefix: None,
        }
    }
}

pub struct Generator {
    pub(crate) cfg: Config,
    pub(crate) module_name: String,
    header_comment: String,
    pub(crate) dir_prefix: String,
    pub(crate) impl_root: String,
    pub(crate) header: String,
    pub(crate) frames: Vec<Frame>,
    /// Discriminant of the type-based CASE currently being generated.
    pub(crate) case_variable: Option<Rc<Ident>>,
    /// Label type of the CASE arm currently being generated.
    pub(crate) case_label: Option<Rc<Ident>>,
    /// Type identifier currently being declared, for incomplete-type
    /// rendering of self references.
    pub(crate) declared_type: Option<Rc<Ident>>,
    hoist_counter: u32,
    internal_decls_emitted: bool,
    pub(crate) address_ops: Cell<bool>,
    import_names: Vec<String>,
}

impl Generator {
    pub fn new(cfg: Config) -> Generator {
        let module_name = cfg
            .source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_else(|| panic!("source path {} has no module name", cfg.source.display()))
            .to_string();
        let dir_prefix = match &cfg.dir_prefix {
            Some(p) => sanitize_dir_prefix(p),
            None => std::env::current_dir()
                .ok()
                .and_then(|d| d.file_name().map(|n| n.to_string_lossy().into_owned()))
                .map(|n| sanitize_dir_prefix(&n))
                .unwrap_or_default(),
        };
        debug!(module = %module_name, entry = cfg.entry_point, "generating module");
        Generator {
            cfg,
            header_comment: format!("{} {}*/", GENERATED_BY, env!("CARGO_PKG_VERSION")),
            dir_prefix,
            module_name,
            impl_root: String::new(),
            header: String::new(),
            frames: Vec::new(),
            case_variable: None,
            case_label: None,
            declared_type: None,
            hoist_counter: 0,
            internal_decls_emitted: false,
            address_ops: Cell::new(false),
            import_names: Vec::new(),
        }
    }

    /// The implementation sink: the innermost open procedure declaration,
    /// or the module-level text when no procedure is open.
    pub(crate) fn out(&mut self) -> &mut String {
        match self.frames.last_mut() {
            Some(frame) => &mut frame.decl,
            None => &mut self.impl_root,
        }
    }

    pub(crate) fn emit(&mut self, text: &str) {
        self.out().push_str(text);
    }

    pub(crate) fn emit_h(&mut self, text: &str) {
        self.header.push_str(text);
    }

    /// Runtime include and source-file constant, once, ahead of the first
    /// declaration.
    pub(crate) fn ensure_internal_decls(&mut self) {
        if self.internal_decls_emitted {
            return;
        }
        self.internal_decls_emitted = true;
        self.emit("#include <norn/NORN.h>\n");
        if !self.cfg.entry_point {
            self.emit_h("#include <norn/NORN.h>\n");
        }
        let source = self.cfg.source.display().to_string();
        self.emit(&format!(
            "\n#define NORN_SOURCE_FILENAME \"{}\"\n",
            source
        ));
    }

    pub fn module_heading(&mut self) {
        let comment = self.header_comment.clone();
        self.emit(&format!("{}\n\n", comment));
        if !self.cfg.entry_point {
            let include = format!("#include \"{}.h\"\n", self.module_name);
            self.emit(&include);
        }
        self.emit_h(&format!("{}\n\n", comment));
        self.emit_h(&format!(
            "#ifndef {0}_h\n#define {0}_h\n\n",
            self.module_name
        ));
    }

    pub fn import_list(&mut self, imports: &[Import]) {
        for import in imports {
            self.import_names.push(import.module.clone());
            let include = self.import_include(import);
            self.emit(&include);
            self.emit_h(&include);
        }
    }

    fn import_include(&self, import: &Import) -> String {
        let dir = &import.dir;
        if let Some(prefix) = &self.cfg.lib_prefix {
            if let Ok(rel) = dir.strip_prefix(prefix) {
                if !dir.join(".norn").exists() {
                    return format!("#include <{}/{}.h>\n", rel.display(), import.module);
                }
            }
        }
        if dir.as_path() == Path::new(".") {
            return format!("#include \"{}.h\"\n", import.module);
        }
        // The implementation unit lives inside .norn/, so relative foreign
        // directories are one level further up.
        let header_dir = if dir.join(".norn").exists() {
            dir.join(".norn")
        } else {
            dir.clone()
        };
        let parent = if dir.is_absolute() { "" } else { "../" };
        format!(
            "#include \"{}{}/{}.h\"\n",
            parent,
            header_dir.display(),
            import.module
        )
    }

    pub fn declaration(&mut self, decl: &Decl) {
        match decl {
            Decl::Const { ident, value } => self.const_declaration(ident, value),
            Decl::Type(ident) => self.type_declaration(ident),
            Decl::Var(idents) => self.variable_declaration(idents),
            Decl::Proc(proc) => self.procedure(proc),
        }
    }

    fn procedure(&mut self, proc: &ProcDecl) {
        self.procedure_heading(&proc.ident);
        for decl in &proc.decls {
            self.declaration(decl);
        }
        self.procedure_statements(&proc.body);
        if let Some(exp) = &proc.ret {
            self.return_clause(exp);
        }
        self.procedure_end(&proc.ident);
    }

    pub fn module_statements(&mut self, body: &[Stmt]) {
        assert!(
            self.frames.is_empty(),
            "module statements generated inside an open procedure declaration"
        );
        self.ensure_internal_decls();
        if stmts_use_address_ops(body) {
            self.address_ops.set(true);
        }
        if self.cfg.entry_point {
            self.emit("\nint main(int argc, char *argv[])\n{\n");
            self.emit("\tNORN_Init(argc, argv);\n");
            if self.address_ops.get() {
                self.integer_size_assertion(1);
            }
            self.init_calls(1);
            self.stmt_seq(body, 1);
            self.emit("\treturn 0;\n}\n");
        } else {
            let init = format!("{}__Init", self.module_name);
            self.emit(&format!("\nvoid {}(void)\n{{\n", init));
            if !self.import_names.is_empty() || !body.is_empty() {
                self.emit("\tstatic int initialized = 0;\n\n");
                self.emit("\tif (! initialized) {\n");
                if self.address_ops.get() {
                    self.integer_size_assertion(2);
                }
                self.init_calls(2);
                self.stmt_seq(body, 2);
                self.emit("\t\tinitialized = 1;\n\t}\n");
            }
            self.emit("}\n");

            self.emit_h("\n");
            let init_ident = Ident::new(&init, crate::ast::IdentKind::Proc)
                .internal()
                .build();
            let macros = self.symbol_macros(&[init_ident], "", 0);
            self.emit_h(&macros);
            self.emit_h(&format!("void {}(void);\n", init));
        }
    }

    fn init_calls(&mut self, indent: usize) {
        let calls: String = self
            .import_names
            .iter()
            .map(|name| format!("{}{}__Init();\n", tabs(indent), name))
            .collect();
        self.emit(&calls);
    }

    fn integer_size_assertion(&mut self, indent: usize) {
        self.emit(&format!(
            "{}NORN_C_ASSERT(sizeof (NORN_INTEGER) == sizeof (void *)); /*SYSTEM procedure requirement*/\n",
            tabs(indent)
        ));
    }

    pub fn module_end(&mut self) {
        self.emit_h("\n#endif\n");
    }

    pub fn finish(self) -> Units {
        assert!(
            self.frames.is_empty(),
            "module finished with an open procedure declaration"
        );
        debug!(module = %self.module_name, "module generated");
        Units {
            module: self.module_name,
            implementation: self.impl_root,
            interface: if self.cfg.entry_point {
                None
            } else {
                Some(self.header)
            },
        }
    }

    /// The next synthesized interface type name.
    pub(crate) fn next_hoisted_name(&mut self) -> String {
        let name = format!("{}_T{}", self.module_name, self.hoist_counter);
        self.hoist_counter += 1;
        name
    }
}

/// Lowers one complete module.
pub fn generate(module: &Module, cfg: Config) -> Units {
    let mut gen = Generator::new(cfg);
    gen.module_heading();
    gen.import_list(&module.imports);
    for decl in &module.decls {
        gen.declaration(decl);
    }
    gen.module_statements(&module.body);
    gen.module_end();
    gen.finish()
}

/// The generated text of one module, ready to persist.
pub struct Units {
    pub module: String,
    pub implementation: String,
    /// `None` for the entry-point module.
    pub interface: Option<String>,
}

#[derive(Debug)]
pub struct WrittenPaths {
    pub implementation: PathBuf,
    pub interface: Option<PathBuf>,
}

impl Units {
    /// Writes the units into `<out_dir>/.norn/`, replacing only files that
    /// carry the generated-by marker. Partially written temporaries are
    /// removed on every exit path.
    pub fn write(&self, out_dir: &Path) -> Result<WrittenPaths, GenError> {
        let norn_dir = out_dir.join(".norn");
        fs::create_dir_all(&norn_dir).map_err(|source| GenError::CreateDir {
            path: norn_dir.clone(),
            source,
        })?;

        let mut temps = TempGuard::default();
        let pid = std::process::id();

        let c_path = norn_dir.join(format!("{}.c", self.module));
        let c_temp = norn_dir.join(format!("{}.c.{}", self.module, pid));
        temps.track(c_temp.clone());
        fs::write(&c_temp, &self.implementation).map_err(|source| GenError::Write {
            path: c_temp.clone(),
            source,
        })?;

        let h_path = norn_dir.join(format!("{}.h", self.module));
        let h_temp = norn_dir.join(format!("{}.h.{}", self.module, pid));
        let interface = match &self.interface {
            Some(text) => {
                temps.track(h_temp.clone());
                fs::write(&h_temp, text).map_err(|source| GenError::Write {
                    path: h_temp.clone(),
                    source,
                })?;
                Some(h_temp.clone())
            }
            None => None,
        };

        replace_generated(&c_temp, &c_path)?;
        temps.untrack(&c_temp);

        match interface {
            Some(temp) => {
                replace_generated(&temp, &h_path)?;
                temps.untrack(&temp);
            }
            None => {
                // A header left behind by a non-entry build of the same
                // module must not survive.
                if h_path.exists() {
                    if !is_generated(&h_path)? {
                        return Err(GenError::WillNotDelete { path: h_path });
                    }
                    fs::remove_file(&h_path).map_err(|source| GenError::Remove {
                        path: h_path.clone(),
                        source,
                    })?;
                }
            }
        }

        debug!(module = %self.module, dir = %norn_dir.display(), "output written");
        Ok(WrittenPaths {
            implementation: c_path,
            interface: self.interface.as_ref().map(|_| h_path),
        })
    }
}

fn replace_generated(temp: &Path, dest: &Path) -> Result<(), GenError> {
    if dest.exists() && !is_generated(dest)? {
        return Err(GenError::WillNotOverwrite {
            path: dest.to_path_buf(),
        });
    }
    fs::rename(temp, dest).map_err(|source| GenError::Replace {
        path: dest.to_path_buf(),
        source,
    })
}

/// Recognizes the generated-by marker, ignoring the version tail.
fn is_generated(path: &Path) -> Result<bool, GenError> {
    let text = fs::read_to_string(path).map_err(|source| GenError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text.starts_with(GENERATED_BY))
}

#[derive(Default)]
struct TempGuard {
    paths: Vec<PathBuf>,
}

impl TempGuard {
    fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    fn untrack(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        for path in &self.paths {
            let _ = fs::remove_file(path);
        }
    }
}

/// Letters and digits of the directory name, first character a letter,
/// capped at 14 characters; empty when nothing qualifies.
fn sanitize_dir_prefix(raw: &str) -> String {
    let mut out = String::new();
    for ch in raw.chars() {
        let ok = if out.is_empty() {
            ch.is_ascii_alphabetic()
        } else {
            ch.is_ascii_alphanumeric()
        };
        if ok {
            out.push(ch);
            if out.len() == 14 {
                break;
            }
        }
    }
    out
}

pub(crate) fn tabs(n: usize) -> String {
    "\t".repeat(n)
}

/// SYSTEM address operations require the pointer-width assertion in the
/// initialization body, which is emitted before the statements themselves.
fn stmts_use_address_ops(stmts: &[Stmt]) -> bool {
    stmts.iter().any(stmt_uses_address_ops)
}

fn stmt_uses_address_ops(stmt: &Stmt) -> bool {
    let in_expr = expr::expr_uses_address_ops;
    match stmt {
        Stmt::SysGet { .. } | Stmt::SysPut { .. } | Stmt::SysCopy { .. } => true,
        Stmt::Assign { target, value } => expr::desig_uses_address_ops(target) || in_expr(value),
        Stmt::Call { proc, args } => {
            expr::desig_uses_address_ops(proc) || args.iter().any(in_expr)
        }
        Stmt::If { arms, else_arm } => {
            arms.iter()
                .any(|(cond, body)| in_expr(cond) || stmts_use_address_ops(body))
                || else_arm.as_deref().is_some_and(stmts_use_address_ops)
        }
        Stmt::While { arms } => arms
            .iter()
            .any(|(cond, body)| in_expr(cond) || stmts_use_address_ops(body)),
        Stmt::Repeat { body, until } => in_expr(until) || stmts_use_address_ops(body),
        Stmt::For { from, to, body, .. } => {
            in_expr(from) || in_expr(to) || stmts_use_address_ops(body)
        }
        Stmt::CaseInt { expr, arms, .. } => {
            in_expr(expr) || arms.iter().any(|arm| stmts_use_address_ops(&arm.body))
        }
        Stmt::CaseType { arms, .. } => arms.iter().any(|arm| stmts_use_address_ops(&arm.body)),
        Stmt::Inc { by, .. } | Stmt::Dec { by, .. } => by.as_ref().is_some_and(in_expr),
        Stmt::Incl { elem, .. } | Stmt::Excl { elem, .. } => in_expr(elem),
        Stmt::New { .. } => false,
        Stmt::Assert { cond, .. } => in_expr(cond),
        Stmt::Pack { n, .. } => in_expr(n),
        Stmt::Unpk { .. } => false,
    }
}
