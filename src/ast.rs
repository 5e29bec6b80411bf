//! Annotated syntax tree consumed by the generator.
//!
//! Every identifier carries its resolved type, symbol kind and scope flags
//! before generation starts; the generator never checks types, it only
//! reads the annotations the front end left behind.

use crate::types::{self, Type};
use std::cell::OnceCell;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentKind {
    Const,
    Type,
    Var,
    ValueParam,
    VarParam,
    Proc,
    Field,
}

pub struct Ident {
    pub name: String,
    pub kind: IdentKind,
    ty: OnceCell<Rc<Type>>,
    /// Declared with an export mark.
    pub exported: bool,
    /// Declared inside a procedure.
    pub local: bool,
    /// Compiler-synthesized; rendered verbatim, never qualified.
    pub internal: bool,
    /// Imported from another module (name carries the `M.x` qualification).
    pub imported: bool,
}

impl Ident {
    pub fn new(name: &str, kind: IdentKind) -> Ident {
        Ident {
            name: name.to_string(),
            kind,
            ty: OnceCell::new(),
            exported: false,
            local: false,
            internal: false,
            imported: false,
        }
    }

    pub fn typed(self, ty: Rc<Type>) -> Ident {
        self.ty.set(ty).ok();
        self
    }

    pub fn exported(mut self) -> Ident {
        self.exported = true;
        self
    }

    pub fn local(mut self) -> Ident {
        self.local = true;
        self
    }

    pub fn internal(mut self) -> Ident {
        self.internal = true;
        self
    }

    pub fn imported(mut self) -> Ident {
        self.imported = true;
        self
    }

    pub fn build(self) -> Rc<Ident> {
        Rc::new(self)
    }

    pub fn ty(&self) -> &Rc<Type> {
        self.ty
            .get()
            .unwrap_or_else(|| panic!("identifier {} has no resolved type", self.name))
    }

    pub fn raw_ty(&self) -> Option<&Rc<Type>> {
        self.ty.get()
    }

    pub fn set_ty(&self, ty: Rc<Type>) {
        if self.ty.set(ty).is_err() {
            panic!("identifier {} resolved twice", self.name);
        }
    }

    /// A generator-local copy with a substituted type, used when a hoisted
    /// interface type replaces an anonymous structural one.
    pub fn retyped(&self, ty: Rc<Type>) -> Rc<Ident> {
        let cell = OnceCell::new();
        cell.set(ty).ok();
        Rc::new(Ident {
            name: self.name.clone(),
            kind: self.kind,
            ty: cell,
            exported: self.exported,
            local: self.local,
            internal: self.internal,
            imported: self.imported,
        })
    }

    /// Declares a type identifier and, for record and pointer-to-record
    /// structures, names the record's type descriptor after it.
    pub fn type_decl(name: &str, ty: Rc<Type>) -> Rc<Ident> {
        let ident = Ident::new(name, IdentKind::Type).typed(ty).build();
        tie_desc_ident(&ident);
        ident
    }
}

/// First type declaration naming a record (directly, or through an inline
/// pointer) owns its descriptor name.
pub fn tie_desc_ident(ident: &Rc<Ident>) {
    match &**ident.ty() {
        Type::Record(r) => {
            r.ident.set(ident.clone()).ok();
        }
        Type::Pointer(p) => {
            if let Some(Type::Record(r)) = p.raw_base().map(|b| &**b) {
                r.ident.set(ident.clone()).ok();
            }
        }
        _ => {}
    }
}

impl std::fmt::Debug for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {}", self.kind, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// Real division; symmetric set difference on sets.
    Quot,
    Div,
    Mod,
    And,
    Or,
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    /// Arithmetic negation; set complement on sets.
    Neg,
    Not,
}

#[derive(Debug)]
pub enum Selector {
    Index(Expr),
    Field(String),
    Deref,
    /// Type guard `v(T)`; the target must be a declared type identifier.
    Guard(Rc<Ident>),
}

/// A base variable plus a chain of selectors.
#[derive(Debug)]
pub struct Designator {
    pub base: Rc<Ident>,
    pub selectors: Vec<Selector>,
    pub line: u32,
}

impl Designator {
    pub fn var(base: &Rc<Ident>, line: u32) -> Designator {
        Designator {
            base: base.clone(),
            selectors: Vec::new(),
            line,
        }
    }

    pub fn field(mut self, name: &str) -> Designator {
        self.selectors.push(Selector::Field(name.to_string()));
        self
    }

    pub fn index(mut self, exp: Expr) -> Designator {
        self.selectors.push(Selector::Index(exp));
        self
    }

    pub fn deref(mut self) -> Designator {
        self.selectors.push(Selector::Deref);
        self
    }

    pub fn guard(mut self, target: &Rc<Ident>) -> Designator {
        self.selectors.push(Selector::Guard(target.clone()));
        self
    }
}

#[derive(Debug)]
pub enum Expr {
    Int(i64),
    Real(f64),
    Str(String),
    Char(u8),
    Bool(bool),
    Nil,
    SetConst(i64),
    SetRange { lo: Box<Expr>, hi: Box<Expr> },
    SetElem(Box<Expr>),
    Desig(Designator),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    /// Dynamic type test `des IS target`.
    Is {
        des: Designator,
        target: Rc<Ident>,
    },
    Call {
        proc: Designator,
        args: Vec<Expr>,
    },
    Abs(Box<Expr>),
    Odd(Box<Expr>),
    Len(Box<Designator>),
    Lsl(Box<Expr>, Box<Expr>),
    Asr(Box<Expr>, Box<Expr>),
    Ror(Box<Expr>, Box<Expr>),
    Floor(Box<Expr>),
    Flt(Box<Expr>),
    Ord(Box<Expr>),
    Chr(Box<Expr>),
    Adr(Box<Expr>),
    Size(Rc<Ident>),
    Bit(Box<Expr>, Box<Expr>),
    Val(Rc<Ident>, Box<Expr>),
}

impl Expr {
    pub fn var(base: &Rc<Ident>, line: u32) -> Expr {
        Expr::Desig(Designator::var(base, line))
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }
}

pub enum CaseLabel {
    Int(i64),
    Char(u8),
}

pub struct LabelRange {
    pub lo: CaseLabel,
    pub hi: Option<CaseLabel>,
}

pub struct IntCase {
    pub labels: Vec<LabelRange>,
    pub body: Vec<Stmt>,
}

pub struct TypeCase {
    pub target: Rc<Ident>,
    pub body: Vec<Stmt>,
}

pub enum Stmt {
    Assign {
        target: Designator,
        value: Expr,
    },
    Call {
        proc: Designator,
        args: Vec<Expr>,
    },
    If {
        arms: Vec<(Expr, Vec<Stmt>)>,
        else_arm: Option<Vec<Stmt>>,
    },
    /// The first arm is the loop guard; further arms are the trailing
    /// ELSIF alternatives re-tested on every iteration.
    While {
        arms: Vec<(Expr, Vec<Stmt>)>,
    },
    Repeat {
        body: Vec<Stmt>,
        until: Expr,
    },
    For {
        var: Rc<Ident>,
        from: Expr,
        to: Expr,
        by: i64,
        body: Vec<Stmt>,
    },
    CaseInt {
        expr: Expr,
        arms: Vec<IntCase>,
        line: u32,
    },
    CaseType {
        des: Designator,
        arms: Vec<TypeCase>,
    },
    Inc {
        des: Designator,
        by: Option<Expr>,
    },
    Dec {
        des: Designator,
        by: Option<Expr>,
    },
    Incl {
        des: Designator,
        elem: Expr,
    },
    Excl {
        des: Designator,
        elem: Expr,
    },
    New {
        des: Designator,
    },
    Assert {
        cond: Expr,
        line: u32,
    },
    Pack {
        x: Designator,
        n: Expr,
    },
    Unpk {
        x: Designator,
        n: Designator,
    },
    SysGet {
        addr: Expr,
        des: Designator,
    },
    SysPut {
        addr: Expr,
        value: Expr,
    },
    SysCopy {
        src: Expr,
        dst: Expr,
        count: Expr,
    },
}

pub enum Decl {
    Const { ident: Rc<Ident>, value: Expr },
    Type(Rc<Ident>),
    /// One syntactic variable group sharing a type; export marks may differ
    /// per identifier.
    Var(Vec<Rc<Ident>>),
    Proc(ProcDecl),
}

pub struct ProcDecl {
    pub ident: Rc<Ident>,
    pub decls: Vec<Decl>,
    pub body: Vec<Stmt>,
    pub ret: Option<Expr>,
}

pub struct Import {
    pub module: String,
    pub dir: PathBuf,
}

impl Import {
    pub fn new(module: &str, dir: &str) -> Import {
        Import {
            module: module.to_string(),
            dir: PathBuf::from(dir),
        }
    }
}

/// One fully resolved module, declarations in source order.
pub struct Module {
    pub imports: Vec<Import>,
    pub decls: Vec<Decl>,
    pub body: Vec<Stmt>,
}

/// Convenience for parameter identifiers in procedure types.
pub fn value_param(name: &str, ty: Rc<Type>) -> Rc<Ident> {
    Ident::new(name, IdentKind::ValueParam)
        .typed(ty)
        .local()
        .build()
}

pub fn var_param(name: &str, ty: Rc<Type>) -> Rc<Ident> {
    Ident::new(name, IdentKind::VarParam)
        .typed(ty)
        .local()
        .build()
}

/// A procedure identifier with the given signature.
pub fn proc_ident(name: &str, params: Vec<Rc<Ident>>, result: Option<Rc<Type>>) -> Rc<Ident> {
    Ident::new(name, IdentKind::Proc)
        .typed(types::procedure(params, result))
        .build()
}
