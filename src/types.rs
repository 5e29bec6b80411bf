//! Resolved type model consumed by the generator.
//!
//! Types arrive fully resolved from the front end and are shared through
//! `Rc`. A pointer's base is tied through a `OnceCell` so self-referential
//! records can be closed after construction; reading an untied base is an
//! upstream-contract violation and panics.

use crate::ast::{Ident, IdentKind};
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

pub enum Type {
    Boolean,
    Char,
    Integer,
    Real,
    Byte,
    Set,
    /// The type of the NIL literal.
    Nil,
    /// The type of a character-string literal; `len` excludes the
    /// terminating NUL.
    String { len: usize },
    /// `len` is `None` for open arrays.
    Array { elem: Rc<Type>, len: Option<i64> },
    Record(RecordType),
    Pointer(PointerType),
    Procedure(ProcedureType),
    /// A reference to a declared type identifier.
    Named(Rc<Ident>),
}

pub struct RecordType {
    /// The identifier the record's type descriptor is named after: the
    /// declaring type identifier, or the declaring pointer identifier for a
    /// record declared inline in a pointer declaration.
    pub ident: OnceCell<Rc<Ident>>,
    pub base: Option<Rc<Type>>,
    pub fields: Vec<FieldList>,
}

/// One syntactic field group: identifiers sharing a type.
pub struct FieldList {
    pub idents: Vec<Rc<Ident>>,
}

pub struct PointerType {
    base: OnceCell<Rc<Type>>,
}

pub struct ProcedureType {
    pub params: Vec<Rc<Ident>>,
    pub result: Option<Rc<Type>>,
}

impl PointerType {
    pub fn base(&self) -> &Rc<Type> {
        self.base
            .get()
            .expect("pointer base type not resolved before generation")
    }

    pub fn raw_base(&self) -> Option<&Rc<Type>> {
        self.base.get()
    }

    /// Ties a forward-declared pointer to its base type.
    pub fn tie(&self, base: Rc<Type>) {
        if self.base.set(base).is_err() {
            panic!("pointer base type resolved twice");
        }
    }
}

impl Type {
    /// Resolves named-type references down to the structural type.
    pub fn structure(&self) -> &Type {
        match self {
            Type::Named(ident) => ident.ty().structure(),
            _ => self,
        }
    }

    /// Like [`Type::structure`], but returns a shared handle.
    pub fn structure_of(ty: &Rc<Type>) -> Rc<Type> {
        let mut t = ty.clone();
        loop {
            t = match &*t {
                Type::Named(ident) => ident.ty().clone(),
                _ => return t,
            };
        }
    }

    pub fn is_basic(&self) -> bool {
        matches!(
            self.structure(),
            Type::Boolean | Type::Char | Type::Integer | Type::Real | Type::Byte | Type::Set
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.structure(), Type::Integer | Type::Byte)
    }

    pub fn is_real(&self) -> bool {
        matches!(self.structure(), Type::Real)
    }

    pub fn is_char(&self) -> bool {
        matches!(self.structure(), Type::Char)
    }

    pub fn is_byte(&self) -> bool {
        matches!(self.structure(), Type::Byte)
    }

    pub fn is_set(&self) -> bool {
        matches!(self.structure(), Type::Set)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.structure(), Type::Nil)
    }

    pub fn is_string(&self) -> bool {
        matches!(self.structure(), Type::String { .. })
    }

    pub fn is_single_char_string(&self) -> bool {
        matches!(self.structure(), Type::String { len: 1 })
    }

    pub fn is_array(&self) -> bool {
        matches!(self.structure(), Type::Array { .. })
    }

    pub fn is_open_array(&self) -> bool {
        matches!(self.structure(), Type::Array { len: None, .. })
    }

    pub fn is_character_array(&self) -> bool {
        match self.structure() {
            Type::Array { elem, .. } => elem.is_char(),
            _ => false,
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(self.structure(), Type::Record(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.structure(), Type::Pointer(_))
    }

    pub fn is_procedure(&self) -> bool {
        matches!(self.structure(), Type::Procedure(_))
    }

    pub fn element_type(&self) -> &Rc<Type> {
        match self.structure() {
            Type::Array { elem, .. } => elem,
            _ => panic!("element type requested for a non-array type"),
        }
    }

    pub fn array_length(&self) -> Option<i64> {
        match self.structure() {
            Type::Array { len, .. } => *len,
            _ => panic!("array length requested for a non-array type"),
        }
    }

    pub fn record(&self) -> &RecordType {
        match self.structure() {
            Type::Record(r) => r,
            _ => panic!("record structure requested for a non-record type"),
        }
    }

    pub fn pointer_base(&self) -> &Rc<Type> {
        match self.structure() {
            Type::Pointer(p) => p.base(),
            _ => panic!("pointer base requested for a non-pointer type"),
        }
    }

    pub fn procedure(&self) -> &ProcedureType {
        match self.structure() {
            Type::Procedure(p) => p,
            _ => panic!("procedure structure requested for a non-procedure type"),
        }
    }

    /// The record structure behind a record or pointer-to-record type.
    pub fn record_of(&self) -> Option<&RecordType> {
        match self.structure() {
            Type::Record(r) => Some(r),
            Type::Pointer(p) => match p.base().structure() {
                Type::Record(r) => Some(r),
                _ => None,
            },
            _ => None,
        }
    }

    /// Distance from the extension lattice root; a root record has level 0.
    /// Pointer types share their pointee's level.
    pub fn extension_level(&self) -> i32 {
        let rec = self
            .record_of()
            .expect("extension level requested for a type outside the record lattice");
        match &rec.base {
            Some(base) => base.extension_level() + 1,
            None => 0,
        }
    }

    /// Name equivalence as the generator needs it: identical structure
    /// handles, matching basic types, or pointers to the same record.
    pub fn same(&self, other: &Type) -> bool {
        let a = self.structure();
        let b = other.structure();
        if std::ptr::eq(a, b) {
            return true;
        }
        match (a, b) {
            (Type::Boolean, Type::Boolean)
            | (Type::Char, Type::Char)
            | (Type::Integer, Type::Integer)
            | (Type::Real, Type::Real)
            | (Type::Byte, Type::Byte)
            | (Type::Set, Type::Set)
            | (Type::Nil, Type::Nil) => true,
            (Type::Pointer(p), Type::Pointer(q)) => {
                std::ptr::eq(p.base().structure(), q.base().structure())
            }
            _ => false,
        }
    }

    /// True iff `other` is this type or one of its ancestors on the
    /// extension chain. Siblings sharing an ancestor do not extend each
    /// other.
    pub fn extends(&self, other: &Type) -> bool {
        let (Some(mut rec), Some(target)) = (self.record_of(), other.record_of()) else {
            return false;
        };
        loop {
            if std::ptr::eq(rec, target) {
                return true;
            }
            match &rec.base {
                Some(base) => match base.record_of() {
                    Some(r) => rec = r,
                    None => return false,
                },
                None => return false,
            }
        }
    }
}

impl RecordType {
    pub fn desc_ident(&self) -> &Rc<Ident> {
        self.ident
            .get()
            .expect("record type used dynamically but never declared")
    }

    pub fn has_desc_ident(&self) -> bool {
        self.ident.get().is_some()
    }

    /// Searches this record and its ancestors for a field. Returns the field
    /// identifier and the record type that declares it.
    pub fn find_field(rec: &Rc<Type>, name: &str) -> Option<(Rc<Ident>, Rc<Type>)> {
        let mut cur = Type::structure_of(rec);
        loop {
            let Type::Record(r) = &*cur else {
                panic!("field {name} selected from a non-record type");
            };
            for group in &r.fields {
                for field in &group.idents {
                    if field.name == name {
                        return Some((field.clone(), cur.clone()));
                    }
                }
            }
            let base = r.base.clone();
            match base {
                Some(b) => cur = Type::structure_of(&b),
                None => return None,
            }
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Boolean => write!(f, "BOOLEAN"),
            Type::Char => write!(f, "CHAR"),
            Type::Integer => write!(f, "INTEGER"),
            Type::Real => write!(f, "REAL"),
            Type::Byte => write!(f, "BYTE"),
            Type::Set => write!(f, "SET"),
            Type::Nil => write!(f, "NIL"),
            Type::String { len } => write!(f, "STRING({len})"),
            Type::Array { len, .. } => match len {
                Some(n) => write!(f, "ARRAY {n}"),
                None => write!(f, "ARRAY *"),
            },
            Type::Record(r) => match r.ident.get() {
                Some(id) => write!(f, "RECORD {}", id.name),
                None => write!(f, "RECORD"),
            },
            Type::Pointer(_) => write!(f, "POINTER"),
            Type::Procedure(_) => write!(f, "PROCEDURE"),
            Type::Named(id) => write!(f, "{}", id.name),
        }
    }
}

pub fn boolean() -> Rc<Type> {
    Rc::new(Type::Boolean)
}

pub fn character() -> Rc<Type> {
    Rc::new(Type::Char)
}

pub fn integer() -> Rc<Type> {
    Rc::new(Type::Integer)
}

pub fn real() -> Rc<Type> {
    Rc::new(Type::Real)
}

pub fn byte() -> Rc<Type> {
    Rc::new(Type::Byte)
}

pub fn set() -> Rc<Type> {
    Rc::new(Type::Set)
}

pub fn nil() -> Rc<Type> {
    Rc::new(Type::Nil)
}

pub fn string(len: usize) -> Rc<Type> {
    Rc::new(Type::String { len })
}

pub fn array(len: i64, elem: Rc<Type>) -> Rc<Type> {
    Rc::new(Type::Array {
        elem,
        len: Some(len),
    })
}

pub fn open_array(elem: Rc<Type>) -> Rc<Type> {
    Rc::new(Type::Array { elem, len: None })
}

pub fn record(base: Option<Rc<Type>>, fields: Vec<FieldList>) -> Rc<Type> {
    Rc::new(Type::Record(RecordType {
        ident: OnceCell::new(),
        base,
        fields,
    }))
}

pub fn fields(idents: Vec<Rc<Ident>>) -> FieldList {
    FieldList { idents }
}

/// One field group from name/type pairs, for the common single-ident case.
pub fn field(name: &str, ty: Rc<Type>) -> FieldList {
    FieldList {
        idents: vec![Ident::new(name, IdentKind::Field).typed(ty).build()],
    }
}

pub fn pointer_to(base: Rc<Type>) -> Rc<Type> {
    let cell = OnceCell::new();
    cell.set(base).ok();
    Rc::new(Type::Pointer(PointerType { base: cell }))
}

/// A pointer whose base is tied later, for self-referential records.
pub fn forward_pointer() -> Rc<Type> {
    Rc::new(Type::Pointer(PointerType {
        base: OnceCell::new(),
    }))
}

pub fn procedure(params: Vec<Rc<Ident>>, result: Option<Rc<Type>>) -> Rc<Type> {
    Rc::new(Type::Procedure(ProcedureType { params, result }))
}

pub fn named(ident: &Rc<Ident>) -> Rc<Type> {
    Rc::new(Type::Named(ident.clone()))
}
