//! Declaration-tree model.
//!
//! The seam between the AST provider and the walker: a provider lowers
//! whatever the compiler hands back into this shape, and the walker never
//! sees anything else. Kinds outside this set are carried as `Other` so the
//! traversal can still descend through them.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Namespace,
    Struct,
    Class,
    Enum,
    TypeAlias,
    Field,
    EnumConstant,
    TypeRef,
    Other,
}

/// One node of a parsed header's declaration tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decl {
    pub kind: DeclKind,
    /// Display name; empty for anonymous declarations.
    pub name: String,
    /// Fully-resolved source file, when the node has a location.
    pub file: Option<String>,
    /// Canonical type spelling: the field type for fields, the underlying
    /// integer type for enums.
    pub canonical_type: Option<String>,
    /// Enumerator value.
    pub value: Option<i64>,
    pub children: Vec<Decl>,
}

impl Decl {
    pub fn new(kind: DeclKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            file: None,
            canonical_type: None,
            value: None,
            children: Vec::new(),
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_type(mut self, spelling: impl Into<String>) -> Self {
        self.canonical_type = Some(spelling.into());
        self
    }

    pub fn with_value(mut self, value: i64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_children(mut self, children: Vec<Decl>) -> Self {
        self.children = children;
        self
    }
}

/// What one parse of a header produces: the tree plus any compiler
/// diagnostics, which are surfaced but never halt the run.
#[derive(Debug, Clone)]
pub struct ParsedHeader {
    pub root: Decl,
    pub diagnostics: Vec<String>,
}
