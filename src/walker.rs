//! Depth-first walk of a parsed header's declaration tree.
//!
//! Accumulates struct and enum descriptors for every declaration that passes
//! the inclusion predicate, scoped to the file being processed. The scope
//! path is an immutable slice extended per call, and the anonymous-struct
//! registry is explicit state owned by the walker, so sibling subtrees never
//! leak into each other.

use indexmap::IndexSet;

use crate::ast::{Decl, DeclKind};
use crate::config::{ScanConfig, UNNAMED_MARKER, UNNAMED_STRUCT_DELIM};
use crate::descriptor::{
    EnumDescriptor, EnumValue, FieldDescriptor, OutputDocument, StructDescriptor, TypeDescriptor,
};
use crate::diag::Diagnostics;
use crate::normalize::normalize;

/// How the two historical silent drops behave: `Lenient` keeps them silent,
/// `Strict` records them as run-failing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Lenient,
    Strict,
}

pub struct Walker<'a> {
    scan: &'a ScanConfig,
    mode: Mode,
    structs: Vec<StructDescriptor>,
    enums: Vec<EnumDescriptor>,
    /// Names synthesized for anonymous nested structs, in discovery order;
    /// consulted when the anonymous declaration itself is reached later.
    registry: IndexSet<String>,
}

impl<'a> Walker<'a> {
    pub fn new(scan: &'a ScanConfig, mode: Mode) -> Self {
        Self {
            scan,
            mode,
            structs: Vec::new(),
            enums: Vec::new(),
            registry: IndexSet::new(),
        }
    }

    pub fn into_document(self) -> OutputDocument {
        OutputDocument { op_structs: self.structs, op_enums: self.enums }
    }

    pub fn walk_header(&mut self, root: &Decl, main_file: &str, diag: &mut Diagnostics) {
        self.traverse(root, &[], main_file, diag);
    }

    fn traverse(&mut self, node: &Decl, namespace: &[String], main_file: &str, diag: &mut Diagnostics) {
        // declarations pulled in from other headers are skipped wholesale
        if let Some(file) = &node.file {
            if file != main_file {
                return;
            }
        }

        match node.kind {
            DeclKind::Struct | DeclKind::Class => self.visit_struct(node, namespace, diag),
            DeclKind::TypeAlias => self.visit_alias(node, namespace, diag),
            DeclKind::Enum => self.visit_enum(node, namespace, diag),
            _ => {}
        }

        // containers extend the scope path whether or not they matched;
        // unmatched outer types must still be traversed to reach matched
        // nested members
        let extended;
        let child_namespace = match node.kind {
            DeclKind::Namespace | DeclKind::Class | DeclKind::Struct => {
                let mut path = namespace.to_vec();
                path.push(node.name.clone());
                extended = path;
                extended.as_slice()
            }
            _ => namespace,
        };

        for child in &node.children {
            self.traverse(child, child_namespace, main_file, diag);
        }
    }

    fn visit_struct(&mut self, node: &Decl, namespace: &[String], diag: &mut Diagnostics) {
        let mut full_name = qualified_name(namespace, &node.name);

        // anonymous structs surface as a trailing `::` or an unnamed-marker
        // segment; resolve them against names synthesized earlier in the run
        if full_name.ends_with("::") || full_name.contains(UNNAMED_STRUCT_DELIM) {
            let prefix = if full_name.ends_with("::") {
                full_name.clone()
            } else {
                full_name
                    .split(UNNAMED_STRUCT_DELIM)
                    .next()
                    .unwrap_or_default()
                    .to_string()
            };
            if let Some(registered) = self.registry.iter().find(|name| name.contains(&prefix)) {
                full_name = registered.clone();
            }
        }

        if !(self.scan.is_included(&full_name) || self.registry.contains(&full_name)) {
            return;
        }

        let mut fields = Vec::new();
        for child in &node.children {
            if child.kind != DeclKind::Field {
                continue;
            }
            let spelling = child.canonical_type.as_deref().unwrap_or_default();
            let mut ty = normalize(spelling, diag);
            if spelling.contains(UNNAMED_MARKER) {
                // synthesize a stable qualified name for the anonymous nested
                // type from its spelling plus the field name, and remember it
                // so the type's own declaration resolves to the same name
                let mut parts: Vec<&str> = spelling.split("::").collect();
                parts.pop();
                parts.push(&child.name);
                let synthesized = parts.join("::");
                ty = TypeDescriptor::Named { name: synthesized.clone() };
                self.registry.insert(synthesized);
            }
            fields.push(FieldDescriptor { name: child.name.clone(), ty });
        }

        // first descriptor under a name wins
        if self.structs.iter().any(|s| s.name == full_name) {
            if self.mode == Mode::Strict {
                diag.error(format!("duplicate struct descriptor dropped: {full_name}"));
            }
            return;
        }

        self.structs.push(StructDescriptor { name: full_name, fields });
    }

    fn visit_alias(&mut self, node: &Decl, namespace: &[String], diag: &mut Diagnostics) {
        let alias_name = qualified_name(namespace, &node.name);
        if !self.scan.is_included_alias(&alias_name) {
            return;
        }
        let Some(type_ref) = node.children.iter().find(|c| c.kind == DeclKind::TypeRef) else {
            return;
        };
        let base_name = type_ref.name.replace("struct", "").trim().to_string();
        let base_fields = self
            .structs
            .iter()
            .find(|s| s.name == base_name)
            .map(|s| s.fields.clone());
        let Some(base_fields) = base_fields else {
            if self.mode == Mode::Strict {
                diag.error(format!(
                    "legacy-durability alias {alias_name} has no base struct {base_name}"
                ));
            }
            return;
        };

        // the legacy shape trades the single durability level for explicit
        // persistence and replication counts
        let mut fields: Vec<FieldDescriptor> = base_fields
            .into_iter()
            .filter(|f| f.name != "durability_level")
            .collect();
        fields.push(FieldDescriptor {
            name: "persist_to".into(),
            ty: TypeDescriptor::Named { name: "couchbase::persist_to".into() },
        });
        fields.push(FieldDescriptor {
            name: "replicate_to".into(),
            ty: TypeDescriptor::Named { name: "couchbase::replicate_to".into() },
        });
        self.structs.push(StructDescriptor { name: alias_name, fields });
    }

    fn visit_enum(&mut self, node: &Decl, namespace: &[String], diag: &mut Diagnostics) {
        let full_name = qualified_name(namespace, &node.name);
        if !self.scan.is_included(&full_name) {
            return;
        }
        let underlying = normalize(node.canonical_type.as_deref().unwrap_or_default(), diag);
        let values = node
            .children
            .iter()
            .filter(|c| c.kind == DeclKind::EnumConstant)
            .map(|c| EnumValue { name: c.name.clone(), value: c.value.unwrap_or_default() })
            .collect();
        self.enums.push(EnumDescriptor { name: full_name, ty: underlying, values });
    }
}

fn qualified_name(namespace: &[String], name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", namespace.join("::"), name)
    }
}

// -------------------------------- Tests ------------------------------------ //
