//! External AST provider.
//!
//! Runs `clang++ -fsyntax-only -Xclang -ast-dump=json` over one header and
//! lowers the JSON dump into the `ast` declaration model. Compiler stderr is
//! carried back as non-fatal diagnostics; a hard parse failure (no JSON at
//! all) is an error for the caller to surface.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::ast::{Decl, DeclKind, ParsedHeader};

pub fn parse_header(header: &Path, include_args: &[String], verbose: bool) -> Result<ParsedHeader> {
    let mut cmd = Command::new("clang++");
    cmd.arg("-std=c++17")
        .arg("-fsyntax-only")
        .arg("-Xclang")
        .arg("-ast-dump=json");
    if verbose {
        cmd.arg("-v");
    }
    if let Ok(cwd) = std::env::current_dir() {
        cmd.arg(format!("-isysroot{}", cwd.display()));
    }
    cmd.args(include_args);
    cmd.arg(header);

    let output = cmd
        .output()
        .with_context(|| format!("failed to run clang++ on {}", header.display()))?;

    let diagnostics: Vec<String> = String::from_utf8_lossy(&output.stderr)
        .lines()
        .map(str::to_string)
        .collect();

    let tree: Value = serde_json::from_slice(&output.stdout)
        .with_context(|| format!("clang++ produced no AST for {}", header.display()))?;

    let mut lowerer = Lowerer { current_file: None };
    let root = lowerer.lower(&tree);
    Ok(ParsedHeader { root, diagnostics })
}

/// Lowers clang's JSON nodes into `Decl`s.
///
/// The dump omits `loc.file` whenever it matches the previous node in
/// pre-order, so the lowerer carries the last seen file along.
struct Lowerer {
    current_file: Option<String>,
}

impl Lowerer {
    fn lower(&mut self, node: &Value) -> Decl {
        if let Some(file) = node
            .pointer("/loc/file")
            .or_else(|| node.pointer("/loc/expansionLoc/file"))
            .and_then(Value::as_str)
        {
            self.current_file = Some(file.to_string());
        }

        let clang_kind = node.pointer("/kind").and_then(Value::as_str).unwrap_or("");
        let kind = match clang_kind {
            "TranslationUnitDecl" => DeclKind::Other,
            "NamespaceDecl" => DeclKind::Namespace,
            "CXXRecordDecl" => match node.pointer("/tagUsed").and_then(Value::as_str) {
                Some("struct") => DeclKind::Struct,
                Some("class") => DeclKind::Class,
                _ => DeclKind::Other,
            },
            "EnumDecl" => DeclKind::Enum,
            "TypeAliasDecl" => DeclKind::TypeAlias,
            "FieldDecl" => DeclKind::Field,
            "EnumConstantDecl" => DeclKind::EnumConstant,
            _ => DeclKind::Other,
        };

        let name = node.pointer("/name").and_then(Value::as_str).unwrap_or("").to_string();

        let mut decl = Decl::new(kind, name);
        // the translation unit itself has no location and is always walked
        if clang_kind != "TranslationUnitDecl" {
            decl.file = self.current_file.clone();
        }

        match kind {
            DeclKind::Field => decl.canonical_type = canonical_type(node),
            DeclKind::Enum => {
                // unfixed enums default to int
                decl.canonical_type = node
                    .pointer("/fixedUnderlyingType")
                    .and_then(canonical_of_type)
                    .or_else(|| Some("int".to_string()));
            }
            DeclKind::EnumConstant => decl.value = find_constant_value(node),
            DeclKind::TypeAlias => {
                // surface the alias target as a type-reference child, the
                // way a cursor-level walk would see it
                if let Some(target) = canonical_type(node) {
                    decl.children.push(Decl::new(DeclKind::TypeRef, target));
                }
            }
            _ => {}
        }

        if let Some(inner) = node.pointer("/inner").and_then(Value::as_array) {
            for child in inner {
                decl.children.push(self.lower(child));
            }
        }

        if kind == DeclKind::Enum {
            assign_implicit_enum_values(&mut decl.children);
        }

        decl
    }
}

fn canonical_type(node: &Value) -> Option<String> {
    node.pointer("/type").and_then(canonical_of_type)
}

/// A type object's canonical spelling: the desugared form when the dump
/// provides one, the written form otherwise.
fn canonical_of_type(ty: &Value) -> Option<String> {
    ty.pointer("/desugaredQualType")
        .or_else(|| ty.pointer("/qualType"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// The evaluated value buried under an `EnumConstantDecl`, at any depth.
fn find_constant_value(node: &Value) -> Option<i64> {
    if let Some(value) = node.pointer("/value") {
        if let Some(n) = value.as_i64() {
            return Some(n);
        }
        if let Some(s) = value.as_str() {
            if let Ok(n) = s.parse::<i64>() {
                return Some(n);
            }
        }
    }
    node.pointer("/inner")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find_map(find_constant_value)
}

/// C++ enumerators without an initializer take the previous value plus one.
fn assign_implicit_enum_values(children: &mut [Decl]) {
    let mut last = -1i64;
    for child in children.iter_mut() {
        if child.kind != DeclKind::EnumConstant {
            continue;
        }
        match child.value {
            Some(v) => last = v,
            None => {
                last += 1;
                child.value = Some(last);
            }
        }
    }
}

// -------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lower(v: &Value) -> Decl {
        Lowerer { current_file: None }.lower(v)
    }

    #[test]
    fn lowers_records_fields_and_namespaces() {
        let dump = json!({
            "kind": "TranslationUnitDecl",
            "inner": [{
                "kind": "NamespaceDecl",
                "name": "couchbase",
                "loc": {"file": "core/columnar/query_options.hxx", "line": 1},
                "inner": [{
                    "kind": "CXXRecordDecl",
                    "name": "query_options",
                    "tagUsed": "struct",
                    "inner": [{
                        "kind": "FieldDecl",
                        "name": "statement",
                        "type": {
                            "qualType": "std::string",
                            "desugaredQualType": "std::string"
                        }
                    }]
                }]
            }]
        });

        let root = lower(&dump);
        assert_eq!(root.kind, DeclKind::Other);
        assert!(root.file.is_none());

        let ns = &root.children[0];
        assert_eq!(ns.kind, DeclKind::Namespace);
        assert_eq!(ns.name, "couchbase");
        assert_eq!(ns.file.as_deref(), Some("core/columnar/query_options.hxx"));

        let record = &ns.children[0];
        assert_eq!(record.kind, DeclKind::Struct);
        // file is sticky: omitted location means "same file as before"
        assert_eq!(record.file.as_deref(), Some("core/columnar/query_options.hxx"));

        let field = &record.children[0];
        assert_eq!(field.kind, DeclKind::Field);
        assert_eq!(field.canonical_type.as_deref(), Some("std::string"));
    }

    #[test]
    fn sticky_file_updates_when_the_dump_changes_files() {
        let dump = json!({
            "kind": "TranslationUnitDecl",
            "inner": [
                {
                    "kind": "CXXRecordDecl",
                    "name": "pulled_in",
                    "tagUsed": "struct",
                    "loc": {"file": "couchbase/other.hxx"}
                },
                {
                    "kind": "CXXRecordDecl",
                    "name": "own",
                    "tagUsed": "struct",
                    "loc": {"file": "couchbase/main.hxx"}
                },
                {
                    "kind": "CXXRecordDecl",
                    "name": "own_too",
                    "tagUsed": "struct"
                }
            ]
        });

        let root = lower(&dump);
        assert_eq!(root.children[0].file.as_deref(), Some("couchbase/other.hxx"));
        assert_eq!(root.children[1].file.as_deref(), Some("couchbase/main.hxx"));
        assert_eq!(root.children[2].file.as_deref(), Some("couchbase/main.hxx"));
    }

    #[test]
    fn enum_values_come_from_constant_exprs_or_increment() {
        let dump = json!({
            "kind": "EnumDecl",
            "name": "errc",
            "fixedUnderlyingType": {"qualType": "int"},
            "inner": [
                {
                    "kind": "EnumConstantDecl",
                    "name": "generic",
                    "inner": [{"kind": "ConstantExpr", "value": "1"}]
                },
                {"kind": "EnumConstantDecl", "name": "invalid_credential"},
                {"kind": "EnumConstantDecl", "name": "timeout"},
                {
                    "kind": "EnumConstantDecl",
                    "name": "aliased",
                    "inner": [{"kind": "ConstantExpr", "value": "10"}]
                }
            ]
        });

        let root = lower(&dump);
        assert_eq!(root.kind, DeclKind::Enum);
        assert_eq!(root.canonical_type.as_deref(), Some("int"));
        let values: Vec<i64> = root.children.iter().filter_map(|c| c.value).collect();
        assert_eq!(values, vec![1, 2, 3, 10]);
    }

    #[test]
    fn alias_targets_become_type_ref_children() {
        let dump = json!({
            "kind": "TypeAliasDecl",
            "name": "upsert_request_with_legacy_durability",
            "type": {
                "qualType": "upsert_request",
                "desugaredQualType": "struct couchbase::core::ops::upsert_request"
            }
        });

        let root = lower(&dump);
        assert_eq!(root.kind, DeclKind::TypeAlias);
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].kind, DeclKind::TypeRef);
        assert_eq!(root.children[0].name, "struct couchbase::core::ops::upsert_request");
    }

    #[test]
    fn class_tag_maps_to_class_kind() {
        let dump = json!({
            "kind": "CXXRecordDecl",
            "name": "json_string",
            "tagUsed": "class"
        });
        assert_eq!(lower(&dump).kind, DeclKind::Class);
    }
}
