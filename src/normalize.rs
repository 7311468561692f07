//! Canonical type spelling → portable shape descriptor.
//!
//! Pure classification over the AST layer's fully-resolved type spellings.
//! Total: every input yields some descriptor, degrading to `Unknown` plus a
//! recorded diagnostic instead of failing. Dispatch is ordered, first match
//! wins:
//! 1. exact table of built-in/standard spellings,
//! 2. exact set of ordering comparators,
//! 3. template dispatch on the text before the first `<`,
//! 4. foreign (non-project) spellings → `Unknown`,
//! 5. project spellings kept verbatim as `Named`.

use once_cell::sync::Lazy;

use crate::config::{PROJECT_NS_PREFIX, UNNAMED_STRUCT_DELIM};
use crate::descriptor::TypeDescriptor;
use crate::diag::Diagnostics;

const STD_COMPARATOR_TEMPLATES: &[&str] =
    &["std::less", "std::greater", "std::less_equal", "std::greater_equal"];

/// Every comparator template in its bare and type-erased instantiation.
static STD_COMPARATORS: Lazy<Vec<String>> = Lazy::new(|| {
    STD_COMPARATOR_TEMPLATES
        .iter()
        .flat_map(|template| ["", "void"].iter().map(move |arg| format!("{template}<{arg}>")))
        .collect()
});

pub fn normalize(spelling: &str, diag: &mut Diagnostics) -> TypeDescriptor {
    if let Some(name) = primitive_name(spelling) {
        return TypeDescriptor::Primitive { name };
    }

    if STD_COMPARATORS.iter().any(|c| c == spelling) {
        // the type-erased instantiation collapses onto the bare one
        let name = if spelling.contains("void") {
            spelling.replace("void", "")
        } else {
            spelling.to_string()
        };
        return TypeDescriptor::Comparator { name };
    }

    if let Some((template, args)) = split_template(spelling) {
        match template {
            // callable fields are opaque; the signature is not needed downstream
            "std::function" => return TypeDescriptor::Function,
            "std::optional" => {
                return TypeDescriptor::Optional { of: Box::new(normalize(args, diag)) };
            }
            "std::vector" => {
                return TypeDescriptor::Sequence { of: Box::new(normalize(args, diag)) };
            }
            "std::set" => {
                return TypeDescriptor::Set { of: Box::new(normalize(args, diag)) };
            }
            "std::shared_ptr" => {
                return TypeDescriptor::SharedHandle { of: Box::new(normalize(args, diag)) };
            }
            "std::variant" => {
                let of = split_top_level_args(args)
                    .into_iter()
                    .map(|arg| normalize(arg, diag))
                    .collect();
                return TypeDescriptor::Variant { of };
            }
            "std::array" => {
                let parts = split_top_level_args(args);
                if parts.len() != 2 {
                    diag.warn(format!("failed to parse array arguments: {spelling}"));
                    return TypeDescriptor::Unknown { str_: spelling.to_string() };
                }
                let Ok(size) = parts[1].parse::<u64>() else {
                    diag.warn(format!("failed to parse array size: {spelling}"));
                    return TypeDescriptor::Unknown { str_: spelling.to_string() };
                };
                return TypeDescriptor::Array { of: Box::new(normalize(parts[0], diag)), size };
            }
            "std::map" => {
                let parts = split_top_level_args(args);
                if parts.len() < 2 || parts.len() > 3 {
                    diag.warn(format!("failed to parse map arguments: {spelling}"));
                    return TypeDescriptor::Unknown { str_: spelling.to_string() };
                }
                let comparator = parts.get(2).map(|cmp| Box::new(normalize(cmp, diag)));
                return TypeDescriptor::OrderedMap {
                    of: Box::new(normalize(parts[0], diag)),
                    to: Box::new(normalize(parts[1], diag)),
                    comparator,
                };
            }
            // unrecognized templates fall through to the namespace check
            _ => {}
        }
    }

    if !spelling.starts_with(PROJECT_NS_PREFIX) {
        diag.warn(format!("unrecognized type spelling: {spelling}"));
        return TypeDescriptor::Unknown { str_: spelling.to_string() };
    }

    if spelling.contains(UNNAMED_STRUCT_DELIM) {
        diag.warn(format!("anonymous struct spelling kept verbatim: {spelling}"));
    }

    // project-defined type; downstream resolves it by name against the
    // struct/enum descriptor tables
    TypeDescriptor::Named { name: spelling.to_string() }
}

/// `head<args>` → `(head, args)` for a spelling with a balanced outer
/// template-argument list.
fn split_template(spelling: &str) -> Option<(&str, &str)> {
    let open = spelling.find('<')?;
    let inner = spelling[open + 1..].strip_suffix('>')?;
    Some((&spelling[..open], inner))
}

/// Split a template argument list on commas outside any nested `<...>`, so
/// arguments that are themselves templates stay whole.
fn split_top_level_args(args: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, b) in args.bytes().enumerate() {
        match b {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                out.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(args[start..].trim());
    out
}

/// Exact-match table of built-in and standard spellings. First stop of the
/// normalizer; the duration spellings must be caught here, before the
/// template dispatch would misread them.
fn primitive_name(spelling: &str) -> Option<&'static str> {
    let name = match spelling {
        "std::mutex" => "std::mutex",
        "std::string" => "std::string",
        "std::chrono::duration<long long>" => "std::chrono::seconds",
        "std::chrono::duration<long long, std::ratio<1, 1000>>" => "std::chrono::milliseconds",
        "std::chrono::duration<long long, std::ratio<1, 1000000>>" => "std::chrono::microseconds",
        "std::chrono::duration<long long, std::ratio<1, 1000000000>>" => {
            "std::chrono::nanoseconds"
        }
        "std::error_code" => "std::error_code",
        "std::monostate" => "std::monostate",
        "std::byte" => "std::byte",
        "unsigned long" => "std::size_t",
        "char" => "std::int8_t",
        "unsigned char" => "std::uint8_t",
        "short" => "std::int16_t",
        "unsigned short" => "std::uint16_t",
        "int" => "std::int32_t",
        "unsigned int" => "std::uint32_t",
        "long long" => "std::int64_t",
        "unsigned long long" => "std::uint64_t",
        "bool" => "std::bool",
        "float" => "std::float",
        "double" => "std::double",
        "std::nullptr_t" => "std::nullptr_t",
        _ => return None,
    };
    Some(name)
}

// -------------------------------- Tests ------------------------------------ //
