// Strongly-typed descriptor model for the emitted bindings document.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Recursive shape encoding of one C++ type, reduced to a closed vocabulary.
///
/// The serialized form is the wire contract with the downstream binding
/// generator: every node is a JSON object with a `name` key plus kind-specific
/// payload (`of`, `to`, `comparator`, `size`, `str`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDescriptor {
    /// Built-in / standard spelling mapped to a portable name.
    Primitive { name: &'static str },
    /// Project-defined type, kept verbatim; resolved by name downstream.
    Named { name: String },
    /// Ordering comparator (`std::less<>` and friends).
    Comparator { name: String },
    Optional { of: Box<TypeDescriptor> },
    Sequence { of: Box<TypeDescriptor> },
    Set { of: Box<TypeDescriptor> },
    SharedHandle { of: Box<TypeDescriptor> },
    Array { of: Box<TypeDescriptor>, size: u64 },
    OrderedMap {
        of: Box<TypeDescriptor>,
        to: Box<TypeDescriptor>,
        comparator: Option<Box<TypeDescriptor>>,
    },
    /// Alternatives in declared order; order is the discriminant mapping.
    Variant { of: Vec<TypeDescriptor> },
    /// Opaque callable; the signature is not part of the contract.
    Function,
    /// Spelling we could not classify. Kept verbatim for diagnostics,
    /// never silently dropped.
    Unknown { str_: String },
}

impl Serialize for TypeDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use TypeDescriptor::*;
        match self {
            Primitive { name } => {
                let mut m = serializer.serialize_map(Some(1))?;
                m.serialize_entry("name", name)?;
                m.end()
            }
            Named { name } | Comparator { name } => {
                let mut m = serializer.serialize_map(Some(1))?;
                m.serialize_entry("name", name)?;
                m.end()
            }
            Optional { of } => one_child(serializer, "std::optional", of),
            Sequence { of } => one_child(serializer, "std::vector", of),
            Set { of } => one_child(serializer, "std::set", of),
            SharedHandle { of } => one_child(serializer, "std::shared_ptr", of),
            Array { of, size } => {
                let mut m = serializer.serialize_map(Some(3))?;
                m.serialize_entry("name", "std::array")?;
                m.serialize_entry("of", of)?;
                m.serialize_entry("size", size)?;
                m.end()
            }
            OrderedMap { of, to, comparator } => {
                let len = if comparator.is_some() { 4 } else { 3 };
                let mut m = serializer.serialize_map(Some(len))?;
                m.serialize_entry("name", "std::map")?;
                m.serialize_entry("of", of)?;
                m.serialize_entry("to", to)?;
                if let Some(cmp) = comparator {
                    m.serialize_entry("comparator", cmp)?;
                }
                m.end()
            }
            Variant { of } => {
                let mut m = serializer.serialize_map(Some(2))?;
                m.serialize_entry("name", "std::variant")?;
                m.serialize_entry("of", of)?;
                m.end()
            }
            Function => {
                let mut m = serializer.serialize_map(Some(1))?;
                m.serialize_entry("name", "std::function")?;
                m.end()
            }
            Unknown { str_ } => {
                let mut m = serializer.serialize_map(Some(2))?;
                m.serialize_entry("name", "unknown")?;
                m.serialize_entry("str", str_)?;
                m.end()
            }
        }
    }
}

fn one_child<S: Serializer>(
    serializer: S,
    name: &str,
    of: &TypeDescriptor,
) -> Result<S::Ok, S::Error> {
    let mut m = serializer.serialize_map(Some(2))?;
    m.serialize_entry("name", name)?;
    m.serialize_entry("of", of)?;
    m.end()
}

/// One struct field; built once at traversal time, immutable after.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
}

/// One exported struct/class, keyed by fully-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StructDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EnumValue {
    pub name: String,
    pub value: i64,
}

/// One exported enum: underlying integer shape plus enumerators in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EnumDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    pub values: Vec<EnumValue>,
}

/// The single artifact of a run. Append-only while walking; serialized once.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct OutputDocument {
    pub op_structs: Vec<StructDescriptor>,
    pub op_enums: Vec<EnumDescriptor>,
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::TypeDescriptor::*;
    use super::*;
    use serde_json::json;

    fn to_value(d: &TypeDescriptor) -> serde_json::Value {
        serde_json::to_value(d).unwrap()
    }

    #[test]
    fn leaf_kinds_serialize_to_name_only() {
        assert_eq!(
            to_value(&Primitive { name: "std::int64_t" }),
            json!({"name": "std::int64_t"})
        );
        assert_eq!(
            to_value(&Named { name: "couchbase::retry_reason".into() }),
            json!({"name": "couchbase::retry_reason"})
        );
        assert_eq!(
            to_value(&Comparator { name: "std::less<>".into() }),
            json!({"name": "std::less<>"})
        );
        assert_eq!(to_value(&Function), json!({"name": "std::function"}));
    }

    #[test]
    fn wrappers_carry_their_child_under_of() {
        let inner = Primitive { name: "std::string" };
        assert_eq!(
            to_value(&Optional { of: Box::new(inner.clone()) }),
            json!({"name": "std::optional", "of": {"name": "std::string"}})
        );
        assert_eq!(
            to_value(&Sequence { of: Box::new(inner.clone()) }),
            json!({"name": "std::vector", "of": {"name": "std::string"}})
        );
        assert_eq!(
            to_value(&Set { of: Box::new(inner.clone()) }),
            json!({"name": "std::set", "of": {"name": "std::string"}})
        );
        assert_eq!(
            to_value(&SharedHandle { of: Box::new(inner) }),
            json!({"name": "std::shared_ptr", "of": {"name": "std::string"}})
        );
    }

    #[test]
    fn array_keeps_fixed_size() {
        let d = Array { of: Box::new(Primitive { name: "std::byte" }), size: 16 };
        assert_eq!(
            to_value(&d),
            json!({"name": "std::array", "of": {"name": "std::byte"}, "size": 16})
        );
    }

    #[test]
    fn map_comparator_key_is_optional() {
        let key = Box::new(Primitive { name: "std::string" });
        let value = Box::new(Primitive { name: "std::string" });
        let two = OrderedMap { of: key.clone(), to: value.clone(), comparator: None };
        let v = to_value(&two);
        assert!(v.get("comparator").is_none());

        let three = OrderedMap {
            of: key,
            to: value,
            comparator: Some(Box::new(Comparator { name: "std::less<>".into() })),
        };
        assert_eq!(
            to_value(&three),
            json!({
                "name": "std::map",
                "of": {"name": "std::string"},
                "to": {"name": "std::string"},
                "comparator": {"name": "std::less<>"}
            })
        );
    }

    #[test]
    fn variant_children_keep_declared_order() {
        let d = Variant {
            of: vec![
                Primitive { name: "std::monostate" },
                Primitive { name: "std::string" },
                Primitive { name: "std::int64_t" },
            ],
        };
        assert_eq!(
            to_value(&d),
            json!({"name": "std::variant", "of": [
                {"name": "std::monostate"},
                {"name": "std::string"},
                {"name": "std::int64_t"}
            ]})
        );
    }

    #[test]
    fn unknown_keeps_original_spelling() {
        let d = Unknown { str_: "boost::wild<T>".into() };
        assert_eq!(to_value(&d), json!({"name": "unknown", "str": "boost::wild<T>"}));
    }

    #[test]
    fn document_has_exactly_two_top_level_keys() {
        let doc = OutputDocument {
            op_structs: vec![StructDescriptor {
                name: "couchbase::core::columnar::query_options".into(),
                fields: vec![FieldDescriptor {
                    name: "read_only".into(),
                    ty: Primitive { name: "std::bool" },
                }],
            }],
            op_enums: vec![],
        };
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({
                "op_structs": [{
                    "name": "couchbase::core::columnar::query_options",
                    "fields": [{"name": "read_only", "type": {"name": "std::bool"}}]
                }],
                "op_enums": []
            })
        );
    }
}
