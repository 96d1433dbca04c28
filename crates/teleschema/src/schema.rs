//! # Schema Types
//!
//! The compiled form of a parameter's declared type.
//!
//! A `TypeSchema` is either a structural `ObjectShape` (ordered fields, each a
//! nested schema) or an opaque leaf carrying the original type text. Opaque
//! leaves are interpreted only by the runtime validator, which understands
//! `any`, the three primitives and trailing `[]`; everything else is left
//! unverified.
//!
//! On the wire (the manifest a build step emits) shapes are JSON objects and
//! opaque leaves are JSON strings.

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de::MapAccess;
use serde::de::Visitor;
use serde::ser::SerializeMap;

/// The opaque type text that disables validation.
pub const ANY: &str = "any";

/// A compiled parameter type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeSchema {
    /// A brace-delimited structural literal.
    Object(ObjectShape),
    /// Verbatim type text: primitives, arrays, unions, generics, names.
    Opaque(String),
}

impl TypeSchema {
    pub fn opaque(text: impl Into<String>) -> Self {
        Self::Opaque(text.into())
    }

    pub fn any() -> Self {
        Self::Opaque(ANY.to_string())
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Opaque(text) if text == ANY)
    }

    pub fn as_object(&self) -> Option<&ObjectShape> {
        match self {
            Self::Object(shape) => Some(shape),
            Self::Opaque(_) => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&str> {
        match self {
            Self::Opaque(text) => Some(text),
            Self::Object(_) => None,
        }
    }

    /// The compiled element type of an opaque `T[]`, with one trailing `[]`
    /// removed.
    ///
    /// `string[][]` yields `string[]`; `{ a: string }[]` yields the shape.
    /// Shapes and non-array text yield `None`.
    pub fn array_item(&self) -> Option<TypeSchema> {
        let text = self.as_opaque()?;
        text.strip_suffix("[]").map(crate::parse_type)
    }
}

impl fmt::Display for TypeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opaque(text) => f.write_str(text),
            Self::Object(shape) => write!(f, "{}", shape),
        }
    }
}

impl From<ObjectShape> for TypeSchema {
    fn from(shape: ObjectShape) -> Self {
        Self::Object(shape)
    }
}

impl From<&str> for TypeSchema {
    fn from(text: &str) -> Self {
        Self::Opaque(text.to_string())
    }
}

/// Ordered field name to nested schema mapping.
///
/// Field order is the declared order and drives validation order. Names are
/// unique; inserting an existing name replaces its entry in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectShape {
    fields: Vec<Field>,
}

/// One declared property of a shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub schema: TypeSchema,
    /// Declared as `name?: T`. May be absent; checked when present.
    pub optional: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, schema: impl Into<TypeSchema>, optional: bool) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            optional,
        }
    }
}

impl ObjectShape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a required field.
    pub fn with_field(mut self, name: impl Into<String>, schema: impl Into<TypeSchema>) -> Self {
        self.insert(name, schema);
        self
    }

    /// Builder-style insert of an optional field.
    pub fn with_optional_field(mut self, name: impl Into<String>, schema: impl Into<TypeSchema>) -> Self {
        self.insert_optional(name, schema);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, schema: impl Into<TypeSchema>) {
        self.insert_field(Field::new(name, schema, false));
    }

    pub fn insert_optional(&mut self, name: impl Into<String>, schema: impl Into<TypeSchema>) {
        self.insert_field(Field::new(name, schema, true));
    }

    pub fn insert_field(&mut self, field: Field) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(slot) => *slot = field,
            None => self.fields.push(field),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypeSchema> {
        self.field(name).map(|f| &f.schema)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_optional(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.optional)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for ObjectShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fields.is_empty() {
            return f.write_str("{}");
        }
        f.write_str("{ ")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            let marker = if field.optional { "?" } else { "" };
            write!(f, "{}{}: {}", field.name, marker, field.schema)?;
        }
        f.write_str(" }")
    }
}

impl<K: Into<String>, S: Into<TypeSchema>> FromIterator<(K, S)> for ObjectShape {
    fn from_iter<I: IntoIterator<Item = (K, S)>>(iter: I) -> Self {
        let mut shape = ObjectShape::new();
        for (name, schema) in iter {
            shape.insert(name, schema);
        }
        shape
    }
}

/// Serialized shapes mark optional fields with a trailing `?` on the key.
impl Serialize for TypeSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Opaque(text) => serializer.serialize_str(text),
            Self::Object(shape) => {
                let mut map = serializer.serialize_map(Some(shape.len()))?;
                for field in shape.fields() {
                    if field.optional {
                        map.serialize_entry(&format!("{}?", field.name), &field.schema)?;
                    } else {
                        map.serialize_entry(&field.name, &field.schema)?;
                    }
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for TypeSchema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SchemaVisitor)
    }
}

struct SchemaVisitor;

impl<'de> Visitor<'de> for SchemaVisitor {
    type Value = TypeSchema;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a type string or an object of nested schemas")
    }

    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<TypeSchema, E> {
        Ok(TypeSchema::Opaque(v.to_string()))
    }

    fn visit_string<E: serde::de::Error>(self, v: String) -> Result<TypeSchema, E> {
        Ok(TypeSchema::Opaque(v))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<TypeSchema, A::Error> {
        let mut shape = ObjectShape::new();
        while let Some((key, schema)) = access.next_entry::<String, TypeSchema>()? {
            match key.strip_suffix('?') {
                Some(name) => shape.insert_optional(name, schema),
                None => shape.insert(key, schema),
            }
        }
        Ok(TypeSchema::Object(shape))
    }
}

/// A declared parameter: name, compiled type and optionality.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeSchema,
    #[serde(default)]
    pub optional: bool,
}

impl ParamInfo {
    pub fn new(name: impl Into<String>, ty: impl Into<TypeSchema>, optional: bool) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            optional,
        }
    }

    /// Compiles `type_text` with [`crate::parse_type`].
    pub fn parse(name: impl Into<String>, type_text: &str, optional: bool) -> Self {
        Self::new(name, crate::parse_type(type_text), optional)
    }

    pub fn required(name: impl Into<String>, type_text: &str) -> Self {
        Self::parse(name, type_text, false)
    }

    pub fn optional(name: impl Into<String>, type_text: &str) -> Self {
        Self::parse(name, type_text, true)
    }
}
