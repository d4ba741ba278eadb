//! Value types carried by the wire format.
//!
//! Static code uses [`WireType`] to move between Rust values and their
//! encoded text. Options and signal signatures hold runtime-typed
//! [`Value`]s and [`WireValue`]s because their type is only known from the
//! wire.

use crate::error::{Error, Result};
use crate::uri::Uri;

/// Type tag of a wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// `true` / `false`.
    Bool,
    /// Signed 32-bit integer.
    Integer,
    /// Unsigned 32-bit integer.
    Unsigned,
    /// 64-bit float.
    Real,
    /// UTF-8 text.
    String,
    /// Component path.
    Uri,
}

impl ValueType {
    /// All tags, in declaration order.
    pub const ALL: [ValueType; 6] = [
        ValueType::Bool,
        ValueType::Integer,
        ValueType::Unsigned,
        ValueType::Real,
        ValueType::String,
        ValueType::Uri,
    ];

    /// Wire tag name.
    pub fn tag(self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Integer => "integer",
            ValueType::Unsigned => "unsigned",
            ValueType::Real => "real",
            ValueType::String => "string",
            ValueType::Uri => "uri",
        }
    }

    /// Look up a tag name.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Value used when a declaration carries no default.
    pub fn zero(self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Integer => Value::Integer(0),
            ValueType::Unsigned => Value::Unsigned(0),
            ValueType::Real => Value::Real(0.0),
            ValueType::String => Value::String(String::new()),
            ValueType::Uri => Value::Uri(Uri::default()),
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A Rust type with a wire representation.
pub trait WireType: Sized {
    /// Type tag written on the wire.
    const TYPE: ValueType;

    /// Encoded text of the value.
    fn to_wire(&self) -> String;

    /// Decode from text. `None` if the text is not a valid encoding.
    fn from_wire(text: &str) -> Option<Self>;

    /// Convert into a runtime-typed value.
    fn into_value(self) -> Value;

    /// Extract from a runtime-typed value of the same type.
    fn from_value(value: &Value) -> Option<Self>;
}

impl WireType for bool {
    const TYPE: ValueType = ValueType::Bool;

    fn to_wire(&self) -> String {
        self.to_string()
    }

    fn from_wire(text: &str) -> Option<Self> {
        match text.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

macro_rules! numeric_wire_type {
    ($ty:ty, $variant:ident) => {
        impl WireType for $ty {
            const TYPE: ValueType = ValueType::$variant;

            fn to_wire(&self) -> String {
                self.to_string()
            }

            fn from_wire(text: &str) -> Option<Self> {
                text.trim().parse().ok()
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(*v),
                    _ => None,
                }
            }
        }
    };
}

numeric_wire_type!(i32, Integer);
numeric_wire_type!(u32, Unsigned);
numeric_wire_type!(f64, Real);

impl WireType for String {
    const TYPE: ValueType = ValueType::String;

    fn to_wire(&self) -> String {
        self.clone()
    }

    fn from_wire(text: &str) -> Option<Self> {
        Some(text.to_string())
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl WireType for Uri {
    const TYPE: ValueType = ValueType::Uri;

    fn to_wire(&self) -> String {
        self.to_string()
    }

    fn from_wire(text: &str) -> Option<Self> {
        Some(Uri::parse(text))
    }

    fn into_value(self) -> Value {
        Value::Uri(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Uri(v) => Some(v.clone()),
            _ => None,
        }
    }
}

/// A runtime-typed scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `bool` value.
    Bool(bool),
    /// `integer` value.
    Integer(i32),
    /// `unsigned` value.
    Unsigned(u32),
    /// `real` value.
    Real(f64),
    /// `string` value.
    String(String),
    /// `uri` value.
    Uri(Uri),
}

impl Value {
    /// Type tag of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Integer(_) => ValueType::Integer,
            Value::Unsigned(_) => ValueType::Unsigned,
            Value::Real(_) => ValueType::Real,
            Value::String(_) => ValueType::String,
            Value::Uri(_) => ValueType::Uri,
        }
    }

    /// Encoded text of this value.
    pub fn to_wire(&self) -> String {
        match self {
            Value::Bool(v) => v.to_wire(),
            Value::Integer(v) => v.to_wire(),
            Value::Unsigned(v) => v.to_wire(),
            Value::Real(v) => v.to_wire(),
            Value::String(v) => v.to_wire(),
            Value::Uri(v) => v.to_wire(),
        }
    }

    /// Decode `text` as a value of type `value_type`.
    ///
    /// `key` only names the entry in the error.
    pub fn parse(value_type: ValueType, text: &str, key: &str) -> Result<Value> {
        let parsed = match value_type {
            ValueType::Bool => bool::from_wire(text).map(Value::Bool),
            ValueType::Integer => i32::from_wire(text).map(Value::Integer),
            ValueType::Unsigned => u32::from_wire(text).map(Value::Unsigned),
            ValueType::Real => f64::from_wire(text).map(Value::Real),
            ValueType::String => String::from_wire(text).map(Value::String),
            ValueType::Uri => Uri::from_wire(text).map(Value::Uri),
        };
        parsed.ok_or_else(|| {
            Error::malformed(format!("[{text}] is not a valid {value_type} for [{key}]"))
        })
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// A runtime-typed single value or homogeneous array.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// One scalar.
    Single(Value),
    /// Elements of one type.
    Array {
        /// Element type; also meaningful for empty arrays.
        element: ValueType,
        /// Elements in order.
        items: Vec<Value>,
    },
}

impl WireValue {
    /// Wrap a typed scalar.
    pub fn single<T: WireType>(value: T) -> Self {
        WireValue::Single(value.into_value())
    }

    /// Wrap a typed array.
    pub fn array<T: WireType>(values: Vec<T>) -> Self {
        WireValue::Array {
            element: T::TYPE,
            items: values.into_iter().map(WireType::into_value).collect(),
        }
    }

    /// Scalar type, or element type for arrays.
    pub fn value_type(&self) -> ValueType {
        match self {
            WireValue::Single(v) => v.value_type(),
            WireValue::Array { element, .. } => *element,
        }
    }

    /// Returns `true` for arrays.
    pub fn is_array(&self) -> bool {
        matches!(self, WireValue::Array { .. })
    }

    /// Human readable type, e.g. `integer` or `array[real]`.
    pub fn type_label(&self) -> String {
        type_label(self.value_type(), self.is_array())
    }

    /// Scalar values as a one-element slice, arrays as their items.
    pub fn items(&self) -> &[Value] {
        match self {
            WireValue::Single(v) => std::slice::from_ref(v),
            WireValue::Array { items, .. } => items,
        }
    }

    /// Extract a typed scalar.
    pub fn get<T: WireType>(&self) -> Option<T> {
        match self {
            WireValue::Single(v) => T::from_value(v),
            WireValue::Array { .. } => None,
        }
    }

    /// Extract a typed array.
    pub fn get_array<T: WireType>(&self) -> Option<Vec<T>> {
        match self {
            WireValue::Array { element, items } if *element == T::TYPE => {
                items.iter().map(T::from_value).collect()
            }
            _ => None,
        }
    }

    /// Encoded text; arrays are joined with `delimiter`.
    pub fn to_wire(&self, delimiter: &str) -> String {
        match self {
            WireValue::Single(v) => v.to_wire(),
            WireValue::Array { items, .. } => items
                .iter()
                .map(Value::to_wire)
                .collect::<Vec<_>>()
                .join(delimiter),
        }
    }
}

/// Label shared by error messages: `integer` or `array[integer]`.
pub fn type_label(value_type: ValueType, is_array: bool) -> String {
    if is_array {
        format!("array[{value_type}]")
    } else {
        value_type.tag().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_roundtrip() {
        for t in ValueType::ALL {
            assert_eq!(ValueType::from_tag(t.tag()), Some(t));
        }
        assert_eq!(ValueType::from_tag("float"), None);
    }

    #[test]
    fn test_bool_accepts_numeric_forms() {
        assert_eq!(bool::from_wire("1"), Some(true));
        assert_eq!(bool::from_wire("false"), Some(false));
        assert_eq!(bool::from_wire("yes"), None);
    }

    #[test]
    fn test_value_parse_errors_are_malformed() {
        let err = Value::parse(ValueType::Unsigned, "-3", "count").unwrap_err();
        assert!(matches!(err, Error::MalformedPayload(_)));
        assert_eq!(
            Value::parse(ValueType::Real, "2.5", "x").unwrap(),
            Value::Real(2.5)
        );
    }

    #[test]
    fn test_wire_value_accessors() {
        let arr = WireValue::array(vec![1_i32, 2, 3]);
        assert!(arr.is_array());
        assert_eq!(arr.type_label(), "array[integer]");
        assert_eq!(arr.to_wire(";"), "1;2;3");
        assert_eq!(arr.get_array::<i32>(), Some(vec![1, 2, 3]));
        assert_eq!(arr.get_array::<u32>(), None);

        let single = WireValue::single(String::from("cfl"));
        assert_eq!(single.get::<String>().as_deref(), Some("cfl"));
        assert_eq!(single.items().len(), 1);
    }
}
