//! TaggedValue - the boundary wire format
//!
//! Every value that crosses between host and engine is a [`TaggedValue`]:
//! a `#[repr(C, u32)]` union of a type tag and a payload.
//!
//! # Ownership
//!
//! ```text
//! inline:       Empty, Undefined, Null, Boolean, Integer, Number, Date, Index,
//!               Object/JsArray/Function (pinned handle), HostValue, HostError
//! out-of-band:  String (UTF-16 buffer), Array (run of values),
//!               EngineError (boxed error info)
//! ```
//!
//! Out-of-band payloads are owned boxes. Reading a value through one of the
//! consuming accessors (`into_*`) releases its payload exactly once; a value
//! that is never read is released by `Drop`. `TaggedValue` is deliberately
//! not `Clone`: object handles carry a pin that belongs to exactly one owner.

use std::fmt;

use crate::error::{EngineErrorInfo, TagError};
use crate::handle::{ObjectHandle, TemplateId};

// ============================================================================
// Value tags
// ============================================================================

/// Discriminant of a [`TaggedValue`], identical to its `#[repr(u32)]` tag.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueTag {
    /// Absent value; "not handled" in callback results
    Empty = 0,
    /// Script `null`
    Null = 1,
    /// Boolean
    Boolean = 2,
    /// 32-bit signed integer
    Integer = 3,
    /// 64-bit float
    Number = 4,
    /// UTF-16 string
    String = 5,
    /// Milliseconds since the Unix epoch
    Date = 6,
    /// Unsigned 32-bit index
    Index = 7,
    /// Run of values
    Array = 10,
    /// Slot reference into the keep-alive store
    HostValue = 12,
    /// Host-originated error wrapping a slot reference
    HostError = 13,
    /// Engine object handle
    Object = 14,
    /// Engine-originated error
    EngineError = 16,
    /// Engine function handle
    Function = 17,
    /// Engine array handle
    JsArray = 18,
    /// Execution was terminated
    Termination = 19,
    /// Script `undefined`
    Undefined = 20,
}

impl TryFrom<u32> for ValueTag {
    type Error = TagError;

    fn try_from(raw: u32) -> Result<Self, TagError> {
        Ok(match raw {
            0 => ValueTag::Empty,
            1 => ValueTag::Null,
            2 => ValueTag::Boolean,
            3 => ValueTag::Integer,
            4 => ValueTag::Number,
            5 => ValueTag::String,
            6 => ValueTag::Date,
            7 => ValueTag::Index,
            10 => ValueTag::Array,
            12 => ValueTag::HostValue,
            13 => ValueTag::HostError,
            14 => ValueTag::Object,
            16 => ValueTag::EngineError,
            17 => ValueTag::Function,
            18 => ValueTag::JsArray,
            19 => ValueTag::Termination,
            20 => ValueTag::Undefined,
            other => return Err(TagError::UnknownTag(other)),
        })
    }
}

// ============================================================================
// TaggedValue
// ============================================================================

/// A value crossing the host/engine boundary.
#[repr(C, u32)]
#[derive(Debug, PartialEq)]
pub enum TaggedValue {
    /// Absent value. In callback results this means "not handled".
    Empty = 0,
    /// Script `null`
    Null = 1,
    /// Boolean
    Boolean(bool) = 2,
    /// 32-bit signed integer
    Integer(i32) = 3,
    /// 64-bit float
    Number(f64) = 4,
    /// UTF-16 string buffer
    String(Box<[u16]>) = 5,
    /// Milliseconds since the Unix epoch
    Date(f64) = 6,
    /// Unsigned 32-bit index
    Index(u32) = 7,
    /// Contiguous run of values with an explicit length
    Array(Box<[TaggedValue]>) = 10,
    /// Host object pinned in the keep-alive store
    HostValue {
        /// Keep-alive slot
        slot: i32,
        /// Template servicing the proxy
        template: TemplateId,
    } = 12,
    /// Host-originated error; the slot holds the error record
    HostError {
        /// Keep-alive slot
        slot: i32,
        /// Template servicing the error proxy
        template: TemplateId,
    } = 13,
    /// Pinned engine object
    Object(ObjectHandle) = 14,
    /// Uncaught engine error
    EngineError(Box<EngineErrorInfo>) = 16,
    /// Pinned engine function
    Function(ObjectHandle) = 17,
    /// Pinned engine array
    JsArray(ObjectHandle) = 18,
    /// Execution was terminated before completing
    Termination = 19,
    /// Script `undefined`
    Undefined = 20,
}

impl TaggedValue {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Encode a string as UTF-16
    pub fn string(s: &str) -> Self {
        TaggedValue::String(s.encode_utf16().collect())
    }

    /// Encode a run of values
    pub fn from_values(values: Vec<TaggedValue>) -> Self {
        TaggedValue::Array(values.into_boxed_slice())
    }

    /// Encode a list of names as a run of strings
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        TaggedValue::Array(
            names
                .into_iter()
                .map(|name| TaggedValue::string(name.as_ref()))
                .collect(),
        )
    }

    /// Wrap an engine error
    pub fn engine_error(info: EngineErrorInfo) -> Self {
        TaggedValue::EngineError(Box::new(info))
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Type tag of this value
    pub fn tag(&self) -> ValueTag {
        match self {
            TaggedValue::Empty => ValueTag::Empty,
            TaggedValue::Null => ValueTag::Null,
            TaggedValue::Boolean(_) => ValueTag::Boolean,
            TaggedValue::Integer(_) => ValueTag::Integer,
            TaggedValue::Number(_) => ValueTag::Number,
            TaggedValue::String(_) => ValueTag::String,
            TaggedValue::Date(_) => ValueTag::Date,
            TaggedValue::Index(_) => ValueTag::Index,
            TaggedValue::Array(_) => ValueTag::Array,
            TaggedValue::HostValue { .. } => ValueTag::HostValue,
            TaggedValue::HostError { .. } => ValueTag::HostError,
            TaggedValue::Object(_) => ValueTag::Object,
            TaggedValue::EngineError(_) => ValueTag::EngineError,
            TaggedValue::Function(_) => ValueTag::Function,
            TaggedValue::JsArray(_) => ValueTag::JsArray,
            TaggedValue::Termination => ValueTag::Termination,
            TaggedValue::Undefined => ValueTag::Undefined,
        }
    }

    /// Check for the "absent / not handled" value
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, TaggedValue::Empty)
    }

    /// Check for either error shape
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            TaggedValue::EngineError(_) | TaggedValue::HostError { .. }
        )
    }

    /// Check for a terminated execution
    #[inline]
    pub fn is_termination(&self) -> bool {
        matches!(self, TaggedValue::Termination)
    }

    /// Borrow as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TaggedValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow as a 32-bit integer
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            TaggedValue::Integer(i) => Some(*i),
            TaggedValue::Index(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Borrow as a number, widening integers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TaggedValue::Integer(i) => Some(*i as f64),
            TaggedValue::Index(i) => Some(*i as f64),
            TaggedValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Borrow the UTF-16 buffer of a string
    pub fn as_utf16(&self) -> Option<&[u16]> {
        match self {
            TaggedValue::String(units) => Some(units),
            _ => None,
        }
    }

    /// Decode a string payload, replacing unpaired surrogates
    pub fn to_string_lossy(&self) -> Option<String> {
        self.as_utf16().map(String::from_utf16_lossy)
    }

    /// Handle carried by an object, array or function value
    pub fn object_handle(&self) -> Option<ObjectHandle> {
        match self {
            TaggedValue::Object(h) | TaggedValue::JsArray(h) | TaggedValue::Function(h) => {
                Some(*h)
            }
            _ => None,
        }
    }

    // ========================================================================
    // Consuming accessors
    // ========================================================================

    /// Take the string payload, releasing the buffer
    pub fn into_string(self) -> Option<String> {
        match self {
            TaggedValue::String(units) => Some(String::from_utf16_lossy(&units)),
            _ => None,
        }
    }

    /// Take the elements of a run, releasing the run itself
    pub fn into_values(self) -> Option<Vec<TaggedValue>> {
        match self {
            TaggedValue::Array(values) => Some(values.into_vec()),
            _ => None,
        }
    }

    /// Take the engine error payload
    pub fn into_engine_error(self) -> Option<Box<EngineErrorInfo>> {
        match self {
            TaggedValue::EngineError(info) => Some(info),
            _ => None,
        }
    }
}

impl Default for TaggedValue {
    fn default() -> Self {
        TaggedValue::Empty
    }
}

impl From<bool> for TaggedValue {
    fn from(b: bool) -> Self {
        TaggedValue::Boolean(b)
    }
}

impl From<i32> for TaggedValue {
    fn from(i: i32) -> Self {
        TaggedValue::Integer(i)
    }
}

impl From<u32> for TaggedValue {
    fn from(i: u32) -> Self {
        TaggedValue::Index(i)
    }
}

impl From<f64> for TaggedValue {
    fn from(n: f64) -> Self {
        TaggedValue::Number(n)
    }
}

impl From<&str> for TaggedValue {
    fn from(s: &str) -> Self {
        TaggedValue::string(s)
    }
}

impl From<String> for TaggedValue {
    fn from(s: String) -> Self {
        TaggedValue::string(&s)
    }
}

impl fmt::Display for TaggedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaggedValue::Empty => write!(f, "<empty>"),
            TaggedValue::Undefined => write!(f, "undefined"),
            TaggedValue::Null => write!(f, "null"),
            TaggedValue::Boolean(b) => write!(f, "{}", b),
            TaggedValue::Integer(i) => write!(f, "{}", i),
            TaggedValue::Index(i) => write!(f, "{}", i),
            TaggedValue::Number(n) => write!(f, "{}", n),
            TaggedValue::String(units) => write!(f, "{:?}", String::from_utf16_lossy(units)),
            TaggedValue::Date(ms) => write!(f, "Date({})", ms),
            TaggedValue::Array(values) => write!(f, "[{} values]", values.len()),
            TaggedValue::HostValue { slot, template } => {
                write!(f, "HostValue(slot {}, {})", slot, template)
            }
            TaggedValue::HostError { slot, template } => {
                write!(f, "HostError(slot {}, {})", slot, template)
            }
            TaggedValue::Object(h) => write!(f, "Object({:?})", h),
            TaggedValue::JsArray(h) => write!(f, "JsArray({:?})", h),
            TaggedValue::Function(h) => write!(f, "Function({:?})", h),
            TaggedValue::EngineError(info) => write!(f, "EngineError({})", info),
            TaggedValue::Termination => write!(f, "<terminated>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_matches_discriminant() {
        let values = [
            TaggedValue::Empty,
            TaggedValue::Null,
            TaggedValue::Boolean(true),
            TaggedValue::Integer(-4),
            TaggedValue::Number(1.5),
            TaggedValue::string("abc"),
            TaggedValue::Date(0.0),
            TaggedValue::Index(7),
            TaggedValue::from_values(vec![TaggedValue::Null]),
            TaggedValue::HostValue { slot: 1, template: TemplateId(0) },
            TaggedValue::Termination,
            TaggedValue::Undefined,
        ];
        for value in &values {
            let tag = value.tag();
            assert_eq!(ValueTag::try_from(tag as u32).unwrap(), tag);
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert_eq!(ValueTag::try_from(99), Err(TagError::UnknownTag(99)));
    }

    #[test]
    fn test_string_is_utf16() {
        let value = TaggedValue::string("h\u{e9}llo \u{1F600}");
        assert_eq!(value.as_utf16().unwrap().len(), 9);
        assert_eq!(value.into_string().as_deref(), Some("h\u{e9}llo \u{1F600}"));
    }

    #[test]
    fn test_into_values_releases_run() {
        let names = TaggedValue::from_names(["a", "b"]);
        let values = names.into_values().unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1].to_string_lossy().as_deref(), Some("b"));
    }

    #[test]
    fn test_error_and_empty_predicates() {
        assert!(TaggedValue::Empty.is_empty());
        assert!(!TaggedValue::Undefined.is_empty());
        assert!(TaggedValue::HostError { slot: 0, template: TemplateId(1) }.is_error());
        assert!(TaggedValue::engine_error(EngineErrorInfo::default()).is_error());
        assert!(TaggedValue::Termination.is_termination());
    }

    #[test]
    fn test_numeric_widening() {
        assert_eq!(TaggedValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(TaggedValue::Index(u32::MAX).as_i32(), None);
        assert_eq!(TaggedValue::Index(12).as_i32(), Some(12));
    }
}
