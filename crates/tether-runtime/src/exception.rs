//! Host exceptions and their script-visible error records
//!
//! A failure inside a host handler is described by a [`HostErrorInfo`].
//! The context's [`ErrorFilter`] then decides whether script code gets to
//! see it:
//!
//! - [`FilterDecision::Proceed`]: the record is thrown into the script as a
//!   catchable error object
//! - [`FilterDecision::Suppress`]: execution is terminated and the original
//!   exception is re-thrown to the host once control returns

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::template::{DispatchResult, HostObjectTemplate};
use crate::value::Value;

// ============================================================================
// HostException
// ============================================================================

/// A failure raised by host code.
///
/// Cheap to clone; clones compare equal under [`ptr_eq`](Self::ptr_eq), so
/// the host can recognise its own exception after a round trip through
/// script code.
#[derive(Clone)]
pub struct HostException {
    inner: Arc<anyhow::Error>,
}

impl HostException {
    /// Wrap any error
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::from(anyhow::Error::new(error))
    }

    /// Exception carrying only a message
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::from(anyhow::Error::msg(message))
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "host handler panicked".to_string()
        };
        Self::msg(message)
    }

    /// The underlying error
    pub fn error(&self) -> &anyhow::Error {
        &self.inner
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    /// Whether both refer to the same raised exception
    pub fn ptr_eq(&self, other: &HostException) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<anyhow::Error> for HostException {
    fn from(error: anyhow::Error) -> Self {
        Self {
            inner: Arc::new(error),
        }
    }
}

/// Bridge errors raised inside handlers keep the identity of a host
/// exception they carry.
impl From<Error> for HostException {
    fn from(error: Error) -> Self {
        match error {
            Error::Host(exception) => exception,
            other => HostException::new(other),
        }
    }
}

impl From<HostErrorInfo> for HostException {
    fn from(info: HostErrorInfo) -> Self {
        HostException::new(info)
    }
}

impl fmt::Debug for HostException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostException({:?})", self.inner)
    }
}

impl fmt::Display for HostException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl std::error::Error for HostException {}

// ============================================================================
// HostErrorInfo
// ============================================================================

/// Script-visible description of a host failure.
///
/// Either derived from an exception with [`convert`](Self::convert) or built
/// by host code to throw a script error without raising anything. Custom
/// properties appear on the script error object in insertion order.
#[derive(Debug, Clone)]
pub struct HostErrorInfo {
    /// Exception the record was derived from
    pub exception: Option<HostException>,
    /// Error name, `"Error"` unless set
    pub name: String,
    /// Error message
    pub message: String,
    properties: Vec<(String, Value)>,
}

impl HostErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            exception: None,
            name: "Error".to_string(),
            message: message.into(),
            properties: Vec::new(),
        }
    }

    /// Describe `exception`. An exception raised from a `HostErrorInfo` is
    /// taken verbatim.
    pub fn convert(exception: &HostException) -> Self {
        if let Some(info) = exception.downcast_ref::<HostErrorInfo>() {
            let mut info = info.clone();
            if info.exception.is_none() {
                info.exception = Some(exception.clone());
            }
            return info;
        }
        Self {
            exception: Some(exception.clone()),
            ..Self::new(exception.to_string())
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_property(key, value);
        self
    }

    /// Set a custom property, replacing an existing one in place
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.properties.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.properties.push((key, value)),
        }
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value)
    }

    pub fn remove_property(&mut self, key: &str) -> Option<Value> {
        let index = self.properties.iter().position(|(k, _)| k == key)?;
        Some(self.properties.remove(index).1)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Member lookup as seen from script code
    fn member(&self, key: &str) -> Option<Value> {
        match key {
            "name" => Some(Value::from(self.name.as_str())),
            "message" => Some(Value::from(self.message.as_str())),
            _ => self.property(key).cloned(),
        }
    }

    fn member_names(&self) -> Vec<String> {
        ["name", "message"]
            .into_iter()
            .map(str::to_string)
            .chain(self.properties.iter().map(|(k, _)| k.clone()))
            .collect()
    }
}

impl fmt::Display for HostErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name.is_empty(), self.message.is_empty()) {
            (true, _) => f.write_str(&self.message),
            (false, true) => f.write_str(&self.name),
            (false, false) => write!(f, "{}: {}", self.name, self.message),
        }
    }
}

impl std::error::Error for HostErrorInfo {}

// ============================================================================
// Filter
// ============================================================================

/// What happens to a host handler failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterDecision {
    /// Throw it into the script as a catchable error
    #[default]
    Proceed,
    /// Terminate execution and re-throw to the host
    Suppress,
}

impl From<bool> for FilterDecision {
    fn from(proceed: bool) -> Self {
        if proceed {
            FilterDecision::Proceed
        } else {
            FilterDecision::Suppress
        }
    }
}

/// Decides the fate of each host handler failure
pub type ErrorFilter = Arc<dyn Fn(&HostErrorInfo) -> FilterDecision + Send + Sync>;

/// Template servicing thrown error records
pub(crate) fn error_template() -> HostObjectTemplate {
    HostObjectTemplate::for_type::<HostErrorInfo>()
        .with_name("host-error")
        .on_get_property(|_, target, name| {
            match target.downcast_ref::<HostErrorInfo>().and_then(|info| info.member(name)) {
                Some(value) => DispatchResult::Handled(value),
                None => DispatchResult::NotHandled,
            }
        })
        .on_enumerate_properties(|_, target| {
            Ok(target
                .downcast_ref::<HostErrorInfo>()
                .map(HostErrorInfo::member_names)
                .unwrap_or_default())
        })
        .on_to_string(|_, target| match target.downcast_ref::<HostErrorInfo>() {
            Some(info) => DispatchResult::Handled(info.to_string()),
            None => DispatchResult::NotHandled,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("disk full")]
    struct DiskFull;

    #[test]
    fn test_convert_derives_name_and_message() {
        let exception = HostException::new(DiskFull);
        let info = HostErrorInfo::convert(&exception);
        assert_eq!(info.name, "Error");
        assert_eq!(info.message, "disk full");
        assert!(info.exception.as_ref().unwrap().ptr_eq(&exception));
        assert!(exception.downcast_ref::<DiskFull>().is_some());
    }

    #[test]
    fn test_convert_takes_carried_info_verbatim() {
        let info = HostErrorInfo::new("bad input")
            .with_name("ValidationError")
            .with_property("field", "email");
        let exception = HostException::from(info);
        let converted = HostErrorInfo::convert(&exception);
        assert_eq!(converted.name, "ValidationError");
        assert_eq!(converted.message, "bad input");
        assert_eq!(converted.property("field").and_then(Value::as_str), Some("email"));
    }

    #[test]
    fn test_properties_keep_insertion_order() {
        let mut info = HostErrorInfo::new("m").with_property("b", 1).with_property("a", 2);
        info.set_property("b", 3);
        let keys: Vec<_> = info.properties().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(info.property("b").and_then(Value::as_i32), Some(3));
        assert_eq!(info.member_names(), vec!["name", "message", "b", "a"]);
        assert!(info.remove_property("a").is_some());
        assert!(info.property("a").is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(HostErrorInfo::new("boom").to_string(), "Error: boom");
        assert_eq!(HostErrorInfo::new("").with_name("Oops").to_string(), "Oops");
    }

    #[test]
    fn test_bridge_errors_keep_host_identity() {
        let exception = HostException::msg("original");
        let roundtrip = HostException::from(Error::Host(exception.clone()));
        assert!(roundtrip.ptr_eq(&exception));
        assert!(!HostException::from(Error::Timeout).ptr_eq(&exception));
    }

    #[test]
    fn test_panic_payloads_become_messages() {
        assert_eq!(HostException::from_panic(Box::new("static")).to_string(), "static");
        assert_eq!(
            HostException::from_panic(Box::new(String::from("owned"))).to_string(),
            "owned"
        );
        assert_eq!(
            HostException::from_panic(Box::new(5_u8)).to_string(),
            "host handler panicked"
        );
    }
}
