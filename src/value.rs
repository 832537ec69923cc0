//! Opaque, dynamically typed evaluation results
//!
//! The evaluator never looks inside a [`Value`]; it only routes values from
//! producers (literals, resolvers, callables) to consumers (callables,
//! resolvers, the caller). Type compatibility is a contract between those
//! parties and is checked when a callable converts its arguments.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::fields::Record;

/// A dynamically typed value, or nil
///
/// Cloning is cheap: the payload is shared behind an [`Arc`].
#[derive(Clone, Default)]
pub struct Value {
    inner: Option<Inner>,
}

#[derive(Clone)]
struct Inner {
    object: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    record: Option<Arc<dyn Record>>,
}

impl Value {
    /// Wrap any sendable value
    ///
    /// Wrapping a [`Value`] returns it unchanged rather than nesting it.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        let mut slot = Some(value);
        if let Some(value) = (&mut slot as &mut dyn Any).downcast_mut::<Option<Value>>() {
            return value.take().unwrap_or_default();
        }
        match slot {
            Some(value) => Self {
                inner: Some(Inner {
                    object: Arc::new(value),
                    type_name: type_name::<T>(),
                    record: None,
                }),
            },
            None => Self::nil(),
        }
    }

    /// Wrap a structured value so the field accessor can walk it
    pub fn record<T: Record>(value: T) -> Self {
        let shared = Arc::new(value);
        Self {
            inner: Some(Inner {
                object: shared.clone(),
                type_name: type_name::<T>(),
                record: Some(shared as Arc<dyn Record>),
            }),
        }
    }

    /// The nil value
    pub fn nil() -> Self {
        Self { inner: None }
    }

    /// Whether this is the nil value
    pub fn is_nil(&self) -> bool {
        self.inner.is_none()
    }

    /// Whether the payload is a `T`
    pub fn is<T: Any>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    /// Borrow the payload as a `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.as_ref()?.object.downcast_ref::<T>()
    }

    /// Name of the payload's Rust type, `"nil"` for the nil value
    pub fn type_name(&self) -> &'static str {
        match &self.inner {
            Some(inner) => inner.type_name,
            None => "nil",
        }
    }

    /// The record view of the payload, if it was built with [`Value::record`]
    pub fn as_record(&self) -> Option<&dyn Record> {
        self.inner.as_ref()?.record.as_deref()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.inner {
            Some(inner) => write!(f, "Value({})", inner.type_name),
            None => write!(f, "Value(nil)"),
        }
    }
}
