//! Callables and the dynamic call bridge
//!
//! Hosts register plain Rust functions and closures as operators, functions
//! and methods. Each one is erased into a [`Callable`]: a declared [`Arity`],
//! the parameter type names for diagnostics, and a thunk from the evaluated
//! argument list to the list of returned values.
//!
//! Two result shapes are understood by the bridge:
//!
//! - "(value)": the thunk returns exactly one value;
//! - "(value, error)": the thunk returns two values, the second being nil on
//!   success or a [`CallError`] on failure.
//!
//! [`Callable::new`] produces the first shape and [`Callable::fallible`] the
//! second. [`Callable::raw`] accepts a hand-built thunk, whose output is
//! checked by the bridge like any other.

use std::any::{type_name, Any};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::error::Error;
use crate::value::Value;

/// The erased calling convention shared by every callable
pub type Thunk = dyn Fn(Vec<Value>) -> Result<Vec<Value>, InvocationFault> + Send + Sync;

/// Number of positional arguments a callable accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    /// Whether `count` arguments satisfy this arity
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{}", n),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// A failure to run a callable with the arguments it was given
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvocationFault {
    #[error("argument {position}: expected {expected}, got {found}")]
    ArgumentType {
        position: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("argument {position}: expected {expected}, got nil")]
    NilArgument {
        position: usize,
        expected: &'static str,
    },

    #[error("expected {expected} argument(s), got {got}")]
    Arity { expected: Arity, got: usize },

    #[error("{0}")]
    Other(String),
}

/// An error returned by a callable through the "(value, error)" shape
#[derive(Clone)]
pub struct CallError(Arc<dyn StdError + Send + Sync>);

impl CallError {
    pub fn new(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self(Arc::from(error.into()))
    }

    /// Borrow the underlying error
    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.0
    }

    /// Attempt to view the underlying error as a concrete type
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for CallError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl StdError for CallError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

/// A registered operator, function or method
#[derive(Clone)]
pub struct Callable {
    arity: Arity,
    params: Arc<[&'static str]>,
    thunk: Arc<Thunk>,
}

impl Callable {
    /// Wrap a function returning a single value
    ///
    /// ```
    /// use predicate::Callable;
    ///
    /// let divisible = Callable::new(|value: i64, divisor: i64| value % divisor == 0);
    /// assert_eq!(divisible.params(), ["i64", "i64"]);
    /// ```
    pub fn new<Args, F: IntoCallable<Args>>(f: F) -> Self {
        f.into_callable()
    }

    /// Wrap a function returning `Result<R, E>`
    ///
    /// An `Err` is surfaced to the caller of `parse` as
    /// [`Error::Callable`] with the original error as its source.
    pub fn fallible<Args, F: IntoFallibleCallable<Args>>(f: F) -> Self {
        f.into_fallible_callable()
    }

    /// Wrap a function taking any number of arguments of one type
    pub fn variadic<T, R, F>(f: F) -> Self
    where
        T: Any + Clone + Send + Sync,
        R: Any + Send + Sync,
        F: Fn(Vec<T>) -> R + Send + Sync + 'static,
    {
        Self::from_parts(Arity::AtLeast(0), vec![type_name::<T>()], move |args| {
            let items = args
                .into_iter()
                .enumerate()
                .map(|(i, arg)| downcast_argument::<T>(arg, i + 1))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(vec![Value::new(f(items))])
        })
    }

    /// Wrap a hand-built thunk
    pub fn raw<F>(arity: usize, thunk: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Vec<Value>, InvocationFault> + Send + Sync + 'static,
    {
        Self::from_parts(Arity::Exact(arity), vec!["Value"; arity], thunk)
    }

    fn from_parts<F>(arity: Arity, params: Vec<&'static str>, thunk: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Vec<Value>, InvocationFault> + Send + Sync + 'static,
    {
        Self {
            arity,
            params: params.into(),
            thunk: Arc::new(thunk),
        }
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Parameter type names, for diagnostics
    pub fn params(&self) -> &[&'static str] {
        &self.params
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Callable")
            .field("arity", &self.arity)
            .field("params", &self.params)
            .finish()
    }
}

/// Convert an argument into a concrete parameter type
///
/// A parameter of type [`Value`] receives the argument untouched, nil
/// included. Any other type is downcast from the argument; `position` is
/// 1-based and only used for diagnostics.
pub fn downcast_argument<T: Any + Clone + Send + Sync>(
    value: Value,
    position: usize,
) -> Result<T, InvocationFault> {
    let mut slot = Some(value);
    if let Some(passthrough) = (&mut slot as &mut dyn Any).downcast_mut::<Option<T>>() {
        if let Some(value) = passthrough.take() {
            return Ok(value);
        }
    }

    let value = slot.unwrap_or_default();
    if value.is_nil() {
        return Err(InvocationFault::NilArgument {
            position,
            expected: type_name::<T>(),
        });
    }

    value
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| InvocationFault::ArgumentType {
            position,
            expected: type_name::<T>(),
            found: value.type_name(),
        })
}

/// Functions that can be erased into a "(value)" callable
pub trait IntoCallable<Args> {
    fn into_callable(self) -> Callable;
}

/// Functions that can be erased into a "(value, error)" callable
pub trait IntoFallibleCallable<Args> {
    fn into_fallible_callable(self) -> Callable;
}

fn fixed_arguments<const N: usize>(args: Vec<Value>) -> Result<[Value; N], InvocationFault> {
    let got = args.len();
    args.try_into().map_err(|_| InvocationFault::Arity {
        expected: Arity::Exact(N),
        got,
    })
}

macro_rules! impl_callable_for_arity {
    ($arity:expr $(, $v:ident : $A:ident = $pos:expr )* ) => {
        impl<F, R, $( $A ),*> IntoCallable<( $( $A, )* )> for F
        where
            F: Fn( $( $A ),* ) -> R + Send + Sync + 'static,
            R: Any + Send + Sync,
            $( $A: Any + Clone + Send + Sync, )*
        {
            fn into_callable(self) -> Callable {
                Callable::from_parts(
                    Arity::Exact($arity),
                    vec![ $( type_name::<$A>() ),* ],
                    move |args: Vec<Value>| {
                        let [ $( $v ),* ] = fixed_arguments(args)?;
                        $( let $v: $A = downcast_argument($v, $pos)?; )*
                        Ok(vec![Value::new((self)( $( $v ),* ))])
                    },
                )
            }
        }

        impl<F, R, E, $( $A ),*> IntoFallibleCallable<( $( $A, )* )> for F
        where
            F: Fn( $( $A ),* ) -> Result<R, E> + Send + Sync + 'static,
            R: Any + Send + Sync,
            E: Into<Box<dyn StdError + Send + Sync>>,
            $( $A: Any + Clone + Send + Sync, )*
        {
            fn into_fallible_callable(self) -> Callable {
                Callable::from_parts(
                    Arity::Exact($arity),
                    vec![ $( type_name::<$A>() ),* ],
                    move |args: Vec<Value>| {
                        let [ $( $v ),* ] = fixed_arguments(args)?;
                        $( let $v: $A = downcast_argument($v, $pos)?; )*
                        match (self)( $( $v ),* ) {
                            Ok(value) => Ok(vec![Value::new(value), Value::nil()]),
                            Err(err) => Ok(vec![Value::nil(), Value::new(CallError::new(err))]),
                        }
                    },
                )
            }
        }
    };
}

impl_callable_for_arity!(0);
impl_callable_for_arity!(1, v0: A1 = 1);
impl_callable_for_arity!(2, v0: A1 = 1, v1: A2 = 2);
impl_callable_for_arity!(3, v0: A1 = 1, v1: A2 = 2, v2: A3 = 3);
impl_callable_for_arity!(4, v0: A1 = 1, v1: A2 = 2, v2: A3 = 3, v3: A4 = 4);
impl_callable_for_arity!(5, v0: A1 = 1, v1: A2 = 2, v2: A3 = 3, v3: A4 = 4, v4: A5 = 5);
impl_callable_for_arity!(6, v0: A1 = 1, v1: A2 = 2, v2: A3 = 3, v3: A4 = 4, v4: A5 = 5, v5: A6 = 6);
impl_callable_for_arity!(7, v0: A1 = 1, v1: A2 = 2, v2: A3 = 3, v3: A4 = 4, v4: A5 = 5, v5: A6 = 6, v6: A7 = 7);
impl_callable_for_arity!(8, v0: A1 = 1, v1: A2 = 2, v2: A3 = 3, v3: A4 = 4, v4: A5 = 5, v5: A6 = 6, v6: A7 = 7, v7: A8 = 8);

/// Invoke `callable` and normalize its result shape
pub(crate) fn invoke(callee: &str, callable: &Callable, args: Vec<Value>) -> Result<Value, Error> {
    if !callable.arity.accepts(args.len()) {
        return Err(Error::ArityMismatch {
            callee: callee.to_string(),
            expected: callable.arity,
            got: args.len(),
        });
    }

    trace!(callee, args = args.len(), "invoking callable");

    let returned = (callable.thunk)(args).map_err(|fault| Error::Invocation {
        callee: callee.to_string(),
        fault,
    })?;

    let count = returned.len();
    let mut returned = returned.into_iter();
    match (returned.next(), returned.next(), returned.next()) {
        (Some(value), None, None) => Ok(value),
        (Some(value), Some(status), None) => {
            if status.is_nil() {
                return Ok(value);
            }
            match status.downcast_ref::<CallError>() {
                Some(err) => Err(Error::Callable {
                    callee: callee.to_string(),
                    source: err.clone(),
                }),
                None => Err(Error::MalformedContract {
                    callee: callee.to_string(),
                    detail: format!(
                        "expected error as a second return value, got {}",
                        status.type_name()
                    ),
                }),
            }
        }
        _ => Err(Error::MalformedContract {
            callee: callee.to_string(),
            detail: format!("expected one or two return values, got {}", count),
        }),
    }
}
