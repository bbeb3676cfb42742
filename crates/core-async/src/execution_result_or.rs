//! A value or the execution result explaining why there is none

use crate::errors::SC_EXECUTION_RESULT_OR_MISSING_VALUE;
use crate::execution_result::ExecutionResult;
use std::ops::{Deref, DerefMut};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Repr<T> {
    /// Constructed from a value; `None` once the value has been released
    Value(Option<T>),
    Result(ExecutionResult),
}

/// Either a value of type `T` (success) or a non-successful [`ExecutionResult`].
///
/// Accessing the value of a failed instance through [`value`](Self::value),
/// [`into_value`](Self::into_value) or dereference panics: reading a value
/// that does not exist is a programming error. [`value_or`](Self::value_or)
/// and [`release`](Self::release) never panic.
///
/// A successful `ExecutionResult` cannot describe a missing value, so
/// [`from_result`](Self::from_result) turns it into
/// `Failure(SC_EXECUTION_RESULT_OR_MISSING_VALUE)`.
///
/// # Example
///
/// ```
/// use cpio_core_async::{ExecutionResult, ExecutionResultOr};
/// use cpio_core_async::errors::SC_UNKNOWN;
///
/// let mut found = ExecutionResultOr::new(String::from("us-east-1"));
/// assert!(found.has_value());
/// assert_eq!(found.value(), "us-east-1");
/// assert_eq!(found.release().as_deref(), Some("us-east-1"));
/// assert_eq!(found.release(), None); // second release is harmless
///
/// let missing: ExecutionResultOr<String> = ExecutionResult::retry(SC_UNKNOWN).into();
/// assert_eq!(missing.value_or("fallback".to_string()), "fallback");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResultOr<T> {
    repr: Repr<T>,
}

impl<T> ExecutionResultOr<T> {
    /// A successful instance holding `value`
    pub fn new(value: T) -> Self {
        Self {
            repr: Repr::Value(Some(value)),
        }
    }

    /// A failed instance carrying `result`
    pub fn from_result(result: ExecutionResult) -> Self {
        let result = if result.successful() {
            ExecutionResult::failure(SC_EXECUTION_RESULT_OR_MISSING_VALUE)
        } else {
            result
        };
        Self {
            repr: Repr::Result(result),
        }
    }

    /// True iff this instance was constructed from a value.
    ///
    /// Stays true after the value has been released.
    pub fn has_value(&self) -> bool {
        matches!(self.repr, Repr::Value(_))
    }

    pub fn successful(&self) -> bool {
        self.has_value()
    }

    /// True once the value has been moved out with [`release`](Self::release)
    pub fn is_released(&self) -> bool {
        matches!(self.repr, Repr::Value(None))
    }

    /// `Success` when constructed from a value, the carried result otherwise
    pub fn result(&self) -> ExecutionResult {
        match &self.repr {
            Repr::Value(_) => ExecutionResult::success(),
            Repr::Result(result) => *result,
        }
    }

    /// Borrow the value.
    ///
    /// # Panics
    ///
    /// Panics if there is no value or it has already been released.
    #[track_caller]
    pub fn value(&self) -> &T {
        match &self.repr {
            Repr::Value(Some(value)) => value,
            Repr::Value(None) => panic!("ExecutionResultOr value was already released"),
            Repr::Result(result) => panic!("ExecutionResultOr has no value: {result}"),
        }
    }

    /// Mutably borrow the value.
    ///
    /// # Panics
    ///
    /// Panics if there is no value or it has already been released.
    #[track_caller]
    pub fn value_mut(&mut self) -> &mut T {
        match &mut self.repr {
            Repr::Value(Some(value)) => value,
            Repr::Value(None) => panic!("ExecutionResultOr value was already released"),
            Repr::Result(result) => panic!("ExecutionResultOr has no value: {result}"),
        }
    }

    /// Consume and return the value.
    ///
    /// # Panics
    ///
    /// Panics if there is no value or it has already been released.
    #[track_caller]
    pub fn into_value(self) -> T {
        match self.repr {
            Repr::Value(Some(value)) => value,
            Repr::Value(None) => panic!("ExecutionResultOr value was already released"),
            Repr::Result(result) => panic!("ExecutionResultOr has no value: {result}"),
        }
    }

    /// Move the value out, leaving the container in its released state.
    ///
    /// Returns `None` for failed instances and on every call after the first.
    pub fn release(&mut self) -> Option<T> {
        match &mut self.repr {
            Repr::Value(slot) => slot.take(),
            Repr::Result(_) => None,
        }
    }

    /// The held value, or `default` when there is none
    pub fn value_or(self, default: T) -> T {
        match self.repr {
            Repr::Value(Some(value)) => value,
            _ => default,
        }
    }

    /// The held value, or the output of `default` when there is none
    pub fn value_or_else<F>(self, default: F) -> T
    where
        F: FnOnce(ExecutionResult) -> T,
    {
        let result = self.result();
        match self.repr {
            Repr::Value(Some(value)) => value,
            _ => default(result),
        }
    }

    /// View with a borrowed value, e.g. `outcome.as_ref().value_or(&fallback)`
    pub fn as_ref(&self) -> ExecutionResultOr<&T> {
        let repr = match &self.repr {
            Repr::Value(value) => Repr::Value(value.as_ref()),
            Repr::Result(result) => Repr::Result(*result),
        };
        ExecutionResultOr { repr }
    }

    /// View with a mutably borrowed value
    pub fn as_mut(&mut self) -> ExecutionResultOr<&mut T> {
        let repr = match &mut self.repr {
            Repr::Value(value) => Repr::Value(value.as_mut()),
            Repr::Result(result) => Repr::Result(*result),
        };
        ExecutionResultOr { repr }
    }

    /// Transform the held value, preserving a failure
    pub fn map<U, F>(self, f: F) -> ExecutionResultOr<U>
    where
        F: FnOnce(T) -> U,
    {
        let repr = match self.repr {
            Repr::Value(value) => Repr::Value(value.map(f)),
            Repr::Result(result) => Repr::Result(result),
        };
        ExecutionResultOr { repr }
    }

    /// Convert into a `Result`; a released instance reports a missing value
    pub fn into_result(self) -> Result<T, ExecutionResult> {
        match self.repr {
            Repr::Value(Some(value)) => Ok(value),
            Repr::Value(None) => Err(ExecutionResult::failure(
                SC_EXECUTION_RESULT_OR_MISSING_VALUE,
            )),
            Repr::Result(result) => Err(result),
        }
    }
}

impl<T> From<ExecutionResult> for ExecutionResultOr<T> {
    fn from(result: ExecutionResult) -> Self {
        Self::from_result(result)
    }
}

impl<T> From<Result<T, ExecutionResult>> for ExecutionResultOr<T> {
    fn from(result: Result<T, ExecutionResult>) -> Self {
        match result {
            Ok(value) => Self::new(value),
            Err(result) => Self::from_result(result),
        }
    }
}

impl<T> Deref for ExecutionResultOr<T> {
    type Target = T;

    #[track_caller]
    fn deref(&self) -> &T {
        self.value()
    }
}

impl<T> DerefMut for ExecutionResultOr<T> {
    #[track_caller]
    fn deref_mut(&mut self) -> &mut T {
        self.value_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SC_UNKNOWN;
    use crate::return_if_failure;

    /// Neither `Clone` nor `Default`
    #[derive(Debug, PartialEq, Eq)]
    struct Token(u32);

    #[test]
    fn test_value_round_trip() {
        let outcome = ExecutionResultOr::new(Token(7));
        assert!(outcome.has_value());
        assert!(outcome.result().successful());
        assert_eq!(outcome.value(), &Token(7));
        assert_eq!(*outcome, Token(7));
        assert_eq!(outcome.into_value(), Token(7));
    }

    #[test]
    fn test_release_twice_does_not_panic() {
        let mut outcome = ExecutionResultOr::new(Token(3));
        assert_eq!(outcome.release(), Some(Token(3)));
        assert_eq!(outcome.release(), None);
        assert_eq!(outcome.release(), None);

        // moved-from state remains queryable
        assert!(outcome.has_value());
        assert!(outcome.is_released());
        assert!(outcome.result().successful());
    }

    #[test]
    fn test_release_on_failure_is_none() {
        let mut outcome: ExecutionResultOr<Token> = ExecutionResult::failure(SC_UNKNOWN).into();
        assert_eq!(outcome.release(), None);
        assert!(!outcome.is_released());
    }

    #[test]
    #[should_panic(expected = "has no value")]
    fn test_value_on_failure_panics() {
        let outcome: ExecutionResultOr<Token> = ExecutionResult::retry(SC_UNKNOWN).into();
        let _ = outcome.value();
    }

    #[test]
    #[should_panic(expected = "has no value")]
    fn test_deref_on_failure_panics() {
        let outcome: ExecutionResultOr<Token> = ExecutionResult::failure(SC_UNKNOWN).into();
        let _ = &*outcome;
    }

    #[test]
    #[should_panic(expected = "already released")]
    fn test_value_after_release_panics() {
        let mut outcome = ExecutionResultOr::new(Token(1));
        outcome.release();
        let _ = outcome.value();
    }

    #[test]
    fn test_value_or_move() {
        let present = ExecutionResultOr::new(Token(1));
        assert_eq!(present.value_or(Token(9)), Token(1));

        let absent: ExecutionResultOr<Token> = ExecutionResult::retry(SC_UNKNOWN).into();
        assert_eq!(absent.value_or(Token(9)), Token(9));
    }

    #[test]
    fn test_value_or_const_ref() {
        let fallback = Token(9);
        let present = ExecutionResultOr::new(Token(1));
        let absent: ExecutionResultOr<Token> = ExecutionResult::failure(SC_UNKNOWN).into();

        assert_eq!(present.as_ref().value_or(&fallback), &Token(1));
        assert_eq!(absent.as_ref().value_or(&fallback), &Token(9));

        // receivers are untouched
        assert!(present.has_value());
        assert!(!absent.has_value());
    }

    #[test]
    fn test_value_or_mut_ref() {
        let mut fallback = Token(9);
        let mut present = ExecutionResultOr::new(Token(1));

        present.as_mut().value_or(&mut fallback).0 = 5;
        assert_eq!(present.value(), &Token(5));

        let mut absent: ExecutionResultOr<Token> = ExecutionResult::failure(SC_UNKNOWN).into();
        absent.as_mut().value_or(&mut fallback).0 = 6;
        assert_eq!(fallback, Token(6));
    }

    #[test]
    fn test_value_or_after_release_uses_default() {
        let mut outcome = ExecutionResultOr::new(Token(1));
        outcome.release();
        assert_eq!(outcome.value_or(Token(2)), Token(2));
    }

    #[test]
    fn test_value_or_else_sees_result() {
        let absent: ExecutionResultOr<u64> = ExecutionResult::retry(SC_UNKNOWN).into();
        assert_eq!(absent.value_or_else(|r| r.status_code()), SC_UNKNOWN);
    }

    #[test]
    fn test_successful_result_is_not_a_value() {
        let outcome: ExecutionResultOr<Token> = ExecutionResult::success().into();
        assert!(!outcome.has_value());
        assert!(outcome.result().is_failure());
        assert_eq!(
            outcome.result().status_code(),
            SC_EXECUTION_RESULT_OR_MISSING_VALUE
        );
    }

    #[test]
    fn test_map_and_into_result() {
        let doubled = ExecutionResultOr::new(21).map(|v| v * 2);
        assert_eq!(doubled.into_result(), Ok(42));

        let failed: ExecutionResultOr<i32> = ExecutionResult::failure(SC_UNKNOWN).into();
        assert_eq!(
            failed.map(|v| v * 2).into_result(),
            Err(ExecutionResult::failure(SC_UNKNOWN))
        );
    }

    fn lookup(step: ExecutionResult) -> ExecutionResultOr<u32> {
        return_if_failure!(step);
        ExecutionResultOr::new(10)
    }

    #[test]
    fn test_return_if_failure_into_result_or() {
        assert_eq!(lookup(ExecutionResult::success()).into_value(), 10);
        let failed = lookup(ExecutionResult::retry(SC_UNKNOWN));
        assert!(failed.result().is_retry());
    }
}
