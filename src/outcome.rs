use crate::payload::Payload;
use std::any::Any;
use std::fmt;

/// The result of a single step.
///
/// An outcome is either successful or failed. A failed outcome carries a
/// diagnostic message, a successful one never does. Either kind may carry a
/// payload of any `Send + Sync` type.
///
/// Outcomes are read-only once constructed.
///
/// # Examples
///
/// ```
/// use kusari::Outcome;
///
/// let outcome = Outcome::ok();
/// assert!(outcome.is_ok());
/// assert_eq!(outcome.message(), "");
///
/// let outcome = Outcome::ok_with(42u32);
/// assert_eq!(outcome.payload::<u32>(), Some(&42));
///
/// let outcome = Outcome::failed("connection refused");
/// assert!(outcome.is_failed());
/// assert_eq!(outcome.message(), "connection refused");
/// ```
pub struct Outcome {
    failed: bool,
    message: String,
    payload: Option<Payload>,
}

impl Outcome {
    /// Creates a successful outcome without a payload.
    pub fn ok() -> Self {
        Self {
            failed: false,
            message: String::new(),
            payload: None,
        }
    }

    /// Creates a successful outcome carrying `value`.
    pub fn ok_with<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            failed: false,
            message: String::new(),
            payload: Some(Payload::new(value)),
        }
    }

    /// Creates a failed outcome without a payload.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            failed: true,
            message: message.into(),
            payload: None,
        }
    }

    /// Creates a failed outcome carrying `value`.
    pub fn failed_with<T: Any + Send + Sync>(message: impl Into<String>, value: T) -> Self {
        Self {
            failed: true,
            message: message.into(),
            payload: Some(Payload::new(value)),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn is_ok(&self) -> bool {
        !self.failed
    }

    /// Diagnostic message. Always empty for successful outcomes.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Returns the payload if there is one and it is a `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref().and_then(|p| p.downcast_ref::<T>())
    }

    /// Name of the payload's type, if there is a payload.
    pub fn payload_type_name(&self) -> Option<&'static str> {
        self.payload.as_ref().map(Payload::type_name)
    }

    /// Narrows into a [`TypedOutcome<T>`].
    ///
    /// Fails, handing the outcome back untouched, when there is no payload or
    /// the payload is not a `T`.
    ///
    /// ```
    /// use kusari::Outcome;
    ///
    /// let typed = Outcome::ok_with("alice".to_string()).narrow::<String>().unwrap();
    /// assert_eq!(typed.value(), "alice");
    ///
    /// let outcome = Outcome::ok_with(1u8).narrow::<String>().unwrap_err();
    /// assert_eq!(outcome.payload::<u8>(), Some(&1));
    /// ```
    pub fn narrow<T: Any>(self) -> Result<TypedOutcome<T>, Outcome> {
        let Outcome {
            failed,
            message,
            payload,
        } = self;

        match payload.map(Payload::downcast::<T>) {
            Some(Ok(value)) => Ok(TypedOutcome {
                failed,
                message,
                value,
            }),
            Some(Err(payload)) => Err(Outcome {
                failed,
                message,
                payload: Some(payload),
            }),
            None => Err(Outcome {
                failed,
                message,
                payload: None,
            }),
        }
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outcome")
            .field("failed", &self.failed)
            .field("message", &self.message)
            .field("payload", &self.payload_type_name())
            .finish()
    }
}

/// An outcome whose payload type is known.
///
/// Every `TypedOutcome<T>` converts into a plain [`Outcome`]; going the other
/// way is [`Outcome::narrow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedOutcome<T> {
    failed: bool,
    message: String,
    value: T,
}

impl<T> TypedOutcome<T> {
    /// Creates a successful outcome carrying `value`.
    pub fn ok(value: T) -> Self {
        Self {
            failed: false,
            message: String::new(),
            value,
        }
    }

    /// Creates a failed outcome carrying `value`.
    pub fn failed(message: impl Into<String>, value: T) -> Self {
        Self {
            failed: true,
            message: message.into(),
            value,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn is_ok(&self) -> bool {
        !self.failed
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    /// Splits into `(failed, message, value)`.
    pub fn into_parts(self) -> (bool, String, T) {
        (self.failed, self.message, self.value)
    }
}

impl<T: Any + Send + Sync> From<TypedOutcome<T>> for Outcome {
    fn from(typed: TypedOutcome<T>) -> Self {
        Outcome {
            failed: typed.failed,
            message: typed.message,
            payload: Some(Payload::new(typed.value)),
        }
    }
}
