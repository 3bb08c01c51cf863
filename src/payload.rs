//! Type-erased payload carried by an [`Outcome`](crate::Outcome).

use std::any::{self, Any};
use std::fmt;

/// A value of any `Send + Sync` type, retrieved by downcasting.
///
/// The concrete type's name is kept alongside the value so that mismatches can
/// be reported without knowing the type in advance.
///
/// # Examples
///
/// ```
/// use kusari::Payload;
///
/// let payload = Payload::new(42u64);
///
/// assert!(payload.is::<u64>());
/// assert_eq!(payload.downcast_ref::<u64>(), Some(&42));
///
/// // Wrong type returns None
/// assert_eq!(payload.downcast_ref::<String>(), None);
/// assert_eq!(payload.type_name(), "u64");
/// ```
pub struct Payload {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Payload {
    /// Wraps a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: any::type_name::<T>(),
        }
    }

    /// Returns `true` if the payload holds a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Returns a reference to the value if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Takes the value out if it is a `T`, otherwise hands the payload back.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        let type_name = self.type_name;
        self.value
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|value| Self { value, type_name })
    }

    /// Returns the name of the stored value's type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_ref() {
        let payload = Payload::new("hello".to_string());

        assert_eq!(
            payload.downcast_ref::<String>().map(|s| s.as_str()),
            Some("hello")
        );
        assert_eq!(payload.downcast_ref::<&str>(), None);
    }

    #[test]
    fn test_downcast_hands_back_on_mismatch() {
        let payload = Payload::new(7i32);

        let payload = match payload.downcast::<u8>() {
            Ok(_) => panic!("i32 payload must not downcast to u8"),
            Err(payload) => payload,
        };
        assert_eq!(payload.type_name(), "i32");
        assert_eq!(payload.downcast::<i32>().ok(), Some(7));
    }

    #[test]
    fn test_debug_shows_type_name() {
        let payload = Payload::new(vec![1u8, 2, 3]);
        let debug = format!("{:?}", payload);
        assert!(debug.contains("alloc::vec::Vec<u8>"));
    }
}
