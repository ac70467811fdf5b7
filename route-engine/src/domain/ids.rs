//! Record identifier types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when constructing an identifier from invalid input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} identifier: {reason}")]
pub struct InvalidId {
    kind: &'static str,
    reason: &'static str,
}

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier string.
            ///
            /// Returns an error if the string is empty.
            pub fn new(s: impl Into<String>) -> Result<Self, InvalidId> {
                let s = s.into();
                if s.is_empty() {
                    return Err(InvalidId {
                        kind: $kind,
                        reason: "identifier cannot be empty",
                    });
                }
                Ok($name(s))
            }

            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                $name(uuid::Uuid::new_v4().to_string())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the identifier and returns the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidId;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                $name::new(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

record_id!(
    /// Primary key of a Route.
    ///
    /// Opaque and immutable once assigned.
    ///
    /// # Examples
    ///
    /// ```
    /// use route_engine::domain::RouteId;
    ///
    /// let id = RouteId::new("route-1").unwrap();
    /// assert_eq!(id.as_str(), "route-1");
    ///
    /// // Empty strings are rejected
    /// assert!(RouteId::new("").is_err());
    /// ```
    RouteId,
    "route"
);

record_id!(
    /// Primary key of a Stop.
    ///
    /// Opaque and immutable once assigned.
    StopId,
    "stop"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_valid_id() {
        assert!(RouteId::new("a").is_ok());
        assert!(StopId::new("0B7A4E8C-1D1B-4F0E-9F43-6E1C2A9E1E10").is_ok());
    }

    #[test]
    fn reject_empty() {
        assert!(RouteId::new("").is_err());
        assert!(StopId::new(String::new()).is_err());
    }

    #[test]
    fn error_names_kind() {
        let err = StopId::new("").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid stop identifier: identifier cannot be empty"
        );
    }

    #[test]
    fn generated_ids_are_distinct() {
        let a = StopId::generate();
        let b = StopId::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn display_and_debug() {
        let id = RouteId::new("R1").unwrap();
        assert_eq!(format!("{}", id), "R1");
        assert_eq!(format!("{:?}", id), "RouteId(R1)");
    }

    #[test]
    fn serde_rejects_empty() {
        assert!(serde_json::from_str::<StopId>("\"\"").is_err());
        let id: StopId = serde_json::from_str("\"s1\"").unwrap();
        assert_eq!(id.as_str(), "s1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"s1\"");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any non-empty string is a valid identifier
        #[test]
        fn nonempty_always_valid(s in ".+") {
            prop_assert!(StopId::new(s).is_ok());
        }

        /// Roundtrip: new then as_str returns the original
        #[test]
        fn roundtrip(s in ".+") {
            let id = RouteId::new(s.clone()).unwrap();
            prop_assert_eq!(id.as_str(), s.as_str());
        }
    }
}
