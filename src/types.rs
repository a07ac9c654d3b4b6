//! NewType wrappers and identifier types shared across the sync core.
//!
//! These types prevent accidental mixing of semantically different strings
//! (e.g., passing an external subject where an auth module name is expected).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the inner value is the empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

newtype_string!(
    /// Name of the auth method that authenticated the identity.
    ///
    /// Common values: "oauth_github", "ldap", "jwt", "password".
    AuthModule
);

newtype_string!(
    /// Subject identifier issued by the external auth method.
    ///
    /// Together with the `AuthModule` this forms the key of an auth
    /// association (e.g., the OAuth `sub` claim).
    AuthSubject
);

/// Numeric database identifier of a user record.
pub type UserId = i64;

/// Entity kind an identity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    User,
    ApiKey,
    ServiceAccount,
    Anonymous,
    Render,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::ApiKey => "api-key",
            Self::ServiceAccount => "service-account",
            Self::Anonymous => "anonymous",
            Self::Render => "render",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "api-key" | "apikey" => Ok(Self::ApiKey),
            "service-account" => Ok(Self::ServiceAccount),
            "anonymous" => Ok(Self::Anonymous),
            "render" => Ok(Self::Render),
            other => Err(ParseIdError::UnknownNamespace(other.to_string())),
        }
    }
}

/// Errors produced when parsing a `NamespacedId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseIdError {
    /// The value has no `:` separator.
    MissingSeparator(String),
    /// The namespace part is not a known entity kind.
    UnknownNamespace(String),
    /// The id part is not a valid integer.
    InvalidNumber(String),
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator(v) => write!(f, "Namespaced id has no separator: {}", v),
            Self::UnknownNamespace(ns) => write!(f, "Unknown namespace: {}", ns),
            Self::InvalidNumber(v) => write!(f, "Invalid numeric id: {}", v),
        }
    }
}

impl std::error::Error for ParseIdError {}

/// Identifier tagged with its entity kind, rendered as `"<namespace>:<id>"`.
///
/// The tag lets hooks tell user-backed identities apart from API keys and
/// service accounts, which never map onto a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespacedId {
    namespace: Namespace,
    id: i64,
}

impl NamespacedId {
    pub fn new(namespace: Namespace, id: i64) -> Self {
        Self { namespace, id }
    }

    /// Shorthand for an identifier in the user namespace.
    pub fn user(id: UserId) -> Self {
        Self::new(Namespace::User, id)
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn is_user(&self) -> bool {
        self.namespace == Namespace::User
    }

    /// The numeric user id, if this identifier is user-namespaced.
    pub fn user_id(&self) -> Option<UserId> {
        self.is_user().then_some(self.id)
    }
}

impl fmt::Display for NamespacedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.id)
    }
}

impl FromStr for NamespacedId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, id) = s
            .rsplit_once(':')
            .ok_or_else(|| ParseIdError::MissingSeparator(s.to_string()))?;
        let namespace = namespace.parse()?;
        let id = id
            .parse::<i64>()
            .map_err(|_| ParseIdError::InvalidNumber(id.to_string()))?;
        Ok(Self { namespace, id })
    }
}

impl Serialize for NamespacedId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NamespacedId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_id_display() {
        assert_eq!(NamespacedId::user(42).to_string(), "user:42");
        assert_eq!(
            NamespacedId::new(Namespace::ServiceAccount, 7).to_string(),
            "service-account:7"
        );
    }

    #[test]
    fn test_namespaced_id_parse() {
        let id: NamespacedId = "user:1".parse().unwrap();
        assert!(id.is_user());
        assert_eq!(id.user_id(), Some(1));

        let key: NamespacedId = "apikey:1".parse().unwrap();
        assert_eq!(key.namespace(), Namespace::ApiKey);
        assert_eq!(key.user_id(), None);
    }

    #[test]
    fn test_namespaced_id_parse_errors() {
        assert_eq!(
            "user1".parse::<NamespacedId>(),
            Err(ParseIdError::MissingSeparator("user1".to_string()))
        );
        assert_eq!(
            "team:1".parse::<NamespacedId>(),
            Err(ParseIdError::UnknownNamespace("team".to_string()))
        );
        assert_eq!(
            "user:abc".parse::<NamespacedId>(),
            Err(ParseIdError::InvalidNumber("abc".to_string()))
        );
    }

    #[test]
    fn test_namespaced_id_serde() {
        let json = serde_json::to_string(&NamespacedId::user(3)).unwrap();
        assert_eq!(json, "\"user:3\"");

        let back: NamespacedId = serde_json::from_str("\"api-key:9\"").unwrap();
        assert_eq!(back, NamespacedId::new(Namespace::ApiKey, 9));
    }

    #[test]
    fn test_auth_module_newtype() {
        let module = AuthModule::from("oauth");
        assert_eq!(module.as_str(), "oauth");
        assert!(!module.is_empty());
        assert!(AuthSubject::new("").is_empty());
    }
}
