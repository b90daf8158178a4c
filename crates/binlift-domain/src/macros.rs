//! Common macros for domain types.

/// Define a strong-typed UUID identifier.
///
/// Generates a newtype over [`uuid::Uuid`] with serde, schemars and
/// `derive_more` display support plus the standard constructors.
#[macro_export]
macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            derive_more::Display,
            derive_more::From,
            derive_more::Into,
            serde::Serialize,
            serde::Deserialize,
            schemars::JsonSchema,
        )]
        #[display("{_0}")]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Generate a new random UUID v4 identifier.
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Wrap an existing [`uuid::Uuid`].
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Derive a deterministic v5 UUID from a human-readable name.
            ///
            /// The namespace is scoped per type so `JobId::from_name("x")`
            /// and `WorkerId::from_name("x")` produce different UUIDs.
            pub fn from_name(name: &str) -> Self {
                let ns =
                    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, stringify!($name).as_bytes());
                Self(uuid::Uuid::new_v5(&ns, name.as_bytes()))
            }

            /// Parse from the canonical hyphenated string form.
            pub fn parse(s: &str) -> $crate::error::Result<Self> {
                uuid::Uuid::parse_str(s).map(Self).map_err(|e| {
                    $crate::error::Error::invalid_argument(format!(
                        "invalid {}: {e}",
                        stringify!($name)
                    ))
                })
            }

            /// Access the inner [`uuid::Uuid`].
            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::Error;

            fn from_str(s: &str) -> $crate::error::Result<Self> {
                Self::parse(s)
            }
        }
    };
}
