//! Cheaply-cloneable identifier newtypes.
//!
//! Every id-shaped value in the system shares the same representation: an
//! `Arc<str>` behind a distinct type, so cloning an id is a refcount bump
//! and mixing up a `RunId` with a `WorkerId` is a compile error.

use std::sync::Arc;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Clone, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(Arc::from(s.into()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Ok(Self::new(s))
            }
        }
    };
}

id_type!(ProjectId);
id_type!(TaskId);
id_type!(TicketId);
id_type!(RunId);
id_type!(WorkerId);
id_type!(AgentId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_is_cheap_and_equal() {
        let a = RunId::new("run-1");
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "run-1");
        assert_eq!(format!("{a}"), "run-1");
    }

    #[test]
    fn distinct_id_types_do_not_mix() {
        let run = RunId::new("x");
        let worker = WorkerId::new("x");
        // Compile-time: `run == worker` would not type-check. At runtime
        // the two are just independently-constructed newtypes.
        assert_eq!(run.as_str(), worker.as_str());
    }

    #[test]
    fn serde_roundtrip() {
        let id = TicketId::new("proj-0001");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"proj-0001\"");
        let back: TicketId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
