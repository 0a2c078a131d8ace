//! Identifiers and simple allocators for graph entities.
//!
//! Ids are strings so documents authored elsewhere keep their ids verbatim
//! (`"entry"`, `"asm_3"`, `"p_1"`, ...). Freshly allocated ids follow the
//! `<prefix>_<n>` convention and never collide with ids already in use.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            #[inline]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Identifier of a state node.
    StateId
);
string_id!(
    /// Identifier of a transition edge.
    TransitionId
);
string_id!(
    /// Identifier of a parameter.
    ParamId
);

/// Well-known ids of the built-in nodes created by [`crate::graph::StateGraph::new`].
pub const ENTRY_ID: &str = "entry";
pub const ANY_ID: &str = "any";
pub const EXIT_ID: &str = "exit";

/// Monotonic allocator for state, transition and parameter ids.
#[derive(Clone, Default, Debug)]
pub struct IdAllocator {
    next_state: u32,
    next_transition: u32,
    next_param: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a state id not rejected by `taken`.
    pub fn alloc_state(&mut self, taken: impl Fn(&str) -> bool) -> StateId {
        StateId(Self::next_free(&mut self.next_state, "asm", taken))
    }

    pub fn alloc_transition(&mut self, taken: impl Fn(&str) -> bool) -> TransitionId {
        TransitionId(Self::next_free(&mut self.next_transition, "edge", taken))
    }

    pub fn alloc_param(&mut self, taken: impl Fn(&str) -> bool) -> ParamId {
        ParamId(Self::next_free(&mut self.next_param, "p", taken))
    }

    fn next_free(counter: &mut u32, prefix: &str, taken: impl Fn(&str) -> bool) -> String {
        loop {
            *counter = counter.wrapping_add(1);
            let candidate = format!("{prefix}_{counter}");
            if !taken(&candidate) {
                return candidate;
            }
        }
    }
}
