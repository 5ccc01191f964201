//! Utility functions shared across the crate.

use crate::error::StoreError;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::error;

/// Declare a numeric record id: transparent in serde, parseable from CLI args.
macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map($name)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                $name(value)
            }
        }
    };
}

pub(crate) use numeric_id;

// Lock accessors for the in-memory stores. A poisoned lock means a writer
// panicked mid-mutation, so the tree may be half-edited: surface it as a
// store fault and let access checks fail closed.

/// Acquire a shared guard on a store's state
pub fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    store: &'static str,
) -> Result<RwLockReadGuard<'a, T>, StoreError> {
    lock.read().map_err(|_| {
        error!(store, "store lock poisoned");
        StoreError::Poisoned { store }
    })
}

/// Acquire the single writer guard on a store's state
pub fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    store: &'static str,
) -> Result<RwLockWriteGuard<'a, T>, StoreError> {
    lock.write().map_err(|_| {
        error!(store, "store lock poisoned");
        StoreError::Poisoned { store }
    })
}
