//! Entity identifiers.
//!
//! The upstream scraper this system descends from keys every table
//! with a plain autoincrement integer, and the merge/revert operator
//! (§4.7) depends on being able to name "the original id" and reuse it
//! on revert. A random UUID carries no such ordering, so entity ids
//! here are `i64` newtypes over `BIGSERIAL` primary keys rather than
//! the UUID convention used for org/user-facing entities elsewhere in
//! this codebase.

use serde::{Deserialize, Serialize};
use sqlx::Type;
use std::fmt;
use utoipa::ToSchema;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize, ToSchema,
        )]
        #[sqlx(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(v: i64) -> Self {
                Self(v)
            }
        }

        impl From<$name> for i64 {
            fn from(v: $name) -> Self {
                v.0
            }
        }
    };
}

id_newtype!(BuildingId);
id_newtype!(MasterPropertyId);
id_newtype!(ListingId);
id_newtype!(PriceHistoryId);
id_newtype!(MergeHistoryId);
id_newtype!(MergeExclusionId);
id_newtype!(AliasId);
