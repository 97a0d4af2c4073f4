//! Database models (§3).

pub mod alias;
pub mod building;
pub mod ids;
pub mod listing;
pub mod master_property;
pub mod merge;

pub use alias::AliasEntry;
pub use building::{Building, BuildingAggregateUpdate, NewBuilding};
pub use ids::{
    AliasId, BuildingId, ListingId, MasterPropertyId, MergeExclusionId, MergeHistoryId,
    PriceHistoryId,
};
pub use listing::{Listing, ListingUpsert, PriceHistoryEntry, PropertyPriceChange};
pub use master_property::{MasterProperty, NewMasterProperty, PropertyLifecycleUpdate};
pub use merge::{
    order_property_pair, BuildingMergeExclusion, BuildingMergeHistory, BuildingSnapshot,
    MasterPropertySnapshot, PropertyMergeExclusion, PropertyMergeHistory,
};
