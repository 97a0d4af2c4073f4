//! Database repositories: one per aggregate root (§4.2).

pub mod alias;
pub mod building;
pub mod listing;
pub mod master_property;
pub mod merge;

pub use alias::AliasRepository;
pub use building::BuildingRepository;
pub use listing::ListingRepository;
pub use master_property::MasterPropertyRepository;
pub use merge::MergeRepository;
