mod client;
mod error;
mod models;

pub use client::{BackendApi, HttpBackend};
pub use error::{BackendError, BackendResult};
pub use models::{
    Account, AvailabilityField, CategoryField, ConditionField, Credentials, DescriptionField,
    Listing, ListingBatch, ListingStats, Location, MediaJob, PhotoFile, PhotoRef, PriceField,
    RecordId, TagsField, TitleField, Wilaya,
};
