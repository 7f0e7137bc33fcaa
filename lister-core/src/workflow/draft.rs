use crate::backend::{Listing, RecordId};

use super::WorkflowError;

/// A listing with every required field present, ready to be typed into the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingDraft {
    pub listing_id: RecordId,
    pub posting_id: RecordId,
    pub title: String,
    pub price: String,
    pub category: String,
    pub condition: String,
    pub description: Option<String>,
    pub availability: String,
    pub tags: Option<String>,
    pub photo_urls: Vec<String>,
}

impl ListingDraft {
    pub fn from_listing(listing: &Listing) -> Result<Self, WorkflowError> {
        let posting_id = listing
            .posting_id
            .clone()
            .filter(|id| !id.as_str().trim().is_empty())
            .ok_or(WorkflowError::MissingField("posting_id"))?;
        Ok(Self {
            listing_id: listing.id.clone(),
            posting_id,
            title: required("title", listing.title.as_ref().map(|f| f.title.as_str()))?,
            price: required("price", listing.price.as_ref().map(|f| f.price.as_str()))?,
            category: required(
                "category",
                listing.category.as_ref().map(|f| f.category.as_str()),
            )?,
            condition: required(
                "condition",
                listing.condition.as_ref().map(|f| f.condition.as_str()),
            )?,
            description: optional(listing.description.as_ref().map(|f| f.description.as_str())),
            availability: required(
                "availability",
                listing.availability.as_ref().map(|f| f.availability.as_str()),
            )?,
            tags: optional(listing.tags.as_ref().map(|f| f.tags.as_str())),
            photo_urls: listing
                .photos
                .iter()
                .map(|photo| photo.photo.url.clone())
                .collect(),
        })
    }
}

fn required(name: &'static str, value: Option<&str>) -> Result<String, WorkflowError> {
    optional(value).ok_or(WorkflowError::MissingField(name))
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
}
