use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Backend record identity; the API emits both numbers and strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarText {
    Number(serde_json::Number),
    Text(String),
}

impl ScalarText {
    fn into_string(self) -> String {
        match self {
            ScalarText::Number(number) => number.to_string(),
            ScalarText::Text(text) => text,
        }
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ScalarText::deserialize(deserializer).map(|raw| RecordId(raw.into_string()))
    }
}

fn scalar_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    ScalarText::deserialize(deserializer).map(ScalarText::into_string)
}

fn optional_scalar_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<ScalarText>::deserialize(deserializer).map(|raw| raw.map(ScalarText::into_string))
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: RecordId,
    #[serde(flatten)]
    pub credentials: Credentials,
    #[serde(default, deserialize_with = "optional_scalar_text")]
    pub facebook_user_id: Option<String>,
    #[serde(default)]
    pub total_listings: Option<usize>,
}

impl Account {
    pub fn same_identity(&self, other: &Account) -> bool {
        self.id == other.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoRef {
    pub photo: PhotoFile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoFile {
    #[serde(rename = "photo")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TitleField {
    #[serde(deserialize_with = "scalar_text")]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceField {
    #[serde(deserialize_with = "scalar_text")]
    pub price: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryField {
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConditionField {
    pub condition: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DescriptionField {
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityField {
    pub availability: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagsField {
    pub tags: String,
}

/// Listing as served by `listings/get`. Field records are optional here and
/// checked when the listing is turned into a draft.
#[derive(Debug, Clone, Deserialize)]
pub struct Listing {
    pub id: RecordId,
    #[serde(default)]
    pub posting_id: Option<RecordId>,
    pub account: Account,
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
    #[serde(default)]
    pub title: Option<TitleField>,
    #[serde(default, rename = "postings_price")]
    pub price: Option<PriceField>,
    #[serde(default)]
    pub category: Option<CategoryField>,
    #[serde(default)]
    pub condition: Option<ConditionField>,
    #[serde(default)]
    pub description: Option<DescriptionField>,
    #[serde(default)]
    pub availability: Option<AvailabilityField>,
    #[serde(default)]
    pub tags: Option<TagsField>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListingBatch {
    Wrapped { listings: Vec<Listing> },
    Bare(Vec<Listing>),
}

impl ListingBatch {
    pub fn into_listings(self) -> Vec<Listing> {
        match self {
            ListingBatch::Wrapped { listings } | ListingBatch::Bare(listings) => listings,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaJob {
    pub id: RecordId,
    pub video: String,
    pub photos_group_id: RecordId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Wilaya {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    pub id: RecordId,
    pub name: String,
    pub wilaya: Wilaya,
}

impl Location {
    pub fn display(&self, country: &str) -> String {
        format!("{}, {}, {}", self.name, self.wilaya.name, country)
    }
}

/// Per-listing counters scraped from the selling page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingStats {
    pub title: String,
    pub clicks: String,
    pub location: String,
}
