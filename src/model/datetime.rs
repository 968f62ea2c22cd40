//! The bson crate ships a serde helper for `chrono::DateTime<Utc>` but not
//! for `Option<DateTime<Utc>>`. This module fills in the gap.

use chrono::{DateTime, Utc};
use mongodb::bson;
use serde::{Deserialize, Deserializer, Serializer};

/// Use with `#[serde(with = "opt_chrono_datetime_as_bson_datetime")]` on
/// optional timestamp fields that should be stored as native BSON datetimes.
pub mod opt_chrono_datetime_as_bson_datetime {
    use super::*;

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(datetime) => serializer.serialize_some(&bson::DateTime::from_chrono(*datetime)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let datetime = Option::<bson::DateTime>::deserialize(deserializer)?;
        Ok(datetime.map(bson::DateTime::to_chrono))
    }
}
