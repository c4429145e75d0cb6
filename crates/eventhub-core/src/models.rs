//! Records, activities, and the views the store hands back.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Field name → string value, as imported from a source.
pub type Fields = BTreeMap<String, String>;

/// Time format used when an activity moment is sent back to its source.
pub const REPLAY_TIME_FORMAT: &str = "%-d %b %Y %H:%M:%S";

/// One tracked entity, keyed by an externally supplied identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub key: String,
    pub fields: Fields,
}

impl Item {
    /// Creates an item, rejecting an empty key.
    ///
    /// # Examples
    ///
    /// ```
    /// use eventhub_core::models::{Fields, Item};
    ///
    /// let item = Item::new("101", Fields::new()).unwrap();
    /// assert_eq!(item.key, "101");
    /// assert!(Item::new("", Fields::new()).is_err());
    /// ```
    pub fn new(key: impl Into<String>, fields: Fields) -> Result<Self, AppError> {
        let key = key.into();
        if key.is_empty() {
            return Err(AppError::EmptyKey);
        }
        Ok(Self { key, fields })
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// A timestamped event recorded against an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub action: String,
    pub properties: Fields,
    pub created: DateTime<Utc>,
}

impl Activity {
    pub fn new(action: impl Into<String>, properties: Fields) -> Self {
        Self::at(action, properties, Utc::now())
    }

    pub fn at(action: impl Into<String>, properties: Fields, created: DateTime<Utc>) -> Self {
        Self {
            action: action.into(),
            properties,
            created,
        }
    }

    /// Properties sent to the source when this activity is replayed.
    ///
    /// The activity moment is injected under the action name, overwriting
    /// any property with the same name.
    pub fn replay_properties(&self) -> Fields {
        let mut properties = self.properties.clone();
        properties.insert(
            self.action.clone(),
            self.created.format(REPLAY_TIME_FORMAT).to_string(),
        );
        properties
    }
}

/// The activity log of one item, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemActivities {
    pub key: String,
    pub activities: Vec<Activity>,
}

impl ItemActivities {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            activities: Vec::new(),
        }
    }

    /// Puts `activity` on top of the log.
    pub fn prepend(&mut self, activity: Activity) {
        self.activities.insert(0, activity);
    }
}

/// An item together with its activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: Item,
    pub activities: Vec<Activity>,
}

impl ItemDetail {
    pub fn new(item: Item, activities: ItemActivities) -> Self {
        Self {
            item,
            activities: activities.activities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_new_item_rejects_empty_key() {
        let result = Item::new("", fields(&[("field1", "data1")]));
        assert!(matches!(result, Err(AppError::EmptyKey)));
    }

    #[test]
    fn test_new_item_with_empty_fields() {
        let item = Item::new("myKey", Fields::new()).unwrap();
        assert_eq!(item.key, "myKey");
        assert!(item.fields.is_empty());
    }

    #[test]
    fn test_field_lookup() {
        let item = Item::new("myKey", fields(&[("field1", "data1")])).unwrap();
        assert_eq!(item.field("field1"), Some("data1"));
        assert_eq!(item.field("field0"), None);
    }

    #[test]
    fn test_prepend_keeps_newest_first() {
        let mut log = ItemActivities::new("A");
        log.prepend(Activity::new("first", Fields::new()));
        log.prepend(Activity::new("second", Fields::new()));

        assert_eq!(log.activities.len(), 2);
        assert_eq!(log.activities[0].action, "second");
        assert_eq!(log.activities[1].action, "first");
    }

    #[test]
    fn test_replay_properties_inject_formatted_moment() {
        let created = Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap();
        let activity = Activity::at("checkin", fields(&[("gate", "north")]), created);

        let props = activity.replay_properties();
        assert_eq!(props.get("gate").map(String::as_str), Some("north"));
        assert_eq!(
            props.get("checkin").map(String::as_str),
            Some("2 Jan 2006 15:04:05")
        );
        // the stored activity is untouched
        assert!(!activity.properties.contains_key("checkin"));
    }

    #[test]
    fn test_item_detail_serializes_flat() {
        let item = Item::new("A", fields(&[("name", "Alice")])).unwrap();
        let detail = ItemDetail::new(item, ItemActivities::new("A"));

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["key"], "A");
        assert_eq!(json["fields"]["name"], "Alice");
        assert!(json["activities"].as_array().unwrap().is_empty());
    }
}
