use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    domain::{Cid, Guid, PeerId, Timestamp},
    error::ValidationError,
};

/// Full concept record as broadcast on the concept channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    #[serde(rename = "Guid", alias = "GUID")]
    pub guid: Guid,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Content", default)]
    pub content: String,
    #[serde(
        rename = "Cid",
        alias = "CID",
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub cid: Option<Cid>,
    #[serde(rename = "Timestamp")]
    pub timestamp: Timestamp,
}

/// Locally edited concept form, sent as `POST /concept`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptDraft {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
}

impl ConceptDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        require("description", &self.description)?;
        require("type", &self.kind)?;
        require("content", &self.content)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Response to `POST /concept`; both fields are backend-assigned and optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptAck {
    #[serde(default)]
    pub guid: Option<Guid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub cid: Option<Cid>,
}

/// The singleton owner record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(alias = "Name", default)]
    pub name: String,
    #[serde(alias = "Description", default)]
    pub description: String,
}

/// Full-replacement owner form, sent as `POST /owner`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerDraft {
    pub name: String,
    pub description: String,
}

impl OwnerDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("name", &self.name)?;
        require("description", &self.description)
    }
}

impl From<Owner> for OwnerDraft {
    fn from(owner: Owner) -> Self {
        Self {
            name: owner.name,
            description: owner.description,
        }
    }
}

/// Response to `POST /owner`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerAck {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub guid: Option<Guid>,
}

/// Last observation of a peer, keyed by [`PeerId`] in a [`PeerMap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    #[serde(rename = "Timestamp")]
    pub timestamp: Timestamp,
    #[serde(rename = "CIDs", alias = "cids", default, deserialize_with = "null_as_default")]
    pub cids: Vec<Cid>,
    #[serde(
        rename = "OwnerGUID",
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub owner_guid: Option<Guid>,
}

pub type PeerMap = BTreeMap<PeerId, PeerInfo>;

/// Query for `GET /concepts`; empty fields are left out of the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConceptFilter {
    pub cid: Option<String>,
    pub guid: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub timestamp_after: Option<DateTime<Utc>>,
}

impl ConceptFilter {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let text_fields = [
            ("cid", &self.cid),
            ("guid", &self.guid),
            ("name", &self.name),
            ("description", &self.description),
            ("type", &self.kind),
        ];
        for (key, value) in text_fields {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                pairs.push((key, value.to_string()));
            }
        }
        if let Some(after) = self.timestamp_after {
            pairs.push((
                "timestamp",
                after.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }
        pairs
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Ok(())
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|value| !value.is_empty()).map(T::from))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn concept_accepts_upper_case_guid_and_rfc3339_timestamp() {
        let concept: Concept = serde_json::from_value(json!({
            "GUID": "g1",
            "Name": "A",
            "Description": "d",
            "Type": "t",
            "Timestamp": "2024-05-01T12:00:00Z",
            "Relationships": []
        }))
        .expect("concept");

        assert_eq!(concept.guid, Guid::from("g1"));
        assert_eq!(concept.content, "");
        assert_eq!(concept.cid, None);
        assert_eq!(concept.timestamp.to_string(), "2024-05-01T12:00:00Z");
    }

    #[test]
    fn concept_reads_millisecond_timestamp_and_assigned_cid() {
        let concept: Concept = serde_json::from_value(json!({
            "Guid": "g1",
            "Name": "A",
            "Description": "d",
            "Type": "t",
            "Content": "c",
            "Cid": "bafy123",
            "Timestamp": 1
        }))
        .expect("concept");

        assert_eq!(concept.cid, Some(Cid::from("bafy123")));
        assert_eq!(concept.timestamp, Timestamp::from_millis(1).expect("ts"));
    }

    #[test]
    fn empty_cid_means_unassigned() {
        let concept: Concept = serde_json::from_value(json!({
            "Guid": "g1",
            "Name": "A",
            "Description": "d",
            "Type": "t",
            "Content": "c",
            "Cid": "",
            "Timestamp": 5
        }))
        .expect("concept");
        assert_eq!(concept.cid, None);
    }

    #[test]
    fn concept_without_guid_is_rejected() {
        let result = serde_json::from_value::<Concept>(json!({
            "Name": "A",
            "Description": "d",
            "Type": "t",
            "Timestamp": 5
        }));
        assert!(result.is_err());
    }

    #[test]
    fn peer_with_null_cids_decodes_as_empty() {
        let peers: PeerMap = serde_json::from_value(json!({
            "p1": { "Timestamp": 100, "CIDs": null, "OwnerGUID": "" },
            "p2": { "Timestamp": "2024-05-01T12:00:00Z", "CIDs": ["c1", "c2"], "OwnerGUID": "o1" }
        }))
        .expect("peers");

        assert!(peers[&PeerId::from("p1")].cids.is_empty());
        assert_eq!(peers[&PeerId::from("p1")].owner_guid, None);
        assert_eq!(
            peers[&PeerId::from("p2")].cids,
            vec![Cid::from("c1"), Cid::from("c2")]
        );
        assert_eq!(
            peers[&PeerId::from("p2")].owner_guid,
            Some(Guid::from("o1"))
        );
    }

    #[test]
    fn owner_reads_backend_concept_shape() {
        let owner: Owner = serde_json::from_value(json!({
            "GUID": "owner-guid",
            "Name": "Ada",
            "Description": "operator",
            "Type": "Owner"
        }))
        .expect("owner");
        assert_eq!(owner.name, "Ada");
        assert_eq!(owner.description, "operator");
    }

    #[test]
    fn concept_draft_serializes_lower_case_type_field() {
        let draft = ConceptDraft {
            name: "A".into(),
            description: "d".into(),
            kind: "t".into(),
            content: "c".into(),
        };
        assert_eq!(
            serde_json::to_value(&draft).expect("json"),
            json!({ "name": "A", "description": "d", "type": "t", "content": "c" })
        );
    }

    #[test]
    fn draft_validation_names_first_blank_field() {
        let draft = ConceptDraft {
            name: "A".into(),
            description: "   ".into(),
            kind: String::new(),
            content: "c".into(),
        };
        assert_eq!(
            draft.validate(),
            Err(ValidationError::MissingField {
                field: "description"
            })
        );

        let owner = OwnerDraft {
            name: "Ada".into(),
            description: "x".into(),
        };
        assert_eq!(owner.validate(), Ok(()));
    }

    #[test]
    fn filter_omits_empty_fields() {
        let filter = ConceptFilter {
            name: Some("A".into()),
            kind: Some(String::new()),
            timestamp_after: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            ..ConceptFilter::default()
        };
        assert_eq!(
            filter.query_pairs(),
            vec![
                ("name", "A".to_string()),
                ("timestamp", "2024-05-01T12:00:00Z".to_string())
            ]
        );
    }
}
