//! Raw HeyReach payloads and their normalization.
//!
//! The listing (`GetConversationsV2`) and the chatroom (`GetChatroom`) endpoints
//! disagree on field names. Every alternate is resolved here, once, so nothing
//! downstream ever looks at a raw payload.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use outreach_core::domain::conversation::{Conversation, ConversationId, Message, Prospect, Sender};

use crate::{Chatroom, ConversationPage, ConversationQuery, OutboundMessage, TagRequest};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl Scalar {
    fn as_id(&self) -> Option<String> {
        match self {
            Self::Text(value) => Some(value.trim().to_string()).filter(|value| !value.is_empty()),
            Self::Integer(value) => Some(value.to_string()),
            Self::Float(_) => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Text(value) => value.trim().parse().ok(),
            Self::Integer(value) => Some(*value),
            Self::Float(value) => integral(*value),
        }
    }

    fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Text(value) => parse_timestamp(value),
            Self::Integer(millis) => DateTime::from_timestamp_millis(*millis),
            Self::Float(millis) => integral(*millis).and_then(DateTime::from_timestamp_millis),
        }
    }
}

/// Whole numbers only, so a malformed fractional id never aliases another one.
fn integral(value: f64) -> Option<i64> {
    const LIMIT: f64 = 9_007_199_254_740_992.0;
    (value.is_finite() && value.fract() == 0.0 && value.abs() <= LIMIT).then_some(value as i64)
}

/// `null` and a missing key both mean "no entries".
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok().map(|naive| naive.and_utc())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawConversationPage {
    total_count: Option<u64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    items: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConversation {
    id: Option<Scalar>,
    conversation_id: Option<Scalar>,
    linked_in_account_id: Option<Scalar>,
    account_id: Option<Scalar>,
    campaign_id: Option<Scalar>,
    correspondent_profile: Option<RawProfile>,
    correspondent: Option<RawProfile>,
    last_message_sender: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    messages: Vec<RawMessage>,
    #[serde(default, deserialize_with = "null_as_empty")]
    tags: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProfile {
    first_name: Option<String>,
    last_name: Option<String>,
    full_name: Option<String>,
    company_name: Option<String>,
    headline: Option<String>,
    location: Option<String>,
    profile_url: Option<String>,
    public_profile_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    tags: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    sender: Option<String>,
    body: Option<String>,
    message_body: Option<String>,
    text: Option<String>,
    created_at: Option<Scalar>,
    timestamp: Option<Scalar>,
    sent_at: Option<Scalar>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawChatroom {
    correspondent_profile: Option<RawProfile>,
    correspondent: Option<RawProfile>,
    #[serde(default, deserialize_with = "null_as_empty")]
    messages: Vec<RawMessage>,
}

/// `CORRESPONDENT` is the prospect. Every other value is treated as our side,
/// so an unrecognized sender can never trigger a reply.
fn sender_from_wire(value: Option<&str>) -> Sender {
    match value.map(|value| value.trim().to_ascii_uppercase()) {
        Some(value) if value == "CORRESPONDENT" || value == "PROSPECT" => Sender::Prospect,
        _ => Sender::Us,
    }
}

fn first_text(candidates: [Option<String>; 3]) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
        .unwrap_or_default()
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn tag_names(values: Vec<Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::String(name) => Some(name),
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect()
}

impl RawMessage {
    fn normalize(self) -> Message {
        let sent_at = [self.created_at, self.timestamp, self.sent_at]
            .into_iter()
            .flatten()
            .find_map(|scalar| scalar.as_timestamp());

        Message {
            sender: sender_from_wire(self.sender.as_deref()),
            text: first_text([self.body, self.message_body, self.text]),
            sent_at,
        }
    }
}

impl RawProfile {
    fn normalize(self) -> (Prospect, Vec<String>) {
        let profile_url =
            blank_to_none(self.profile_url).or(blank_to_none(self.public_profile_url));
        let prospect = Prospect {
            first_name: blank_to_none(self.first_name),
            last_name: blank_to_none(self.last_name),
            full_name: blank_to_none(self.full_name),
            company: blank_to_none(self.company_name),
            headline: blank_to_none(self.headline),
            location: blank_to_none(self.location),
            profile_url,
        };
        (prospect, tag_names(self.tags))
    }
}

impl RawConversation {
    fn normalize(self) -> Option<Conversation> {
        let id = [self.id.as_ref(), self.conversation_id.as_ref()]
            .into_iter()
            .flatten()
            .find_map(Scalar::as_id);
        let account_id = [self.linked_in_account_id.as_ref(), self.account_id.as_ref()]
            .into_iter()
            .flatten()
            .find_map(Scalar::as_i64);

        let (Some(id), Some(account_id)) = (id, account_id) else {
            warn!(
                event_name = "heyreach.conversation.dropped",
                "conversation without id or account id skipped during normalization"
            );
            return None;
        };

        let (prospect, profile_tags) = self
            .correspondent_profile
            .or(self.correspondent)
            .map(RawProfile::normalize)
            .unwrap_or_default();

        let mut tags = tag_names(self.tags);
        if tags.is_empty() {
            tags = profile_tags;
        }

        Some(Conversation {
            id: ConversationId(id),
            account_id,
            campaign_id: self.campaign_id.as_ref().and_then(Scalar::as_i64),
            prospect,
            tags,
            messages: self.messages.into_iter().map(RawMessage::normalize).collect(),
            last_sender: self
                .last_message_sender
                .as_deref()
                .map(|value| sender_from_wire(Some(value))),
        })
    }
}

impl RawConversationPage {
    pub(crate) fn normalize(self) -> ConversationPage {
        ConversationPage {
            total_count: self.total_count,
            conversations: self
                .items
                .into_iter()
                .filter_map(decode_item)
                .filter_map(RawConversation::normalize)
                .collect(),
        }
    }
}

/// One malformed item is dropped on its own instead of failing the whole page.
fn decode_item(item: Value) -> Option<RawConversation> {
    match serde_json::from_value::<RawConversation>(item) {
        Ok(conversation) => Some(conversation),
        Err(error) => {
            warn!(
                event_name = "heyreach.conversation.undecodable",
                error = %error,
                "listing item could not be decoded and was skipped"
            );
            None
        }
    }
}

impl RawChatroom {
    pub(crate) fn normalize(self) -> Chatroom {
        Chatroom {
            prospect: self
                .correspondent_profile
                .or(self.correspondent)
                .map(|profile| profile.normalize().0),
            messages: self.messages.into_iter().map(RawMessage::normalize).collect(),
        }
    }
}

pub(crate) fn decode_page(value: Value) -> Result<ConversationPage, serde_json::Error> {
    serde_json::from_value::<RawConversationPage>(value).map(RawConversationPage::normalize)
}

pub(crate) fn decode_chatroom(value: Value) -> Result<Chatroom, serde_json::Error> {
    serde_json::from_value::<RawChatroom>(value).map(RawChatroom::normalize)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConversationFilters<'a> {
    linked_in_account_ids: &'a [i64],
    campaign_ids: &'a [i64],
    #[serde(skip_serializing_if = "Option::is_none")]
    seen: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConversationsRequest<'a> {
    filters: ConversationFilters<'a>,
    offset: u32,
    limit: u32,
}

impl<'a> ConversationsRequest<'a> {
    pub(crate) fn new(query: &'a ConversationQuery) -> Self {
        Self {
            filters: ConversationFilters {
                linked_in_account_ids: &query.account_ids,
                campaign_ids: &query.campaign_ids,
                seen: query.seen,
            },
            offset: query.offset,
            limit: query.limit.clamp(1, crate::MAX_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendMessageRequest<'a> {
    linked_in_account_id: i64,
    conversation_id: &'a str,
    message: &'a str,
    subject: &'a str,
}

impl<'a> SendMessageRequest<'a> {
    pub(crate) fn new(message: &'a OutboundMessage) -> Self {
        Self {
            linked_in_account_id: message.account_id,
            conversation_id: &message.conversation_id.0,
            message: &message.message,
            subject: "",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddTagsRequest<'a> {
    lead_profile_url: &'a str,
    tags: &'a [String],
    create_tag_if_not_existing: bool,
}

impl<'a> AddTagsRequest<'a> {
    pub(crate) fn new(request: &'a TagRequest) -> Self {
        Self {
            lead_profile_url: &request.profile_url,
            tags: &request.tags,
            create_tag_if_not_existing: request.create_if_missing,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatsRequest<'a> {
    account_ids: &'a [i64],
    campaign_ids: &'a [i64],
    #[serde(skip_serializing_if = "Option::is_none")]
    start_date: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_date: Option<&'a str>,
}

impl<'a> StatsRequest<'a> {
    pub(crate) fn new(query: &'a crate::StatsQuery) -> Self {
        Self {
            account_ids: &query.account_ids,
            campaign_ids: &query.campaign_ids,
            start_date: query.start_date.as_deref(),
            end_date: query.end_date.as_deref(),
        }
    }
}
