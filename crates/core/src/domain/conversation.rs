use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Prospect,
    Us,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    pub sent_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prospect {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub company: Option<String>,
    pub headline: Option<String>,
    pub location: Option<String>,
    pub profile_url: Option<String>,
}

impl Prospect {
    /// Full name if the CRM supplied one, otherwise first and last joined, otherwise `Unknown`.
    pub fn display_name(&self) -> String {
        if let Some(full_name) = non_blank(self.full_name.as_deref()) {
            return full_name.to_string();
        }

        let joined = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .filter_map(non_blank)
            .collect::<Vec<_>>()
            .join(" ");

        if joined.is_empty() {
            "Unknown".to_string()
        } else {
            joined
        }
    }

    pub fn greeting_name(&self) -> Option<&str> {
        non_blank(self.first_name.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// A CRM conversation, normalized once at the client boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub account_id: i64,
    pub campaign_id: Option<i64>,
    pub prospect: Prospect,
    pub tags: Vec<String>,
    pub messages: Vec<Message>,
    pub last_sender: Option<Sender>,
}

impl Conversation {
    /// The listing's last-sender flag wins; the message list is the fallback.
    pub fn last_sender(&self) -> Option<Sender> {
        self.last_sender.or_else(|| self.messages.last().map(|message| message.sender))
    }

    pub fn awaiting_reply(&self) -> bool {
        self.last_sender() == Some(Sender::Prospect)
    }

    pub fn last_prospect_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|message| message.sender == Sender::Prospect)
    }

    pub fn our_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|message| message.sender == Sender::Us)
    }

    pub fn all_text(&self) -> String {
        self.messages.iter().map(|message| message.text.as_str()).collect::<Vec<_>>().join(" ")
    }

    /// Fills in messages and any missing profile fields from a chatroom fetch.
    pub fn merge_chatroom(&mut self, prospect: Option<Prospect>, messages: Vec<Message>) {
        if !messages.is_empty() {
            self.messages = messages;
        }

        if let Some(prospect) = prospect {
            let current = &mut self.prospect;
            fill(&mut current.first_name, prospect.first_name);
            fill(&mut current.last_name, prospect.last_name);
            fill(&mut current.full_name, prospect.full_name);
            fill(&mut current.company, prospect.company);
            fill(&mut current.headline, prospect.headline);
            fill(&mut current.location, prospect.location);
            fill(&mut current.profile_url, prospect.profile_url);
        }
    }
}

fn fill(slot: &mut Option<String>, candidate: Option<String>) {
    if non_blank(slot.as_deref()).is_none() {
        if let Some(value) = candidate {
            *slot = Some(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Conversation, ConversationId, Message, Prospect, Sender};

    fn message(sender: Sender, text: &str) -> Message {
        Message { sender, text: text.to_string(), sent_at: None }
    }

    fn conversation(messages: Vec<Message>) -> Conversation {
        Conversation {
            id: ConversationId("conv-1".to_string()),
            account_id: 93126,
            campaign_id: Some(274509),
            prospect: Prospect::default(),
            tags: Vec::new(),
            messages,
            last_sender: None,
        }
    }

    #[test]
    fn display_name_falls_back_through_name_fields() {
        let mut prospect = Prospect {
            first_name: Some("Ana".to_string()),
            last_name: Some("Ruiz".to_string()),
            ..Prospect::default()
        };
        assert_eq!(prospect.display_name(), "Ana Ruiz");

        prospect.full_name = Some("Ana María Ruiz".to_string());
        assert_eq!(prospect.display_name(), "Ana María Ruiz");

        assert_eq!(Prospect::default().display_name(), "Unknown");
    }

    #[test]
    fn awaiting_reply_prefers_listing_flag_over_messages() {
        let mut conv =
            conversation(vec![message(Sender::Us, "hola"), message(Sender::Prospect, "ok")]);
        assert!(conv.awaiting_reply());

        conv.last_sender = Some(Sender::Us);
        assert!(!conv.awaiting_reply());

        let empty = conversation(Vec::new());
        assert!(!empty.awaiting_reply());
    }

    #[test]
    fn last_prospect_message_skips_our_trailing_messages() {
        let conv = conversation(vec![
            message(Sender::Prospect, "first"),
            message(Sender::Prospect, "second"),
            message(Sender::Us, "reply"),
        ]);

        assert_eq!(conv.last_prospect_message().map(|m| m.text.as_str()), Some("second"));
        assert_eq!(conv.our_messages().count(), 1);
    }

    #[test]
    fn merge_chatroom_keeps_existing_profile_fields() {
        let mut conv = conversation(Vec::new());
        conv.prospect.first_name = Some("Luis".to_string());

        conv.merge_chatroom(
            Some(Prospect {
                first_name: Some("Other".to_string()),
                company: Some("Acme".to_string()),
                ..Prospect::default()
            }),
            vec![message(Sender::Prospect, "hi there")],
        );

        assert_eq!(conv.prospect.first_name.as_deref(), Some("Luis"));
        assert_eq!(conv.prospect.company.as_deref(), Some("Acme"));
        assert_eq!(conv.messages.len(), 1);
    }
}
