use crate::error::GatewayError;
use crate::models::{Category, ChannelId, LabeledOption, UserId};
use crate::session_store::RoundId;
use crate::ws_protocol::WsEnvelope;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Presentation {
    QuestionPosted {
        round: RoundId,
        category: Category,
        #[serde(rename = "categoryName")]
        category_name: String,
        #[serde(rename = "questionText")]
        question_text: String,
        prompt: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Vec<LabeledOption>>,
    },
    AnswerCorrect {
        round: RoundId,
        prompt: String,
        country: String,
        #[serde(rename = "userId")]
        user_id: UserId,
        winner: String,
    },
    AnswerIncorrect {
        round: RoundId,
        prompt: String,
        #[serde(skip_serializing)]
        country: String,
        #[serde(rename = "userId")]
        user_id: UserId,
        answer: String,
    },
    HintRevealed {
        round: RoundId,
        prompt: String,
        options: Vec<LabeledOption>,
    },
    RoundExpired {
        round: RoundId,
        prompt: String,
        country: String,
    },
}

impl Presentation {
    pub fn event_name(&self) -> &'static str {
        match self {
            Presentation::QuestionPosted { .. } => "question_posted",
            Presentation::AnswerCorrect { .. } => "answer_correct",
            Presentation::AnswerIncorrect { .. } => "answer_incorrect",
            Presentation::HintRevealed { .. } => "hint_revealed",
            Presentation::RoundExpired { .. } => "round_expired",
        }
    }

    pub fn round(&self) -> RoundId {
        match self {
            Presentation::QuestionPosted { round, .. }
            | Presentation::AnswerCorrect { round, .. }
            | Presentation::AnswerIncorrect { round, .. }
            | Presentation::HintRevealed { round, .. }
            | Presentation::RoundExpired { round, .. } => *round,
        }
    }
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn present(&self, channel: &ChannelId, presentation: Presentation) -> Result<(), GatewayError>;

    async fn display_name(&self, user: &UserId) -> Result<String, GatewayError>;
}

pub async fn display_name_or_fallback(gateway: &dyn ChatGateway, user: &UserId) -> String {
    match gateway.display_name(user).await {
        Ok(name) => name,
        Err(err) => {
            debug!(user = %user, "display name lookup failed: {}", err);
            format!("User {}", user)
        }
    }
}

#[derive(Default)]
pub struct BroadcastGateway {
    channels: DashMap<ChannelId, broadcast::Sender<WsEnvelope>>,
    names: DashMap<UserId, String>,
}

impl BroadcastGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, channel: &ChannelId) -> broadcast::Sender<WsEnvelope> {
        self.channels
            .entry(channel.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    pub fn subscribe(&self, channel: &ChannelId) -> broadcast::Receiver<WsEnvelope> {
        self.sender(channel).subscribe()
    }

    pub fn remember_name(&self, user: &UserId, name: &str) {
        let name = name.trim();
        if !name.is_empty() {
            self.names.insert(user.clone(), name.to_string());
        }
    }
}

#[async_trait]
impl ChatGateway for BroadcastGateway {
    async fn present(&self, channel: &ChannelId, presentation: Presentation) -> Result<(), GatewayError> {
        let envelope = WsEnvelope::event(presentation.event_name(), serde_json::to_value(&presentation)?);
        if self.sender(channel).send(envelope).is_err() {
            debug!(channel = %channel, round = presentation.round(), "no subscribers for {}", presentation.event_name());
        }
        Ok(())
    }

    async fn display_name(&self, user: &UserId) -> Result<String, GatewayError> {
        self.names
            .get(user)
            .map(|name| name.clone())
            .ok_or_else(|| GatewayError::UnknownUser(user.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_envelopes() {
        let gateway = BroadcastGateway::new();
        let channel = ChannelId::new("c1");
        let mut rx = gateway.subscribe(&channel);
        gateway
            .present(
                &channel,
                Presentation::QuestionPosted {
                    round: 3,
                    category: Category::Tld,
                    category_name: Category::Tld.display_name().into(),
                    question_text: Category::Tld.question_text().into(),
                    prompt: ".fr".into(),
                    options: None,
                },
            )
            .await
            .unwrap();
        let env = rx.recv().await.unwrap();
        assert_eq!(env.event, "question_posted");
        assert_eq!(env.payload["prompt"], ".fr");
        assert_eq!(env.payload["category"], "tld");
        assert!(env.payload.get("options").is_none());
    }

    #[tokio::test]
    async fn incorrect_payload_hides_the_answer() {
        let gateway = BroadcastGateway::new();
        let channel = ChannelId::new("c1");
        let mut rx = gateway.subscribe(&channel);
        gateway
            .present(
                &channel,
                Presentation::AnswerIncorrect {
                    round: 1,
                    prompt: ".fr".into(),
                    country: "France".into(),
                    user_id: UserId::new("u1"),
                    answer: "Spain".into(),
                },
            )
            .await
            .unwrap();
        let env = rx.recv().await.unwrap();
        assert_eq!(env.event, "answer_incorrect");
        assert_eq!(env.payload["answer"], "Spain");
        assert!(env.payload.get("country").is_none());
    }

    #[tokio::test]
    async fn presenting_without_subscribers_is_fine() {
        let gateway = BroadcastGateway::new();
        let result = gateway
            .present(
                &ChannelId::new("nobody"),
                Presentation::RoundExpired { round: 1, prompt: ".fr".into(), country: "France".into() },
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn display_names_are_remembered() {
        let gateway = BroadcastGateway::new();
        let user = UserId::new("42");
        assert!(matches!(gateway.display_name(&user).await, Err(GatewayError::UnknownUser(_))));
        gateway.remember_name(&user, " Ada ");
        assert_eq!(gateway.display_name(&user).await.unwrap(), "Ada");
    }
}
