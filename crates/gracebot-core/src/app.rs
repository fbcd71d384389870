//! Per-activity pipeline: persist, filter, define, reply, persist the reply.

use std::sync::Arc;

use crate::{
    activity::Activity,
    config::{Config, DEFAULT_FALLBACK_REPLY, DEFAULT_PROFANITY_REPLY},
    definition::DefinitionLookup,
    errors::Error,
    filter::WordListFilter,
    persistence::PersistenceManager,
    ports::{IntentClassifier, ReplyTransport},
    Result,
};

/// Canned reply texts.
#[derive(Clone, Debug)]
pub struct Replies {
    pub profanity: String,
    pub fallback: String,
}

impl Default for Replies {
    fn default() -> Self {
        Self {
            profanity: DEFAULT_PROFANITY_REPLY.to_string(),
            fallback: DEFAULT_FALLBACK_REPLY.to_string(),
        }
    }
}

impl From<&Config> for Replies {
    fn from(cfg: &Config) -> Self {
        Self {
            profanity: cfg.profanity_reply.clone(),
            fallback: cfg.fallback_reply.clone(),
        }
    }
}

/// What the pipeline did with an activity.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Not a message; stored without a reply.
    Ignored,
    /// Contained a listed word; answered with the profanity reply.
    Filtered { reply: Activity },
    /// Asked about a known term; answered with its definition.
    Defined { term: String, reply: Activity },
    /// Nothing matched; answered with the fallback reply.
    Fallback { reply: Activity },
}

impl Outcome {
    pub fn reply(&self) -> Option<&Activity> {
        match self {
            Outcome::Ignored => None,
            Outcome::Filtered { reply }
            | Outcome::Defined { reply, .. }
            | Outcome::Fallback { reply } => Some(reply),
        }
    }
}

struct Classifier {
    client: Arc<dyn IntentClassifier>,
    min_score: f64,
}

/// The bot. Constructed once at startup and shared by every unit of work.
pub struct BotApp {
    filter: Arc<WordListFilter>,
    definitions: Arc<DefinitionLookup>,
    persistence: PersistenceManager,
    transport: Arc<dyn ReplyTransport>,
    classifier: Option<Classifier>,
    replies: Replies,
}

impl BotApp {
    pub fn new(
        filter: Arc<WordListFilter>,
        definitions: Arc<DefinitionLookup>,
        persistence: PersistenceManager,
        transport: Arc<dyn ReplyTransport>,
        replies: Replies,
    ) -> Self {
        Self {
            filter,
            definitions,
            persistence,
            transport,
            classifier: None,
            replies,
        }
    }

    /// Consult `client` for messages the definition lookup could not answer.
    /// Results scoring below `min_score` are ignored.
    pub fn with_classifier(mut self, client: Arc<dyn IntentClassifier>, min_score: f64) -> Self {
        self.classifier = Some(Classifier { client, min_score });
        self
    }

    pub fn persistence(&self) -> &PersistenceManager {
        &self.persistence
    }

    /// Run one inbound activity through the pipeline.
    ///
    /// The inbound activity is stored before anything else; every reply is
    /// stored after the transport accepted it. Errors are returned as-is.
    ///
    /// A redelivered message is answered again only when no reply to it was
    /// stored; otherwise `Error::DuplicateActivity` is returned.
    pub async fn handle_activity(&self, activity: &Activity) -> Result<Outcome> {
        let activity_id = activity.id.as_deref().unwrap_or_default();

        match self.persistence.add_activity(activity).await {
            Ok(_) => {}
            Err(Error::DuplicateActivity(id)) if id == activity_id && activity.is_message() => {
                if self.persistence.find_reply_to(&id).await?.is_some() {
                    return Err(Error::DuplicateActivity(id));
                }
                tracing::info!(activity_id, "redelivered message was never answered; replying");
            }
            Err(e) => return Err(e),
        }

        if !activity.is_message() {
            tracing::debug!(
                activity_id,
                activity_type = ?activity.activity_type,
                "non-message activity stored"
            );
            return Ok(Outcome::Ignored);
        }

        let text = activity.text_or_empty();
        if self.filter.contains(text) {
            tracing::info!(
                activity_id,
                conversation_id = activity.conversation_id().unwrap_or_default(),
                matched = ?self.filter.matches(text),
                "message filtered"
            );
            let reply = self.reply(&self.replies.profanity, activity).await?;
            return Ok(Outcome::Filtered { reply });
        }

        if let Some((term, definition)) = self.define(text).await? {
            tracing::info!(activity_id, term = %term, "answering with definition");
            let reply = self.reply(&definition, activity).await?;
            return Ok(Outcome::Defined { term, reply });
        }

        let reply = self.reply(&self.replies.fallback, activity).await?;
        Ok(Outcome::Fallback { reply })
    }

    async fn define(&self, text: &str) -> Result<Option<(String, String)>> {
        if let Some(term) = DefinitionLookup::extract_term(text) {
            if let Some(definition) = self.definitions.lookup(&term) {
                return Ok(Some((term, definition.to_string())));
            }
        }

        let Some(classifier) = &self.classifier else {
            return Ok(None);
        };
        if text.trim().is_empty() {
            return Ok(None);
        }

        let result = classifier.client.classify(text).await?;
        tracing::debug!(
            intent = ?result.top_intent,
            score = result.score,
            entities = result.entities.len(),
            "classified message"
        );
        if result.score < classifier.min_score {
            return Ok(None);
        }

        Ok(result.entities.iter().find_map(|e| {
            self.definitions
                .lookup(&e.entity)
                .map(|d| (e.entity.trim().to_lowercase(), d.to_string()))
        }))
    }

    async fn reply(&self, text: &str, original: &Activity) -> Result<Activity> {
        let sent = self.transport.respond(text, original).await?;
        self.persistence.add_activity(&sent).await?;
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        activity::{ActivityType, ChannelAccount, ConversationAccount},
        persistence::MemoryStore,
        ports::{IntentEntity, IntentResult},
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTransport {
        sent: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplyTransport for FakeTransport {
        async fn respond(&self, reply_text: &str, original: &Activity) -> Result<Activity> {
            let mut sent = self.sent.lock().unwrap();
            sent.push(reply_text.to_string());
            let mut reply = original.create_reply(reply_text);
            reply.id = Some(format!("reply-{}", sent.len()));
            Ok(reply)
        }
    }

    /// Transport that fails its first send.
    #[derive(Default)]
    struct FlakyTransport {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl ReplyTransport for FlakyTransport {
        async fn respond(&self, reply_text: &str, original: &Activity) -> Result<Activity> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == 1 {
                return Err(Error::External("connector 503".to_string()));
            }
            let mut reply = original.create_reply(reply_text);
            reply.id = Some(format!("reply-{calls}"));
            Ok(reply)
        }
    }

    struct FakeClassifier {
        result: IntentResult,
    }

    #[async_trait]
    impl IntentClassifier for FakeClassifier {
        async fn classify(&self, text: &str) -> Result<IntentResult> {
            Ok(IntentResult {
                query: text.to_string(),
                ..self.result.clone()
            })
        }
    }

    struct BrokenClassifier;

    #[async_trait]
    impl IntentClassifier for BrokenClassifier {
        async fn classify(&self, _text: &str) -> Result<IntentResult> {
            Err(Error::External("classifier down".to_string()))
        }
    }

    fn inbound(id: &str, text: &str) -> Activity {
        Activity {
            id: Some(id.to_string()),
            activity_type: Some(ActivityType::Message),
            timestamp: Some(Utc::now().fixed_offset()),
            text: Some(text.to_string()),
            service_url: Some("http://x".to_string()),
            channel_id: Some("slack".to_string()),
            from: Some(ChannelAccount::new("U1", "alice")),
            recipient: Some(ChannelAccount::new("B1", "gracebot")),
            conversation: Some(ConversationAccount::new("C1", "general", true)),
            reply_to_id: None,
        }
    }

    fn app(transport: Arc<FakeTransport>) -> BotApp {
        BotApp::new(
            Arc::new(WordListFilter::new(["bad", "word", "list"])),
            Arc::new(DefinitionLookup::new([(
                "bot",
                "A program that talks to people.",
            )])),
            PersistenceManager::new(Arc::new(MemoryStore::new())),
            transport,
            Replies::default(),
        )
    }

    #[tokio::test]
    async fn profane_message_gets_warning_and_both_sides_are_stored() {
        let transport = Arc::new(FakeTransport::default());
        let app = app(transport.clone());

        let out = app.handle_activity(&inbound("A1", "this is BAD")).await.unwrap();
        let reply = match &out {
            Outcome::Filtered { reply } => reply.clone(),
            other => panic!("expected Filtered, got {other:?}"),
        };
        assert_eq!(transport.sent(), vec![DEFAULT_PROFANITY_REPLY.to_string()]);
        assert_eq!(reply.reply_to_id.as_deref(), Some("A1"));

        let pm = app.persistence();
        assert!(pm.find_activity("A1").await.unwrap().is_some());
        assert_eq!(pm.find_activity("reply-1").await.unwrap(), Some(reply));
    }

    #[tokio::test]
    async fn defined_term_is_answered() {
        let transport = Arc::new(FakeTransport::default());
        let app = app(transport.clone());

        let out = app
            .handle_activity(&inbound("A1", "What is a bot?"))
            .await
            .unwrap();
        assert!(matches!(&out, Outcome::Defined { term, .. } if term == "bot"));
        assert_eq!(
            out.reply().and_then(|r| r.text.as_deref()),
            Some("A program that talks to people.")
        );
        assert_eq!(app.persistence().conversation_history("C1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn badger_is_not_filtered() {
        let transport = Arc::new(FakeTransport::default());
        let app = app(transport.clone());

        let out = app.handle_activity(&inbound("A1", "badger")).await.unwrap();
        assert!(matches!(out, Outcome::Fallback { .. }));
        assert_eq!(transport.sent(), vec![DEFAULT_FALLBACK_REPLY.to_string()]);
    }

    #[tokio::test]
    async fn non_message_is_stored_without_reply() {
        let transport = Arc::new(FakeTransport::default());
        let app = app(transport.clone());

        let mut typing = inbound("T1", "");
        typing.activity_type = Some(ActivityType::Typing);

        assert_eq!(app.handle_activity(&typing).await.unwrap(), Outcome::Ignored);
        assert!(transport.sent().is_empty());
        assert!(app.persistence().find_activity("T1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn classifier_entity_can_supply_the_term() {
        let transport = Arc::new(FakeTransport::default());
        let classifier = Arc::new(FakeClassifier {
            result: IntentResult {
                top_intent: Some("Define".to_string()),
                score: 0.91,
                entities: vec![IntentEntity {
                    entity: "Bot".to_string(),
                    kind: "Term".to_string(),
                    score: Some(0.8),
                }],
                ..Default::default()
            },
        });
        let app = app(transport.clone()).with_classifier(classifier, 0.5);

        let out = app
            .handle_activity(&inbound("A1", "could you explain bots to me"))
            .await
            .unwrap();
        assert!(matches!(&out, Outcome::Defined { term, .. } if term == "bot"));
    }

    #[tokio::test]
    async fn low_score_classification_falls_back() {
        let transport = Arc::new(FakeTransport::default());
        let classifier = Arc::new(FakeClassifier {
            result: IntentResult {
                score: 0.2,
                entities: vec![IntentEntity {
                    entity: "bot".to_string(),
                    kind: "Term".to_string(),
                    score: None,
                }],
                ..Default::default()
            },
        });
        let app = app(transport.clone()).with_classifier(classifier, 0.5);

        let out = app.handle_activity(&inbound("A1", "hmm")).await.unwrap();
        assert!(matches!(out, Outcome::Fallback { .. }));
    }

    #[tokio::test]
    async fn classifier_errors_propagate_after_inbound_is_stored() {
        let transport = Arc::new(FakeTransport::default());
        let app = app(transport.clone()).with_classifier(Arc::new(BrokenClassifier), 0.5);

        let err = app.handle_activity(&inbound("A1", "hello")).await.unwrap_err();
        assert!(matches!(err, Error::External(_)));
        assert!(transport.sent().is_empty());
        assert!(app.persistence().find_activity("A1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn invalid_inbound_is_rejected_before_any_reply() {
        let transport = Arc::new(FakeTransport::default());
        let app = app(transport.clone());

        let mut a = inbound("A1", "what is a bot");
        a.id = None;
        let err = app.handle_activity(&a).await.unwrap_err();
        assert!(matches!(err, Error::Validation { field: "id", .. }));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn redelivery_after_failed_send_is_answered() {
        let transport = Arc::new(FlakyTransport::default());
        let app = BotApp::new(
            Arc::new(WordListFilter::new(["bad"])),
            Arc::new(DefinitionLookup::default()),
            PersistenceManager::new(Arc::new(MemoryStore::new())),
            transport.clone(),
            Replies::default(),
        );
        let a = inbound("A1", "hello");

        let first = app.handle_activity(&a).await.unwrap_err();
        assert!(matches!(first, Error::External(_)));

        let second = app.handle_activity(&a).await.unwrap();
        assert!(matches!(second, Outcome::Fallback { .. }));
        assert_eq!(*transport.calls.lock().unwrap(), 2);
        assert!(app.persistence().find_reply_to("A1").await.unwrap().is_some());

        let third = app.handle_activity(&a).await.unwrap_err();
        assert!(matches!(third, Error::DuplicateActivity(id) if id == "A1"));
        assert_eq!(*transport.calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn redelivered_non_message_stays_a_duplicate() {
        let transport = Arc::new(FakeTransport::default());
        let app = app(transport.clone());

        let mut typing = inbound("T1", "");
        typing.activity_type = Some(ActivityType::Typing);
        app.handle_activity(&typing).await.unwrap();

        let err = app.handle_activity(&typing).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateActivity(_)));
        assert!(transport.sent().is_empty());
    }
}
