use crate::error::EngineError;
use crate::gateway::{display_name_or_fallback, ChatGateway, Presentation};
use crate::matcher;
use crate::models::{Category, ChannelId, InboundMessage, OptionSet, Question, UserId, OPTION_COUNT};
use crate::question_bank::QuestionBank;
use crate::session_store::{Attempt, RoundId, Session, SessionStore};
use crate::stats::StatsStore;
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

static LETTER_ANSWER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^[a-e]$").expect("static regex"));

#[derive(Debug, Clone)]
pub struct QuizSettings {
    pub next_question_delay: Duration,
    /// `None` leaves an unanswered question up until someone gets it.
    pub answer_window: Option<Duration>,
    pub hint_threshold: u32,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            next_question_delay: Duration::from_millis(3000),
            answer_window: Some(Duration::from_secs(60)),
            hint_threshold: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChannelAssignments(HashMap<ChannelId, Category>);

impl ChannelAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(mut self, channel: ChannelId, category: Category) -> Self {
        self.0.insert(channel, category);
        self
    }

    pub fn category_for(&self, channel: &ChannelId) -> Option<Category> {
        self.0.get(channel).copied()
    }

    pub fn channels(&self) -> impl Iterator<Item = (&ChannelId, Category)> + '_ {
        self.0.iter().map(|(channel, category)| (channel, *category))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AnswerOutcome {
    Correct {
        round: RoundId,
        country: String,
    },
    Incorrect {
        round: RoundId,
        wrong_streak: u32,
        hint_revealed: bool,
    },
}

#[derive(Debug, Clone, Copy)]
enum TimerKind {
    NextQuestion,
    AnswerWindow,
}

struct EngineInner {
    bank: QuestionBank,
    sessions: SessionStore,
    assignments: ChannelAssignments,
    stats: Arc<dyn StatsStore>,
    gateway: Arc<dyn ChatGateway>,
    settings: QuizSettings,
}

#[derive(Clone)]
pub struct QuizEngine {
    inner: Arc<EngineInner>,
}

impl QuizEngine {
    pub fn new(
        bank: QuestionBank,
        assignments: ChannelAssignments,
        stats: Arc<dyn StatsStore>,
        gateway: Arc<dyn ChatGateway>,
        settings: QuizSettings,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                bank,
                sessions: SessionStore::new(),
                assignments,
                stats,
                gateway,
                settings,
            }),
        }
    }

    pub fn category_for(&self, channel: &ChannelId) -> Option<Category> {
        self.inner.assignments.category_for(channel)
    }

    pub fn is_quiz_channel(&self, channel: &ChannelId) -> bool {
        self.category_for(channel).is_some()
    }

    pub fn current_round(&self, channel: &ChannelId) -> Option<Session> {
        self.inner.sessions.snapshot(channel)
    }

    pub async fn initialize_channels(&self) {
        let channels: Vec<ChannelId> = self.inner.assignments.channels().map(|(c, _)| c.clone()).collect();
        for channel in channels {
            if self.inner.sessions.has_session(&channel) {
                continue;
            }
            info!(channel = %channel, "initializing quiz channel with first question");
            if let Err(err) = self.post_new_question(&channel).await {
                error!(channel = %channel, "failed to initialize quiz channel: {}", err);
            }
        }
    }

    pub async fn post_new_question(&self, channel: &ChannelId) -> Result<Session, EngineError> {
        let category = self
            .category_for(channel)
            .ok_or_else(|| EngineError::UnassignedChannel(channel.clone()))?;
        let (question, options) = {
            let mut rng = rand::thread_rng();
            let question = self.inner.bank.draw_question(category, &mut rng)?;
            let options = self
                .inner
                .bank
                .draw_options(category, &question.answer, OPTION_COUNT, &mut rng)?;
            (question, options)
        };
        Ok(self.start_round(channel, question, options).await)
    }

    async fn start_round(&self, channel: &ChannelId, question: Question, options: OptionSet) -> Session {
        let session = self.inner.sessions.begin_round(channel, question, options);
        let category = session.question.category;
        info!(
            channel = %channel,
            round = session.round,
            category = %category,
            prompt = %session.question.prompt,
            "posted quiz question"
        );

        self.present(
            channel,
            Presentation::QuestionPosted {
                round: session.round,
                category,
                category_name: category.display_name().to_string(),
                question_text: category.question_text().to_string(),
                prompt: session.question.prompt.clone(),
                options: None,
            },
        )
        .await;

        if let Some(window) = self.inner.settings.answer_window {
            self.arm(channel, session.round, window, TimerKind::AnswerWindow);
        }
        session
    }

    pub async fn handle_message(&self, message: &InboundMessage) -> Option<AnswerOutcome> {
        if message.is_command_prefixed || !self.is_quiz_channel(&message.channel_id) {
            return None;
        }
        let text = message.text.trim();
        if text.is_empty() {
            return None;
        }
        let channel = &message.channel_id;
        let attempt = self
            .inner
            .sessions
            .attempt(channel, self.inner.settings.hint_threshold, |session| is_correct(session, text))?;

        match attempt {
            Attempt::Correct { session, next } => {
                self.arm(channel, next, self.inner.settings.next_question_delay, TimerKind::NextQuestion);
                self.record(&message.author_id, session.question.category, true).await;
                info!(
                    channel = %channel,
                    round = session.round,
                    user = %message.author_id,
                    "correct answer: {} -> {}",
                    text,
                    session.question.answer
                );

                let winner = display_name_or_fallback(self.inner.gateway.as_ref(), &message.author_id).await;
                self.present(
                    channel,
                    Presentation::AnswerCorrect {
                        round: session.round,
                        prompt: session.question.prompt.clone(),
                        country: session.question.answer.clone(),
                        user_id: message.author_id.clone(),
                        winner,
                    },
                )
                .await;

                Some(AnswerOutcome::Correct {
                    round: session.round,
                    country: session.question.answer,
                })
            }
            Attempt::Incorrect { session, hint } => {
                self.record(&message.author_id, session.question.category, false).await;
                info!(
                    channel = %channel,
                    round = session.round,
                    user = %message.author_id,
                    wrong_streak = session.wrong_streak,
                    "incorrect answer: {}",
                    text
                );

                self.present(
                    channel,
                    Presentation::AnswerIncorrect {
                        round: session.round,
                        prompt: session.question.prompt.clone(),
                        country: session.question.answer.clone(),
                        user_id: message.author_id.clone(),
                        answer: message.text.clone(),
                    },
                )
                .await;

                if let Some(options) = &hint {
                    info!(channel = %channel, round = session.round, "revealing multiple-choice hint");
                    self.present(
                        channel,
                        Presentation::HintRevealed {
                            round: session.round,
                            prompt: session.question.prompt.clone(),
                            options: options.labeled(),
                        },
                    )
                    .await;
                }

                Some(AnswerOutcome::Incorrect {
                    round: session.round,
                    wrong_streak: session.wrong_streak,
                    hint_revealed: hint.is_some(),
                })
            }
        }
    }

    pub fn shutdown(&self) {
        self.inner.sessions.clear();
    }

    fn arm(&self, channel: &ChannelId, epoch: RoundId, delay: Duration, kind: TimerKind) {
        let engine = self.clone();
        let target = channel.clone();
        let armed = self
            .inner
            .sessions
            .arm_timer(channel, epoch, move || tokio::spawn(engine.fire_after(target, epoch, delay, kind)));
        if !armed {
            debug!(channel = %channel, epoch, "channel moved on before {:?} timer was armed", kind);
        }
    }

    fn fire_after(self, channel: ChannelId, epoch: RoundId, delay: Duration, kind: TimerKind) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            match kind {
                TimerKind::NextQuestion => {
                    if !self.inner.sessions.claim_timer(&channel, epoch) {
                        return;
                    }
                }
                TimerKind::AnswerWindow => {
                    let Some(expired) = self.inner.sessions.expire(&channel, epoch) else {
                        return;
                    };
                    info!(
                        channel = %channel,
                        round = expired.round,
                        "nobody answered in time: {} -> {}",
                        expired.question.prompt,
                        expired.question.answer
                    );
                    self.present(
                        &channel,
                        Presentation::RoundExpired {
                            round: expired.round,
                            prompt: expired.question.prompt,
                            country: expired.question.answer,
                        },
                    )
                    .await;
                }
            }
            if let Err(err) = self.post_new_question(&channel).await {
                error!(channel = %channel, "failed to post next question: {}", err);
            }
        })
    }

    async fn record(&self, user: &UserId, category: Category, correct: bool) {
        if let Err(err) = self.inner.stats.record_attempt(user, category, correct).await {
            warn!(user = %user, category = %category, "failed to record quiz attempt: {}", err);
        }
    }

    async fn present(&self, channel: &ChannelId, presentation: Presentation) {
        let event = presentation.event_name();
        if let Err(err) = self.inner.gateway.present(channel, presentation).await {
            warn!(channel = %channel, "failed to present {}: {}", event, err);
        }
    }
}

/// A lone letter picks a multiple-choice option, but only once hints are shown.
fn is_correct(session: &Session, text: &str) -> bool {
    let letter_choice = if session.hints_shown && LETTER_ANSWER.is_match(text) {
        text.chars().next().and_then(|c| session.options.resolve_letter(c))
    } else {
        None
    };
    matcher::judge(letter_choice.unwrap_or(text), &session.question.answer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::stats::InMemoryStatsStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGateway {
        events: Mutex<Vec<Presentation>>,
        failing: bool,
    }

    impl RecordingGateway {
        fn failing() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                failing: true,
            }
        }

        fn count(&self, event: &str) -> usize {
            self.events.lock().unwrap().iter().filter(|p| p.event_name() == event).count()
        }

        fn last(&self, event: &str) -> Option<Presentation> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|p| p.event_name() == event)
                .cloned()
        }
    }

    #[async_trait]
    impl ChatGateway for RecordingGateway {
        async fn present(&self, _channel: &ChannelId, presentation: Presentation) -> Result<(), GatewayError> {
            if self.failing {
                return Err(GatewayError::Unavailable("socket closed".into()));
            }
            self.events.lock().unwrap().push(presentation);
            Ok(())
        }

        async fn display_name(&self, user: &UserId) -> Result<String, GatewayError> {
            if user.as_str() == "ada" {
                Ok("Ada".into())
            } else {
                Err(GatewayError::UnknownUser(user.to_string()))
            }
        }
    }

    struct Harness {
        engine: QuizEngine,
        gateway: Arc<RecordingGateway>,
        stats: Arc<InMemoryStatsStore>,
        channel: ChannelId,
    }

    fn harness_with(settings: QuizSettings, gateway: RecordingGateway) -> Harness {
        let channel = ChannelId::new("tld-channel");
        let gateway = Arc::new(gateway);
        let stats = Arc::new(InMemoryStatsStore::new());
        let assignments = ChannelAssignments::new()
            .assign(channel.clone(), Category::Tld)
            .assign(ChannelId::new("flag-channel"), Category::Flags);
        let engine = QuizEngine::new(
            QuestionBank::builtin().unwrap(),
            assignments,
            stats.clone(),
            gateway.clone(),
            settings,
        );
        Harness { engine, gateway, stats, channel }
    }

    fn harness() -> Harness {
        harness_with(QuizSettings::default(), RecordingGateway::default())
    }

    fn france() -> Question {
        Question {
            category: Category::Tld,
            prompt: ".fr".into(),
            answer: "France".into(),
        }
    }

    /// France sits at index 2, letter C.
    fn france_options() -> OptionSet {
        OptionSet::new(
            ["Brazil", "Denmark", "France", "Egypt", "Chile"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    fn say(h: &Harness, user: &str, text: &str) -> InboundMessage {
        InboundMessage::new(h.channel.clone(), UserId::new(user), text)
    }

    #[tokio::test(start_paused = true)]
    async fn posting_installs_exactly_one_session() {
        let h = harness();
        assert!(h.engine.current_round(&h.channel).is_none());
        let session = h.engine.post_new_question(&h.channel).await.unwrap();

        let current = h.engine.current_round(&h.channel).unwrap();
        assert_eq!(current.round, session.round);
        assert_eq!(current.wrong_streak, 0);
        assert!(!current.hints_shown);
        assert_eq!(current.options.len(), OPTION_COUNT);
        assert!(current.options.contains(&current.question.answer));
        assert_eq!(current.question.category, Category::Tld);

        match h.gateway.last("question_posted").unwrap() {
            Presentation::QuestionPosted { prompt, options, .. } => {
                assert_eq!(prompt, current.question.prompt);
                assert!(options.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }

        let again = h.engine.post_new_question(&h.channel).await.unwrap();
        assert_ne!(again.round, session.round);
        assert_eq!(h.engine.current_round(&h.channel).unwrap().round, again.round);
    }

    #[tokio::test(start_paused = true)]
    async fn flag_channel_asks_flags() {
        let h = harness();
        let session = h.engine.post_new_question(&ChannelId::new("flag-channel")).await.unwrap();
        assert_eq!(session.question.category, Category::Flags);
        assert!(session.question.prompt.chars().all(|c| ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)));
    }

    #[tokio::test(start_paused = true)]
    async fn unassigned_channels_are_rejected() {
        let h = harness();
        let stranger = ChannelId::new("general");
        let err = h.engine.post_new_question(&stranger).await.unwrap_err();
        assert!(matches!(err, EngineError::UnassignedChannel(_)));
        let msg = InboundMessage::new(stranger, UserId::new("ada"), "France");
        assert!(h.engine.handle_message(&msg).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn commands_and_idle_channels_are_not_answers() {
        let h = harness();
        assert!(h.engine.handle_message(&say(&h, "ada", "France")).await.is_none());

        h.engine.start_round(&h.channel, france(), france_options()).await;
        assert!(h.engine.handle_message(&say(&h, "ada", "!stats")).await.is_none());
        assert!(h.engine.handle_message(&say(&h, "ada", "/leaderboard")).await.is_none());
        assert!(h.engine.handle_message(&say(&h, "ada", "   ")).await.is_none());
        assert_eq!(h.engine.current_round(&h.channel).unwrap().wrong_streak, 0);
        assert!(h.stats.all_stats(&UserId::new("ada")).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn correct_answer_scores_and_advances_after_delay() {
        let h = harness();
        let first = h.engine.start_round(&h.channel, france(), france_options()).await;

        let outcome = h.engine.handle_message(&say(&h, "ada", "France")).await.unwrap();
        assert_eq!(
            outcome,
            AnswerOutcome::Correct {
                round: first.round,
                country: "France".into()
            }
        );
        assert!(h.engine.current_round(&h.channel).is_none());

        let row = h.stats.stats(&UserId::new("ada"), Category::Tld).await.unwrap().unwrap();
        assert_eq!(row.correct, 1);
        assert_eq!(row.total_attempts, 1);

        match h.gateway.last("answer_correct").unwrap() {
            Presentation::AnswerCorrect { country, winner, prompt, .. } => {
                assert_eq!(country, "France");
                assert_eq!(prompt, ".fr");
                assert_eq!(winner, "Ada");
            }
            other => panic!("unexpected {other:?}"),
        }

        tokio::time::sleep(Duration::from_millis(2900)).await;
        assert!(h.engine.current_round(&h.channel).is_none());
        tokio::time::sleep(Duration::from_millis(200)).await;

        let next = h.engine.current_round(&h.channel).unwrap();
        assert_ne!(next.round, first.round);
        assert!(next.created_at > first.created_at);
        assert_eq!(next.wrong_streak, 0);
        assert_eq!(h.gateway.count("question_posted"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_winner_falls_back_to_user_id() {
        let h = harness();
        h.engine.start_round(&h.channel, france(), france_options()).await;
        h.engine.handle_message(&say(&h, "1234", "the france")).await.unwrap();
        match h.gateway.last("answer_correct").unwrap() {
            Presentation::AnswerCorrect { winner, .. } => assert_eq!(winner, "User 1234"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn only_first_correct_answer_counts() {
        let h = harness();
        h.engine.start_round(&h.channel, france(), france_options()).await;
        assert!(matches!(
            h.engine.handle_message(&say(&h, "ada", "France")).await,
            Some(AnswerOutcome::Correct { .. })
        ));
        assert!(h.engine.handle_message(&say(&h, "bob", "France")).await.is_none());
        assert!(h.stats.all_stats(&UserId::new("bob")).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hints_escalate_once_after_five_misses() {
        let h = harness();
        let round = h.engine.start_round(&h.channel, france(), france_options()).await.round;

        for streak in 1..=4 {
            let outcome = h.engine.handle_message(&say(&h, "bob", "Spain")).await.unwrap();
            assert_eq!(
                outcome,
                AnswerOutcome::Incorrect {
                    round,
                    wrong_streak: streak,
                    hint_revealed: false
                }
            );
        }
        assert_eq!(h.gateway.count("hint_revealed"), 0);

        let fifth = h.engine.handle_message(&say(&h, "bob", "Spain")).await.unwrap();
        assert!(matches!(fifth, AnswerOutcome::Incorrect { wrong_streak: 5, hint_revealed: true, .. }));
        match h.gateway.last("hint_revealed").unwrap() {
            Presentation::HintRevealed { options, .. } => {
                let shown: Vec<String> = options.into_iter().map(|o| o.country).collect();
                assert_eq!(shown, france_options().as_slice().to_vec());
            }
            other => panic!("unexpected {other:?}"),
        }

        let sixth = h.engine.handle_message(&say(&h, "bob", "Spain")).await.unwrap();
        assert!(matches!(sixth, AnswerOutcome::Incorrect { wrong_streak: 6, hint_revealed: false, .. }));
        assert_eq!(h.gateway.count("hint_revealed"), 1);
        assert_eq!(h.gateway.count("answer_incorrect"), 6);

        let session = h.engine.current_round(&h.channel).unwrap();
        assert!(session.hints_shown);
        assert_eq!(session.options, france_options());

        let row = h.stats.stats(&UserId::new("bob"), Category::Tld).await.unwrap().unwrap();
        assert_eq!(row.incorrect, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn letters_only_count_once_hints_are_shown() {
        let h = harness();
        h.engine.start_round(&h.channel, france(), france_options()).await;

        let early = h.engine.handle_message(&say(&h, "bob", "C")).await.unwrap();
        assert!(matches!(early, AnswerOutcome::Incorrect { .. }));

        for _ in 0..4 {
            h.engine.handle_message(&say(&h, "bob", "Egypt")).await.unwrap();
        }
        assert!(h.engine.current_round(&h.channel).unwrap().hints_shown);

        let wrong_letter = h.engine.handle_message(&say(&h, "bob", "a")).await.unwrap();
        assert!(matches!(wrong_letter, AnswerOutcome::Incorrect { .. }));

        let right_letter = h.engine.handle_message(&say(&h, "ada", "c")).await.unwrap();
        assert!(matches!(right_letter, AnswerOutcome::Correct { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn free_text_still_works_with_hints_shown() {
        let h = harness();
        h.engine.start_round(&h.channel, france(), france_options()).await;
        for _ in 0..5 {
            h.engine.handle_message(&say(&h, "bob", "Chile")).await.unwrap();
        }
        let outcome = h.engine.handle_message(&say(&h, "ada", "france")).await.unwrap();
        assert!(matches!(outcome, AnswerOutcome::Correct { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_round_expires_without_credit() {
        let h = harness();
        let first = h.engine.start_round(&h.channel, france(), france_options()).await;

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(h.engine.current_round(&h.channel).unwrap().round, first.round);

        tokio::time::sleep(Duration::from_secs(2)).await;
        match h.gateway.last("round_expired").unwrap() {
            Presentation::RoundExpired { round, country, .. } => {
                assert_eq!(round, first.round);
                assert_eq!(country, "France");
            }
            other => panic!("unexpected {other:?}"),
        }
        let next = h.engine.current_round(&h.channel).unwrap();
        assert_ne!(next.round, first.round);
        assert_eq!(h.gateway.count("question_posted"), 2);
        assert!(h.stats.leaderboard(Category::Tld, 10).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn correct_answer_cancels_answer_window() {
        let h = harness();
        h.engine.start_round(&h.channel, france(), france_options()).await;

        tokio::time::sleep(Duration::from_secs(59)).await;
        h.engine.handle_message(&say(&h, "ada", "France")).await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.gateway.count("round_expired"), 0);
        assert!(h.engine.current_round(&h.channel).is_none());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.gateway.count("round_expired"), 0);
        assert_eq!(h.gateway.count("question_posted"), 2);
        assert!(h.engine.current_round(&h.channel).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_post_cancels_pending_next_question() {
        let h = harness();
        h.engine.start_round(&h.channel, france(), france_options()).await;
        h.engine.handle_message(&say(&h, "ada", "France")).await.unwrap();

        let manual = h.engine.post_new_question(&h.channel).await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.engine.current_round(&h.channel).unwrap().round, manual.round);
        assert_eq!(h.gateway.count("question_posted"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_window_keeps_question_up() {
        let settings = QuizSettings {
            answer_window: None,
            ..QuizSettings::default()
        };
        let h = harness_with(settings, RecordingGateway::default());
        let first = h.engine.start_round(&h.channel, france(), france_options()).await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(h.engine.current_round(&h.channel).unwrap().round, first.round);
        assert_eq!(h.gateway.count("round_expired"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn presentation_failures_do_not_wedge_channel() {
        let h = harness_with(QuizSettings::default(), RecordingGateway::failing());
        let first = h.engine.start_round(&h.channel, france(), france_options()).await;
        assert!(h.engine.current_round(&h.channel).is_some());

        let outcome = h.engine.handle_message(&say(&h, "ada", "France")).await.unwrap();
        assert!(matches!(outcome, AnswerOutcome::Correct { .. }));
        assert_eq!(
            h.stats.stats(&UserId::new("ada"), Category::Tld).await.unwrap().unwrap().correct,
            1
        );

        tokio::time::sleep(Duration::from_secs(4)).await;
        let next = h.engine.current_round(&h.channel).unwrap();
        assert_ne!(next.round, first.round);
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_only_fills_empty_channels() {
        let h = harness();
        let existing = h.engine.start_round(&h.channel, france(), france_options()).await;
        h.engine.initialize_channels().await;

        assert_eq!(h.engine.current_round(&h.channel).unwrap().round, existing.round);
        assert!(h.engine.current_round(&ChannelId::new("flag-channel")).is_some());
        assert_eq!(h.gateway.count("question_posted"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_timers() {
        let h = harness();
        h.engine.start_round(&h.channel, france(), france_options()).await;
        h.engine.shutdown();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(h.engine.current_round(&h.channel).is_none());
        assert_eq!(h.gateway.count("question_posted"), 1);
    }
}
