use crate::models::{ChannelId, OptionSet, Question};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;

pub type RoundId = u64;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub channel_id: ChannelId,
    pub round: RoundId,
    pub question: Question,
    pub options: OptionSet,
    pub hints_shown: bool,
    pub wrong_streak: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum Attempt {
    Correct { session: Session, next: RoundId },
    Incorrect { session: Session, hint: Option<OptionSet> },
}

// Timer tasks only act while the epoch they were armed with is current.
#[derive(Default)]
struct ChannelSlot {
    epoch: RoundId,
    session: Option<Session>,
    timer: Option<JoinHandle<()>>,
    last_started: Option<DateTime<Utc>>,
}

impl ChannelSlot {
    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }
}

#[derive(Default)]
pub struct SessionStore {
    slots: DashMap<ChannelId, ChannelSlot>,
    next_epoch: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) -> RoundId {
        self.next_epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn begin_round(&self, channel: &ChannelId, question: Question, options: OptionSet) -> Session {
        let round = self.bump();
        let mut slot = self.slots.entry(channel.clone()).or_default();
        // created_at is strictly increasing per channel, even within one clock tick.
        let now = Utc::now();
        let created_at = match slot.last_started {
            Some(prev) if now <= prev => prev + chrono::Duration::microseconds(1),
            _ => now,
        };
        let session = Session {
            channel_id: channel.clone(),
            round,
            question,
            options,
            hints_shown: false,
            wrong_streak: 0,
            created_at,
        };
        slot.cancel_timer();
        slot.last_started = Some(created_at);
        slot.epoch = round;
        slot.session = Some(session.clone());
        session
    }

    pub fn snapshot(&self, channel: &ChannelId) -> Option<Session> {
        self.slots.get(channel).and_then(|slot| slot.session.clone())
    }

    pub fn has_session(&self, channel: &ChannelId) -> bool {
        self.slots.get(channel).is_some_and(|slot| slot.session.is_some())
    }

    pub fn attempt(
        &self,
        channel: &ChannelId,
        hint_threshold: u32,
        verdict: impl FnOnce(&Session) -> bool,
    ) -> Option<Attempt> {
        let mut slot = self.slots.get_mut(channel)?;
        let correct = verdict(slot.session.as_ref()?);

        if correct {
            let session = slot.session.take()?;
            slot.cancel_timer();
            let next = self.bump();
            slot.epoch = next;
            return Some(Attempt::Correct { session, next });
        }

        let session = slot.session.as_mut()?;
        session.wrong_streak += 1;
        let mut hint = None;
        if !session.hints_shown && session.wrong_streak >= hint_threshold {
            session.hints_shown = true;
            hint = Some(session.options.clone());
        }
        Some(Attempt::Incorrect {
            session: session.clone(),
            hint,
        })
    }

    pub fn arm_timer(&self, channel: &ChannelId, epoch: RoundId, spawn: impl FnOnce() -> JoinHandle<()>) -> bool {
        let Some(mut slot) = self.slots.get_mut(channel) else {
            return false;
        };
        if slot.epoch != epoch {
            return false;
        }
        slot.cancel_timer();
        slot.timer = Some(spawn());
        true
    }

    /// Called by a firing timer: detaches its own handle so a following
    /// `begin_round` does not abort it. False when the timer is stale.
    pub fn claim_timer(&self, channel: &ChannelId, epoch: RoundId) -> bool {
        match self.slots.get_mut(channel) {
            Some(mut slot) if slot.epoch == epoch => {
                slot.timer.take();
                true
            }
            _ => false,
        }
    }

    pub fn expire(&self, channel: &ChannelId, epoch: RoundId) -> Option<Session> {
        let mut slot = self.slots.get_mut(channel)?;
        if slot.epoch != epoch {
            return None;
        }
        let session = slot.session.take()?;
        slot.timer.take();
        slot.epoch = self.bump();
        Some(session)
    }

    pub fn clear(&self) {
        for mut slot in self.slots.iter_mut() {
            slot.cancel_timer();
            slot.session = None;
        }
        self.slots.clear();
    }
}
