//! Subscription lifecycle sweeper.
//!
//! One background task loops forever with a fixed sleep between cycles.
//! Each cycle runs three independent steps: expiry reminders (3 days and
//! 1 day ahead, date granularity), moving overdue subscribers to the
//! expired set, and archiving expired rows older than a month. A failed
//! step or a failed send never blocks the remaining work.

use std::{sync::Arc, time::Duration};

use chrono::{Local, NaiveDate, NaiveDateTime};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    domain::ChatId, ledger::Ledger, messaging::port::MessagingPort, texts, Result,
};

const ARCHIVE_AFTER_DAYS: i64 = 30;

pub struct Sweeper {
    ledger: Ledger,
    messenger: Arc<dyn MessagingPort>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(ledger: Ledger, messenger: Arc<dyn MessagingPort>, interval: Duration) -> Self {
        Self {
            ledger,
            messenger,
            interval,
        }
    }

    /// Spawn the sweep loop. The returned token stops it.
    pub fn spawn(self) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            info!("subscription sweeper started, interval {:?}", self.interval);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = sleep(self.interval) => {
                        self.sweep_once(Local::now().naive_local()).await;
                    }
                }
            }
        });
        cancel
    }

    /// One full cycle. Steps are independent: each failure is logged and
    /// the next step still runs.
    pub async fn sweep_once(&self, now: NaiveDateTime) {
        if let Err(e) = self.send_reminders(now.date()).await {
            error!("expiry reminders failed: {e}");
        }
        if let Err(e) = self.expire_overdue(now).await {
            error!("expiry sweep failed: {e}");
        }
        if let Err(e) = self.archive_stale(now.date()).await {
            error!("old-expired archive failed: {e}");
        }
    }

    async fn send_reminders(&self, today: NaiveDate) -> Result<()> {
        let reminders = [
            (3, texts::EXPIRY_REMINDER_3D),
            (1, texts::EXPIRY_REMINDER_1D),
        ];
        for (days_ahead, text) in reminders {
            let due = today + chrono::Duration::days(days_ahead);
            for user_id in self.ledger.subscribers_expiring_on(due)? {
                if let Err(e) = self.messenger.send_text(ChatId(user_id), text).await {
                    warn!("expiry reminder to {user_id} failed: {e}");
                }
            }
        }
        Ok(())
    }

    async fn expire_overdue(&self, now: NaiveDateTime) -> Result<()> {
        let overdue = self.ledger.subscribers_expired_before(now)?;
        if overdue.is_empty() {
            info!("no expired subscriptions found");
            return Ok(());
        }

        // Notify first, move after; the move must happen even if every
        // send fails.
        for subscriber in &overdue {
            info!("subscription expired for user {}", subscriber.user_id);
            if let Err(e) = self
                .messenger
                .send_text(ChatId(subscriber.user_id), texts::SUBSCRIPTION_EXPIRED)
                .await
            {
                warn!("expiry notice to {} failed: {e}", subscriber.user_id);
            }
        }

        let user_ids: Vec<i64> = overdue.iter().map(|s| s.user_id).collect();
        self.ledger.move_to_expired(&user_ids, now)?;
        info!("moved {} users to the expired set", user_ids.len());
        Ok(())
    }

    async fn archive_stale(&self, today: NaiveDate) -> Result<()> {
        let cutoff = today - chrono::Duration::days(ARCHIVE_AFTER_DAYS);
        let moved = self.ledger.archive_old_expired(cutoff)?;
        if moved > 0 {
            info!("archived {moved} long-expired users");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::{errors::Error, messaging::types::InlineKeyboard};

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<(i64, String)>>,
        fail_sends: bool,
    }

    impl RecordingMessenger {
        fn failing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_sends: true,
            }
        }

        fn sent(&self) -> Vec<(i64, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagingPort for RecordingMessenger {
        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
            if self.fail_sends {
                return Err(Error::External("send failed".to_string()));
            }
            self.sent.lock().unwrap().push((chat_id.0, text.to_string()));
            Ok(())
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<()> {
            self.send_text(chat_id, html).await
        }

        async fn send_keyboard(
            &self,
            chat_id: ChatId,
            text: &str,
            _keyboard: InlineKeyboard,
        ) -> Result<()> {
            self.send_text(chat_id, text).await
        }

        async fn send_document(
            &self,
            chat_id: ChatId,
            file_name: &str,
            _data: Vec<u8>,
            _caption: Option<&str>,
        ) -> Result<()> {
            self.send_text(chat_id, file_name).await
        }

        async fn answer_callback(&self, _callback_id: &str, _text: Option<&str>) -> Result<()> {
            Ok(())
        }
    }

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap()
    }

    fn sweeper(ledger: Ledger, messenger: Arc<RecordingMessenger>) -> Sweeper {
        Sweeper::new(ledger, messenger, Duration::from_secs(600))
    }

    #[tokio::test]
    async fn overdue_subscribers_are_notified_and_moved() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger
            .add_or_renew(1, "+1", 30, ts("2026-01-01T00:00:00"))
            .unwrap();
        ledger
            .add_or_renew(2, "+2", 30, ts("2026-07-20T00:00:00"))
            .unwrap();

        let messenger = Arc::new(RecordingMessenger::default());
        sweeper(ledger.clone(), messenger.clone())
            .sweep_once(ts("2026-08-04T12:00:00"))
            .await;

        assert!(!ledger.is_subscriber(1).unwrap());
        assert!(ledger.is_subscriber(2).unwrap());
        let expired = ledger.all_expired().unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].user_id, 1);

        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 1);
        assert_eq!(sent[0].1, texts::SUBSCRIPTION_EXPIRED);
    }

    #[tokio::test]
    async fn move_still_runs_when_sends_fail() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger
            .add_or_renew(1, "+1", 30, ts("2026-01-01T00:00:00"))
            .unwrap();

        let messenger = Arc::new(RecordingMessenger::failing());
        sweeper(ledger.clone(), messenger)
            .sweep_once(ts("2026-08-04T12:00:00"))
            .await;

        assert!(!ledger.is_subscriber(1).unwrap());
        assert_eq!(ledger.all_expired().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reminders_match_expiry_dates_only() {
        let ledger = Ledger::open_in_memory().unwrap();
        // Expires in 3 days and in 1 day (dates, time of day ignored).
        ledger
            .add_or_renew(3, "+3", 30, ts("2026-07-08T06:00:00"))
            .unwrap();
        ledger
            .add_or_renew(1, "+1", 30, ts("2026-07-06T23:00:00"))
            .unwrap();
        // Expires in 10 days: no reminder.
        ledger
            .add_or_renew(9, "+9", 30, ts("2026-07-15T00:00:00"))
            .unwrap();

        let messenger = Arc::new(RecordingMessenger::default());
        sweeper(ledger.clone(), messenger.clone())
            .sweep_once(ts("2026-08-04T12:00:00"))
            .await;

        let sent = messenger.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent
            .iter()
            .any(|(id, text)| *id == 3 && text == texts::EXPIRY_REMINDER_3D));
        assert!(sent
            .iter()
            .any(|(id, text)| *id == 1 && text == texts::EXPIRY_REMINDER_1D));
    }

    #[tokio::test]
    async fn stale_expired_rows_are_archived_after_a_month() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger
            .add_or_renew(1, "+1", 10, ts("2026-06-01T00:00:00")) // expired 11/06
            .unwrap();
        ledger
            .move_to_expired(&[1], ts("2026-06-12T00:00:00"))
            .unwrap();

        let messenger = Arc::new(RecordingMessenger::default());
        sweeper(ledger.clone(), messenger)
            .sweep_once(ts("2026-08-04T12:00:00"))
            .await;

        assert!(ledger.all_expired().unwrap().is_empty());
        let old = ledger.all_old_expired().unwrap();
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].user_id, 1);
    }
}
