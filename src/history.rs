//! In-memory card history.
//!
//! Answers velocity and signal queries from transactions the service has
//! already scored. Queries only see activity strictly before the
//! transaction's own timestamp, so scoring never observes the transaction
//! itself or anything recorded after it.

use crate::error::{Result, ScoringError};
use crate::models::DynRng;
use crate::signals::SignalProvider;
use crate::types::prediction::{round_to, ModelScoreSet};
use crate::types::transaction::Transaction;
use crate::velocity::{VelocityProvider, VelocityWindow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Fingerprints unused for this long count as new again
pub const DEVICE_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone)]
struct CardActivity {
    amount: f64,
    country: String,
    at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct DeviceSeen {
    first: DateTime<Utc>,
    last: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct CardHistory {
    activity: Vec<CardActivity>,
    devices: HashMap<String, DeviceSeen>,
}

impl CardHistory {
    /// Drop activity and devices that fell out of retention as of `now`
    fn prune(&mut self, now: DateTime<Utc>, retention: Duration, device_retention: Duration) {
        let cutoff = now - retention;
        self.activity.retain(|a| a.at >= cutoff);

        let device_cutoff = now - device_retention;
        self.devices.retain(|_, seen| seen.last >= device_cutoff);
    }

    fn is_empty(&self) -> bool {
        self.activity.is_empty() && self.devices.is_empty()
    }
}

/// Per-card activity log shared between scoring tasks.
///
/// Retention is measured against the wall clock at recording time, never
/// against transaction timestamps, so a future-dated transaction cannot
/// push genuine activity out of the window.
pub struct HistoryStore {
    cards: RwLock<HashMap<String, CardHistory>>,
    retention: Duration,
    device_retention: Duration,
    autoencoder_threshold: f64,
}

impl HistoryStore {
    pub fn new(autoencoder_threshold: f64) -> Self {
        Self {
            cards: RwLock::new(HashMap::new()),
            retention: Duration::hours(24),
            device_retention: Duration::days(DEVICE_RETENTION_DAYS),
            autoencoder_threshold,
        }
    }

    /// Record a scored transaction
    pub fn record(&self, tx: &Transaction) {
        let Ok(mut cards) = self.cards.write() else {
            return;
        };
        let history = cards.entry(tx.card_id.clone()).or_default();

        history.activity.push(CardActivity {
            amount: tx.amount,
            country: tx.device.country.clone(),
            at: tx.timestamp,
        });

        let seen = history
            .devices
            .entry(tx.device.fingerprint.clone())
            .or_insert(DeviceSeen {
                first: tx.timestamp,
                last: tx.timestamp,
            });
        seen.first = seen.first.min(tx.timestamp);
        seen.last = seen.last.max(tx.timestamp);

        history.prune(Utc::now(), self.retention, self.device_retention);

        debug!(
            card_id = %tx.card_id,
            records = history.activity.len(),
            devices = history.devices.len(),
            "Recorded card activity"
        );

        if history.is_empty() {
            cards.remove(&tx.card_id);
        }
    }

    /// Prune every card as of `now` and evict cards with nothing left.
    /// Returns the number of cards evicted.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let Ok(mut cards) = self.cards.write() else {
            return 0;
        };
        let before = cards.len();
        cards.retain(|_, history| {
            history.prune(now, self.retention, self.device_retention);
            !history.is_empty()
        });
        let evicted = before - cards.len();

        if evicted > 0 {
            debug!(evicted = evicted, remaining = cards.len(), "Swept card history");
        }
        evicted
    }

    /// Activity strictly before `at`
    pub fn window_at(&self, card_id: &str, at: DateTime<Utc>) -> Result<VelocityWindow> {
        let cards = self
            .cards
            .read()
            .map_err(|e| ScoringError::lookup(format!("history lock poisoned: {}", e)))?;

        let Some(history) = cards.get(card_id) else {
            return Ok(VelocityWindow::default());
        };

        let hour_ago = at - Duration::hours(1);
        let day_ago = at - Duration::hours(24);
        let mut window = VelocityWindow::default();

        for activity in history.activity.iter().filter(|a| a.at < at) {
            if activity.at >= hour_ago {
                window.last_1h_count += 1;
            }
            if activity.at >= day_ago {
                window.last_24h_amount += activity.amount;
            }
        }
        window.last_24h_amount = round_to(window.last_24h_amount, 2);

        Ok(window)
    }

    /// Whether the card used this fingerprint before `at`
    pub fn known_device(&self, card_id: &str, fingerprint: &str, at: DateTime<Utc>) -> bool {
        self.cards
            .read()
            .map(|cards| {
                cards
                    .get(card_id)
                    .and_then(|h| h.devices.get(fingerprint))
                    .is_some_and(|seen| seen.first < at)
            })
            .unwrap_or(false)
    }

    /// Device country of the card's most recent activity before `at`
    pub fn last_country(&self, card_id: &str, at: DateTime<Utc>) -> Option<String> {
        let cards = self.cards.read().ok()?;
        cards
            .get(card_id)?
            .activity
            .iter()
            .filter(|a| a.at < at)
            .max_by_key(|a| a.at)
            .map(|a| a.country.clone())
    }

    /// Number of cards with recorded activity
    pub fn card_count(&self) -> usize {
        self.cards.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Number of fingerprints retained for a card
    pub fn device_count(&self, card_id: &str) -> usize {
        self.cards
            .read()
            .map(|cards| cards.get(card_id).map_or(0, |h| h.devices.len()))
            .unwrap_or(0)
    }
}

#[async_trait]
impl VelocityProvider for HistoryStore {
    fn name(&self) -> &str {
        "card_history"
    }

    async fn window(&self, tx: &Transaction, _rng: &mut DynRng) -> Result<VelocityWindow> {
        self.window_at(&tx.card_id, tx.timestamp)
    }
}

impl SignalProvider for HistoryStore {
    fn name(&self) -> &str {
        "card_history"
    }

    fn new_device(&self, tx: &Transaction, _rng: &mut DynRng) -> bool {
        !self.known_device(&tx.card_id, &tx.device.fingerprint, tx.timestamp)
    }

    fn behavioral_anomaly(&self, _tx: &Transaction, scores: &ModelScoreSet, _rng: &mut DynRng) -> bool {
        scores.autoencoder > self.autoencoder_threshold
    }

    fn location_mismatch(&self, tx: &Transaction, _rng: &mut DynRng) -> bool {
        self.last_country(&tx.card_id, tx.timestamp)
            .is_some_and(|country| country != tx.device.country)
    }
}
