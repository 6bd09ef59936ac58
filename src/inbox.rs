//! Inbox scanning and the refresh gate around it

use crate::filter::is_addressed_to;
use crate::parser::Parser;
use crate::store::BlobStore;
use crate::types::{ParsedMessage, RawMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Key prefix under which delivered mail is stored
pub const DEFAULT_PREFIX: &str = "email/";

/// Collect every stored message addressed to `address`, newest first.
///
/// A message that cannot be fetched is logged and skipped. If the listing
/// itself fails the result is empty.
pub fn scan_inbox(
    store: &dyn BlobStore,
    parser: &Parser,
    prefix: &str,
    address: &str,
) -> Vec<ParsedMessage> {
    let keys = match store.list(prefix) {
        Ok(keys) => keys,
        Err(e) => {
            error!(prefix, error = %e, "Error checking stored emails");
            return Vec::new();
        }
    };

    let mut messages: Vec<ParsedMessage> = keys
        .iter()
        .filter_map(|key| {
            let bytes = match store.fetch(key) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(key = key.as_str(), error = %e, "Error processing email file");
                    return None;
                }
            };

            let raw = RawMessage::from_bytes(&bytes, key.as_str());
            if !is_addressed_to(raw.content(), address) {
                return None;
            }

            Some(parser.parse(&raw))
        })
        .collect();

    sort_newest_first(&mut messages);
    debug!(
        address,
        scanned = keys.len(),
        matched = messages.len(),
        "Scanned inbox"
    );

    messages
}

/// Order by receipt time, most recent first
pub fn sort_newest_first(messages: &mut [ParsedMessage]) {
    messages.sort_by(|a, b| b.received_at.cmp(&a.received_at));
}

/// Timing for a [`Poller`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Gap between scheduled scans
    pub interval: Duration,

    /// Minimum gap before a manual refresh is accepted
    pub cooldown: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            cooldown: Duration::from_secs(10),
        }
    }
}

/// What asked for a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The periodic timer
    Scheduled,
    /// A user action, subject to the cooldown
    Manual,
}

/// Result of [`Poller::refresh`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A scan ran and found this many messages
    Scanned(usize),
    /// Another scan is in flight
    Busy,
    /// Manual refresh refused; time left in the cooldown
    CoolingDown(Duration),
    /// Scheduled refresh too early; time left in the interval
    NotDue(Duration),
}

#[derive(Debug, Default)]
struct PollState {
    last_scan: Option<Instant>,
    messages: Vec<ParsedMessage>,
}

/// Clears the in-flight flag when the scan ends, even on unwind
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Repeated scanning for one recipient.
///
/// At most one scan runs at a time, and each scan's result replaces the
/// previous list rather than merging with it.
pub struct Poller<S: BlobStore> {
    store: S,
    parser: Parser,
    address: String,
    prefix: String,
    settings: PollSettings,
    in_flight: AtomicBool,
    state: Mutex<PollState>,
}

impl<S: BlobStore> Poller<S> {
    pub fn new(store: S, parser: Parser, address: impl Into<String>) -> Self {
        Self {
            store,
            parser,
            address: address.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            settings: PollSettings::default(),
            in_flight: AtomicBool::new(false),
            state: Mutex::new(PollState::default()),
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub const fn with_settings(mut self, settings: PollSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub const fn settings(&self) -> PollSettings {
        self.settings
    }

    fn state(&self) -> MutexGuard<'_, PollState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Messages from the most recent scan
    #[must_use]
    pub fn messages(&self) -> Vec<ParsedMessage> {
        self.state().messages.clone()
    }

    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Time left before a manual refresh is accepted
    #[must_use]
    pub fn remaining_cooldown(&self, now: Instant) -> Duration {
        self.remaining(now, self.settings.cooldown)
    }

    /// Time left before the next scheduled scan is due
    #[must_use]
    pub fn next_due(&self, now: Instant) -> Duration {
        self.remaining(now, self.settings.interval)
    }

    fn remaining(&self, now: Instant, window: Duration) -> Duration {
        self.state().last_scan.map_or(Duration::ZERO, |last| {
            window.saturating_sub(now.saturating_duration_since(last))
        })
    }

    /// Whether a manual refresh would run right now
    #[must_use]
    pub fn can_refresh(&self, now: Instant) -> bool {
        !self.is_scanning() && self.remaining_cooldown(now).is_zero()
    }

    /// Scan if the gate allows it and replace the current list
    pub fn refresh(&self, trigger: Trigger, now: Instant) -> RefreshOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(address = self.address.as_str(), "Scan already in flight");
            return RefreshOutcome::Busy;
        }
        let _guard = InFlight(&self.in_flight);

        match trigger {
            Trigger::Manual => {
                let remaining = self.remaining_cooldown(now);
                if !remaining.is_zero() {
                    return RefreshOutcome::CoolingDown(remaining);
                }
            }
            Trigger::Scheduled => {
                let remaining = self.next_due(now);
                if !remaining.is_zero() {
                    return RefreshOutcome::NotDue(remaining);
                }
            }
        }

        let messages = scan_inbox(&self.store, &self.parser, &self.prefix, &self.address);
        let count = messages.len();

        let mut state = self.state();
        state.messages = messages;
        state.last_scan = Some(now);
        drop(state);

        info!(address = self.address.as_str(), count, ?trigger, "Inbox refreshed");
        RefreshOutcome::Scanned(count)
    }

    /// Run scheduled scans until `stop` is set, calling `on_update` after each
    pub fn run(&self, stop: &AtomicBool, mut on_update: impl FnMut(&[ParsedMessage])) {
        while !stop.load(Ordering::Acquire) {
            let now = Instant::now();
            if let RefreshOutcome::Scanned(_) = self.refresh(Trigger::Scheduled, now) {
                on_update(&self.messages());
            }

            let wait = self.next_due(Instant::now()).min(Duration::from_millis(500));
            std::thread::sleep(wait.max(Duration::from_millis(10)));
        }
    }
}

impl<S: BlobStore> std::fmt::Debug for Poller<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("address", &self.address)
            .field("prefix", &self.prefix)
            .field("settings", &self.settings)
            .field("scanning", &self.is_scanning())
            .finish_non_exhaustive()
    }
}
