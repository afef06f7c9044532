//! Gallery state: the collection, cursor, recent history, and the two
//! navigation policies.
//!
//! All of this is owned by the dispatcher thread. Input concurrency funnels
//! through the command channel, so nothing here needs a lock.
//!
//! Core invariants (must hold after every public call):
//! * `cursor` is `None` exactly when `items` is empty; otherwise it indexes
//!   into `items`.
//! * `history` never exceeds its depth, and every entry was a valid cursor
//!   for the current collection (reload clears it before indices could go
//!   stale).
//! * `selection` survives only until the next navigation or reload.
//! * `advance` terminates within `2 * len` random draws; when no qualifying
//!   index exists inside that budget a history repeat is accepted, so small
//!   collections (`len <= depth + 1`) revisit rather than spin. Only a
//!   single-item collection re-yields the cursor.

mod item;

pub use item::{Item, ItemId};

use core_events::Side;
use rand::Rng;
use std::collections::VecDeque;
use std::path::PathBuf;
use tracing::{debug, info};

/// Where a vote attribution goes. Fire-and-forget from the gallery's view:
/// the sink logs its own failures and never reports them back.
pub trait VoteSink {
    fn record_vote(&self, id: &ItemId, option: u8);
}

/// Navigation policy. Both historical variants of the kiosk ship as named
/// modes; the caller picks one at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavMode {
    /// The plain slideshow: `(index ± 1) mod N`.
    Sequential,
    /// The voting kiosk: a fresh uniform draw avoiding the cursor and
    /// recent history. Both directions resolve to a fresh draw.
    RandomNoRepeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Bounded FIFO of recently visited cursor values. Push-evict: the oldest
/// entry drops once the depth is exceeded.
#[derive(Debug, Clone)]
pub struct RecentHistory {
    entries: VecDeque<usize>,
    depth: usize,
}

impl RecentHistory {
    pub fn new(depth: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(depth),
            depth,
        }
    }

    pub fn push(&mut self, index: usize) {
        self.entries.push_back(index);
        while self.entries.len() > self.depth {
            self.entries.pop_front();
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The selection engine. Owns the collection and all position state.
#[derive(Debug)]
pub struct Gallery {
    items: Vec<Item>,
    cursor: Option<usize>,
    history: RecentHistory,
    selection: Option<Side>,
    mode: NavMode,
}

impl Gallery {
    pub fn new(mode: NavMode, history_depth: usize) -> Self {
        Self {
            items: Vec::new(),
            cursor: None,
            history: RecentHistory::new(history_depth),
            selection: None,
            mode,
        }
    }

    pub fn mode(&self) -> NavMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&Item> {
        self.cursor.and_then(|i| self.items.get(i))
    }

    pub fn selection(&self) -> Option<Side> {
        self.selection
    }

    pub fn history(&self) -> &RecentHistory {
        &self.history
    }

    /// Atomically replace the collection. The cursor lands on a uniformly
    /// random valid index (`None` for an empty collection); history and
    /// selection are cleared so nothing from the old collection leaks in.
    pub fn reload<R: Rng>(&mut self, items: Vec<Item>, rng: &mut R) {
        self.items = items;
        self.cursor = if self.items.is_empty() {
            None
        } else {
            Some(rng.gen_range(0..self.items.len()))
        };
        self.history.clear();
        self.selection = None;
        info!(
            target: "gallery",
            count = self.items.len(),
            cursor = ?self.cursor,
            "collection_reloaded"
        );
    }

    /// Move the cursor per the active policy. Returns the new cursor, or
    /// `None` for the empty-collection no-op.
    ///
    /// On every accepted move: the previous cursor is pushed onto history,
    /// the new one installed, and the selection flag cleared.
    pub fn advance<R: Rng>(&mut self, direction: Direction, rng: &mut R) -> Option<usize> {
        let current = self.cursor?;
        let len = self.items.len();

        let next = match self.mode {
            NavMode::Sequential => match direction {
                Direction::Forward => (current + 1) % len,
                Direction::Backward => (current + len - 1) % len,
            },
            NavMode::RandomNoRepeat => self.draw_no_repeat(current, len, rng),
        };

        self.history.push(current);
        self.cursor = Some(next);
        self.selection = None;
        debug!(target: "gallery", from = current, to = next, "cursor_advanced");
        Some(next)
    }

    /// Uniform draws rejecting the cursor and recent history, budgeted at
    /// `2 * len` so a small collection cannot spin the loop forever. Once
    /// the budget runs out the last draw is accepted even if history holds
    /// it; the cursor itself is still refused unless the collection has a
    /// single item.
    fn draw_no_repeat<R: Rng>(&self, current: usize, len: usize, rng: &mut R) -> usize {
        let budget = len.saturating_mul(2);
        let mut candidate = rng.gen_range(0..len);
        for _ in 1..budget {
            if candidate != current && !self.history.contains(candidate) {
                return candidate;
            }
            candidate = rng.gen_range(0..len);
        }
        if candidate == current && len > 1 {
            candidate = (current + 1) % len;
        }
        candidate
    }

    /// Mark which half of the current pair the user chose. Single items and
    /// the empty collection ignore this; there is nothing to highlight.
    pub fn set_selection(&mut self, side: Side) {
        if self.current().is_some_and(Item::is_pair) {
            self.selection = Some(side);
        }
    }

    /// Hand the current pair's attribution to the sink. No-op when the
    /// collection is empty, the cursor is off, or the item is not a pair.
    pub fn record_vote(&self, side: Side, sink: &dyn VoteSink) {
        let Some(item) = self.current() else {
            return;
        };
        if !item.is_pair() {
            return;
        }
        sink.record_vote(item.id(), side.vote_option());
    }

    /// Asset paths of the wraparound neighbors (`±1`), for cache warming.
    /// Empty when the collection has at most one item; when the two
    /// neighbors coincide (`len == 2`) each path appears once.
    pub fn neighbor_paths(&self) -> Vec<PathBuf> {
        let len = self.items.len();
        let Some(current) = self.cursor else {
            return Vec::new();
        };
        if len <= 1 {
            return Vec::new();
        }

        let next = (current + 1) % len;
        let prev = (current + len - 1) % len;
        let mut out: Vec<PathBuf> = Vec::new();
        for idx in [next, prev] {
            if let Some(item) = self.items.get(idx) {
                for path in item.asset_paths() {
                    let owned = path.to_path_buf();
                    if !out.contains(&owned) {
                        out.push(owned);
                    }
                }
            }
        }
        out
    }
}
