//! Applies one command to the gallery and drives the side effects the
//! command implies through [`DispatchContext`].
//!
//! The vote sequence is the only multi-step path: show the highlighted
//! frame, hand the vote off, hold for the settle window, then advance.
//! Everything else is a single state change plus at most one redraw.

use core_events::{Command, Side};
use core_gallery::{Direction, Gallery, Item, VoteSink};
use rand::Rng;
use tracing::debug;

/// Effects the dispatcher needs from the runtime: presenting frames,
/// pausing after a vote, and refreshing the collection from disk/server.
pub trait DispatchContext {
    /// Composes and presents the gallery's current state.
    fn redraw(&mut self, gallery: &Gallery);

    /// Holds the current frame for the configured settle delay.
    fn settle(&mut self);

    /// Syncs with the server (best effort) and rescans the store.
    fn sync_collection(&mut self) -> Vec<Item>;
}

/// What a single dispatch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchResult {
    pub redrawn: bool,
    pub reloaded: bool,
    pub quit: bool,
}

impl DispatchResult {
    pub fn clean() -> Self {
        Self {
            redrawn: false,
            reloaded: false,
            quit: false,
        }
    }

    pub fn redrawn() -> Self {
        Self {
            redrawn: true,
            reloaded: false,
            quit: false,
        }
    }

    pub fn reloaded() -> Self {
        Self {
            redrawn: true,
            reloaded: true,
            quit: false,
        }
    }

    pub fn quit() -> Self {
        Self {
            redrawn: false,
            reloaded: false,
            quit: true,
        }
    }
}

/// Applies `command` to the gallery. Safe on an empty collection: every
/// navigation and vote command degrades to a no-op.
pub fn dispatch<R: Rng>(
    command: Command,
    gallery: &mut Gallery,
    votes: &dyn VoteSink,
    rng: &mut R,
    ctx: &mut dyn DispatchContext,
) -> DispatchResult {
    debug!(target: "dispatch", command = command.as_str(), "command_dispatched");
    match command {
        Command::Display => {
            ctx.redraw(gallery);
            DispatchResult::redrawn()
        }
        Command::Next => advance(gallery, Direction::Forward, rng, ctx),
        Command::Previous => advance(gallery, Direction::Backward, rng, ctx),
        Command::VoteAndAdvance(side) => vote_and_advance(gallery, side, votes, rng, ctx),
        Command::Reload => {
            let items = ctx.sync_collection();
            gallery.reload(items, rng);
            ctx.redraw(gallery);
            DispatchResult::reloaded()
        }
        Command::Quit => DispatchResult::quit(),
    }
}

fn advance<R: Rng>(
    gallery: &mut Gallery,
    direction: Direction,
    rng: &mut R,
    ctx: &mut dyn DispatchContext,
) -> DispatchResult {
    if gallery.advance(direction, rng).is_none() {
        return DispatchResult::clean();
    }
    ctx.redraw(gallery);
    DispatchResult::redrawn()
}

fn vote_and_advance<R: Rng>(
    gallery: &mut Gallery,
    side: Side,
    votes: &dyn VoteSink,
    rng: &mut R,
    ctx: &mut dyn DispatchContext,
) -> DispatchResult {
    if gallery.current().is_none() {
        return DispatchResult::clean();
    }
    gallery.set_selection(side);
    ctx.redraw(gallery);
    gallery.record_vote(side, votes);
    // The highlighted frame stays up for the settle window before the
    // next pair replaces it.
    ctx.settle();
    gallery.advance(Direction::Forward, rng);
    ctx.redraw(gallery);
    DispatchResult::redrawn()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_gallery::{ItemId, NavMode};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::cell::RefCell;
    use std::path::PathBuf;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum CtxEvent {
        Redraw {
            cursor: Option<usize>,
            selection: Option<Side>,
        },
        Settle,
        Sync,
    }

    #[derive(Default)]
    struct ScriptedContext {
        events: Vec<CtxEvent>,
        next_collection: Vec<Item>,
    }

    impl DispatchContext for ScriptedContext {
        fn redraw(&mut self, gallery: &Gallery) {
            self.events.push(CtxEvent::Redraw {
                cursor: gallery.cursor(),
                selection: gallery.selection(),
            });
        }

        fn settle(&mut self) {
            self.events.push(CtxEvent::Settle);
        }

        fn sync_collection(&mut self) -> Vec<Item> {
            self.events.push(CtxEvent::Sync);
            std::mem::take(&mut self.next_collection)
        }
    }

    #[derive(Default)]
    struct CapturingSink(RefCell<Vec<(String, u8)>>);

    impl VoteSink for CapturingSink {
        fn record_vote(&self, id: &ItemId, option: u8) {
            self.0.borrow_mut().push((id.to_string(), option));
        }
    }

    fn pairs(n: usize) -> Vec<Item> {
        (1..=n)
            .map(|i| Item::Pair {
                id: ItemId::from_number(i as u32),
                left: PathBuf::from(format!("images/{i:05}_1.jpg")),
                right: PathBuf::from(format!("images/{i:05}_2.jpg")),
            })
            .collect()
    }

    fn loaded_gallery(n: usize, rng: &mut StdRng) -> Gallery {
        let mut gallery = Gallery::new(NavMode::Sequential, 5);
        gallery.reload(pairs(n), rng);
        gallery
    }

    #[test]
    fn display_redraws_without_moving() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut gallery = loaded_gallery(3, &mut rng);
        let cursor = gallery.cursor();
        let sink = CapturingSink::default();
        let mut ctx = ScriptedContext::default();

        let result = dispatch(Command::Display, &mut gallery, &sink, &mut rng, &mut ctx);

        assert_eq!(result, DispatchResult::redrawn());
        assert_eq!(
            ctx.events,
            vec![CtxEvent::Redraw {
                cursor,
                selection: None
            }]
        );
        assert_eq!(gallery.cursor(), cursor);
    }

    #[test]
    fn next_advances_one_step_and_redraws() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut gallery = loaded_gallery(3, &mut rng);
        let before = gallery.cursor().unwrap();
        let sink = CapturingSink::default();
        let mut ctx = ScriptedContext::default();

        let result = dispatch(Command::Next, &mut gallery, &sink, &mut rng, &mut ctx);

        assert_eq!(result, DispatchResult::redrawn());
        assert_eq!(
            ctx.events,
            vec![CtxEvent::Redraw {
                cursor: Some((before + 1) % 3),
                selection: None
            }]
        );
    }

    #[test]
    fn previous_wraps_backward() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut gallery = loaded_gallery(3, &mut rng);
        let before = gallery.cursor().unwrap();
        let sink = CapturingSink::default();
        let mut ctx = ScriptedContext::default();

        dispatch(Command::Previous, &mut gallery, &sink, &mut rng, &mut ctx);

        assert_eq!(gallery.cursor(), Some((before + 2) % 3));
    }

    #[test]
    fn vote_highlights_records_settles_then_advances() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut gallery = loaded_gallery(3, &mut rng);
        let before = gallery.cursor().unwrap();
        let voted_id = gallery.current().unwrap().id().to_string();
        let sink = CapturingSink::default();
        let mut ctx = ScriptedContext::default();

        let result = dispatch(
            Command::VoteAndAdvance(Side::Right),
            &mut gallery,
            &sink,
            &mut rng,
            &mut ctx,
        );

        assert_eq!(result, DispatchResult::redrawn());
        assert_eq!(
            ctx.events,
            vec![
                CtxEvent::Redraw {
                    cursor: Some(before),
                    selection: Some(Side::Right)
                },
                CtxEvent::Settle,
                CtxEvent::Redraw {
                    cursor: Some((before + 1) % 3),
                    selection: None
                },
            ]
        );
        assert_eq!(*sink.0.borrow(), vec![(voted_id, 1)]);
        assert_eq!(gallery.selection(), None);
    }

    #[test]
    fn left_vote_carries_option_two() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut gallery = loaded_gallery(2, &mut rng);
        let voted_id = gallery.current().unwrap().id().to_string();
        let sink = CapturingSink::default();
        let mut ctx = ScriptedContext::default();

        dispatch(
            Command::VoteAndAdvance(Side::Left),
            &mut gallery,
            &sink,
            &mut rng,
            &mut ctx,
        );

        assert_eq!(*sink.0.borrow(), vec![(voted_id, 2)]);
    }

    #[test]
    fn single_pair_vote_advances_back_to_itself() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut gallery = loaded_gallery(1, &mut rng);
        let sink = CapturingSink::default();
        let mut ctx = ScriptedContext::default();

        let result = dispatch(
            Command::VoteAndAdvance(Side::Right),
            &mut gallery,
            &sink,
            &mut rng,
            &mut ctx,
        );

        assert_eq!(result, DispatchResult::redrawn());
        assert_eq!(gallery.cursor(), Some(0));
        assert_eq!(sink.0.borrow().len(), 1);
    }

    #[test]
    fn empty_collection_degrades_to_noops() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut gallery = Gallery::new(NavMode::Sequential, 5);
        let sink = CapturingSink::default();
        let mut ctx = ScriptedContext::default();

        for command in [
            Command::Next,
            Command::Previous,
            Command::VoteAndAdvance(Side::Left),
        ] {
            let result = dispatch(command, &mut gallery, &sink, &mut rng, &mut ctx);
            assert_eq!(result, DispatchResult::clean());
        }
        assert!(ctx.events.is_empty());
        assert!(sink.0.borrow().is_empty());

        // Display still paints the idle frame.
        let result = dispatch(Command::Display, &mut gallery, &sink, &mut rng, &mut ctx);
        assert_eq!(result, DispatchResult::redrawn());
        assert_eq!(
            ctx.events,
            vec![CtxEvent::Redraw {
                cursor: None,
                selection: None
            }]
        );
    }

    #[test]
    fn reload_swaps_collection_and_redraws() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut gallery = loaded_gallery(2, &mut rng);
        let sink = CapturingSink::default();
        let mut ctx = ScriptedContext {
            next_collection: pairs(5),
            ..Default::default()
        };

        let result = dispatch(Command::Reload, &mut gallery, &sink, &mut rng, &mut ctx);

        assert_eq!(result, DispatchResult::reloaded());
        assert_eq!(gallery.len(), 5);
        assert_eq!(ctx.events[0], CtxEvent::Sync);
        match ctx.events[1] {
            CtxEvent::Redraw {
                cursor: Some(cursor),
                selection: None,
            } => assert!(cursor < 5),
            ref other => panic!("expected redraw after reload, got {other:?}"),
        }
    }

    #[test]
    fn reload_to_empty_blanks_the_cursor() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut gallery = loaded_gallery(4, &mut rng);
        let sink = CapturingSink::default();
        let mut ctx = ScriptedContext::default();

        let result = dispatch(Command::Reload, &mut gallery, &sink, &mut rng, &mut ctx);

        assert_eq!(result, DispatchResult::reloaded());
        assert_eq!(gallery.cursor(), None);
        assert_eq!(
            ctx.events,
            vec![
                CtxEvent::Sync,
                CtxEvent::Redraw {
                    cursor: None,
                    selection: None
                }
            ]
        );
    }

    #[test]
    fn quit_reports_without_touching_state() {
        let mut rng = StdRng::seed_from_u64(10);
        let mut gallery = loaded_gallery(3, &mut rng);
        let cursor = gallery.cursor();
        let sink = CapturingSink::default();
        let mut ctx = ScriptedContext::default();

        let result = dispatch(Command::Quit, &mut gallery, &sink, &mut rng, &mut ctx);

        assert_eq!(result, DispatchResult::quit());
        assert!(ctx.events.is_empty());
        assert_eq!(gallery.cursor(), cursor);
    }
}
