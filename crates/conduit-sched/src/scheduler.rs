//! Node forest plus event list, driven one tick at a time.
//!
//! The scheduler lives on the control thread. Each tick samples the clock,
//! then pops every event whose time has come and whose audio-iteration gate
//! has been passed, stopping at the first event that is not ready. Node
//! events run the node's callback and resubmit the node for its next firing.
//!
//! Callbacks get the whole context `C` by `&mut`, so they can edit nodes,
//! schedule more events or issue commands to the audio graph.

use std::sync::Arc;

use conduit_core::SharedState;

use crate::error::Result;
use crate::node::{Forest, Node, NodeCallback, NodeId};
use crate::queue::EventQueue;

/// One-shot callback run by a plain event.
pub type EventCallback<C> = Box<dyn FnOnce(&mut C) + Send>;

/// What a queued event does when it fires.
pub enum Action<C> {
    /// Fire a scheduling node and resubmit it.
    FireNode(NodeId),
    /// Run a one-shot callback.
    Call(EventCallback<C>),
}

impl<C> Action<C> {
    fn node(&self) -> Option<NodeId> {
        match self {
            Self::FireNode(id) => Some(*id),
            Self::Call(_) => None,
        }
    }
}

/// Gives the scheduler access to itself through the callback context.
pub trait Context: Sized {
    /// The scheduler driving this context.
    fn scheduler(&mut self) -> &mut Scheduler<Self>;
}

/// Hierarchical event scheduler.
pub struct Scheduler<C> {
    forest: Forest<C>,
    queue: EventQueue<Action<C>>,
    shared: Arc<SharedState>,
    now: u64,
}

impl<C> Scheduler<C> {
    /// Creates a scheduler reading the audio iteration from `shared`.
    pub fn new(shared: Arc<SharedState>) -> Self {
        Self {
            forest: Forest::new(),
            queue: EventQueue::new(),
            shared,
            now: 0,
        }
    }

    /// Time of the current or most recent tick.
    pub fn now_ms(&self) -> u64 {
        self.now
    }

    /// Audio passes completed so far.
    pub fn audio_iteration(&self) -> u64 {
        self.shared.audio_iteration()
    }

    /// Node storage.
    pub fn forest(&self) -> &Forest<C> {
        &self.forest
    }

    /// Borrows a node.
    pub fn node(&self, id: NodeId) -> Result<&Node<C>> {
        self.forest.get(id)
    }

    /// Mutably borrows a node, for its setters.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node<C>> {
        self.forest.get_mut(id)
    }

    /// Adds a root node that first fires on the next tick.
    pub fn add_node(&mut self, callback: NodeCallback<C>) -> NodeId {
        let id = self.forest.insert(callback);
        self.submit_node(id, self.now);
        tracing::debug!("sched_add: {id}");
        id
    }

    /// Removes a node and its pending firing. Its children become roots.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        self.forest.remove(id)?;
        self.queue.retain(|a| a.node() != Some(id));
        tracing::debug!("sched_remove: {id}");
        Ok(())
    }

    /// Makes `child` follow `parent`.
    pub fn follow(&mut self, child: NodeId, parent: NodeId) -> Result<()> {
        self.forest.follow(child, parent)?;
        tracing::debug!("sched_follow: {child} → {parent}");
        Ok(())
    }

    /// Detaches `child` from its parent.
    pub fn unfollow(&mut self, child: NodeId) -> Result<()> {
        self.forest.unfollow(child)
    }

    /// Re-arms a node that stopped at its count limit. Fires on the next tick.
    ///
    /// No-op if the node already has a firing queued.
    pub fn restart(&mut self, id: NodeId) -> Result<()> {
        if !self.forest.get(id)?.scheduled {
            self.submit_node(id, self.now);
        }
        Ok(())
    }

    /// Schedules `callback` to run `delay_ms` from now, once at least
    /// `after_blocks` further audio passes have completed.
    pub fn schedule(
        &mut self,
        delay_ms: u64,
        after_blocks: u64,
        callback: impl FnOnce(&mut C) + Send + 'static,
    ) {
        let min_iteration = self.shared.audio_iteration() + after_blocks;
        self.queue.schedule(
            self.now.saturating_add(delay_ms),
            min_iteration,
            Action::Call(Box::new(callback)),
        );
    }

    /// Schedules an action at an absolute time and iteration.
    pub fn schedule_at(&mut self, fire_at: u64, min_iteration: u64, action: Action<C>) {
        self.queue.schedule(fire_at, min_iteration, action);
    }

    /// Number of queued events.
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Time of the earliest queued event.
    pub fn next_event_at(&self) -> Option<u64> {
        self.queue.next_fire_at()
    }

    fn submit_node(&mut self, id: NodeId, fire_at: u64) {
        if let Ok(node) = self.forest.get_mut(id) {
            node.scheduled = true;
            let min_iteration = self.shared.audio_iteration();
            self.queue
                .schedule(fire_at, min_iteration, Action::FireNode(id));
        }
    }
}

impl<C: Context> Scheduler<C> {
    /// Runs one tick at time `now_ms`. Returns the number of events fired.
    pub fn tick(ctx: &mut C, now_ms: u64) -> usize {
        ctx.scheduler().now = now_ms;
        let mut fired = 0;
        loop {
            let sched = ctx.scheduler();
            let iteration = sched.shared.audio_iteration();
            let Some(event) = sched.queue.pop_due(now_ms, iteration) else {
                break;
            };
            fired += 1;
            match event.action {
                Action::Call(callback) => callback(ctx),
                Action::FireNode(id) => Self::fire_node(ctx, id, now_ms),
            }
        }
        fired
    }

    fn fire_node(ctx: &mut C, id: NodeId, now: u64) {
        let sched = ctx.scheduler();
        let Ok(node) = sched.forest.get_mut(id) else {
            return;
        };
        node.scheduled = false;
        let count = node.count;
        let mut callback = node.callback.take();

        if let Some(cb) = callback.as_mut() {
            cb(ctx, id, count);
        }

        let sched = ctx.scheduler();
        // The callback may have removed its own node.
        let Ok(node) = sched.forest.get_mut(id) else {
            return;
        };
        if node.callback.is_none() {
            node.callback = callback;
        }
        node.count += 1;
        // The callback may have re-armed the node itself.
        let rearmed = node.scheduled;
        if sched.forest.at_count_limit(id) {
            tracing::debug!("sched_stop: {id} reached count limit");
            return;
        }
        if rearmed {
            return;
        }
        if let Ok(next) = sched.forest.advance(id, now) {
            sched.submit_node(id, next);
        }
    }
}
