//! Scheduling nodes and the forest that holds them.
//!
//! A root node fires every `interval_ms`, optionally compounding the interval
//! by `interval_factor` on each firing (accelerando / ritardando). A child
//! node derives its timing from its parent's most recent period
//! (`parent.next_ts - parent.last_ts`): divided by `divisor`, multiplied by
//! `multiplier`, or locked to the parent's next firing when both are 1. A
//! signed `offset_ms` shifts every child firing.
//!
//! Ids are arena indices and are never reused, so a stale id simply resolves
//! to nothing.

use core::fmt;

use crate::error::{Result, SchedError};

/// Interval a new node starts with.
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Unique identifier for a scheduling node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Callback run each time a node fires, with the firing count before
/// increment.
pub type NodeCallback<C> = Box<dyn FnMut(&mut C, NodeId, u64) + Send>;

/// A scheduling node.
pub struct Node<C> {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    interval_ms: u64,
    interval_exact: f64,
    interval_factor: f64,
    offset_ms: i64,
    divisor: u32,
    multiplier: u32,
    pub(crate) count: u64,
    count_limit: u64,
    pub(crate) last_ts: u64,
    pub(crate) next_ts: u64,
    /// True while a firing event for this node is queued.
    pub(crate) scheduled: bool,
    /// Taken out while the callback runs.
    pub(crate) callback: Option<NodeCallback<C>>,
}

impl<C> Node<C> {
    fn new(callback: NodeCallback<C>) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            interval_ms: DEFAULT_INTERVAL_MS,
            interval_exact: DEFAULT_INTERVAL_MS as f64,
            interval_factor: 1.0,
            offset_ms: 0,
            divisor: 1,
            multiplier: 1,
            count: 0,
            count_limit: 0,
            last_ts: 0,
            next_ts: 0,
            scheduled: false,
            callback: Some(callback),
        }
    }

    /// Sets the root interval. Resets any compounding done so far.
    pub fn set_interval(&mut self, interval_ms: u64) {
        self.interval_ms = interval_ms;
        self.interval_exact = interval_ms as f64;
    }

    /// Sets the per-firing interval multiplier for root nodes.
    pub fn set_interval_factor(&mut self, factor: f64) {
        self.interval_factor = factor;
    }

    /// Sets the shift applied to child firings.
    pub fn set_offset(&mut self, offset_ms: i64) {
        self.offset_ms = offset_ms;
    }

    /// Sets the parent-period divisor; values below 1 become 1.
    pub fn set_divisor(&mut self, divisor: u32) {
        self.divisor = divisor.max(1);
    }

    /// Sets the parent-period multiplier; values below 1 become 1.
    pub fn set_multiplier(&mut self, multiplier: u32) {
        self.multiplier = multiplier.max(1);
    }

    /// Overwrites the firing count.
    pub fn set_count(&mut self, count: u64) {
        self.count = count;
    }

    /// Sets the firing limit; 0 means unlimited.
    pub fn set_count_limit(&mut self, limit: u64) {
        self.count_limit = limit;
    }

    /// Current root interval.
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Interval factor.
    pub fn interval_factor(&self) -> f64 {
        self.interval_factor
    }

    /// Child offset.
    pub fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    /// Divisor.
    pub fn divisor(&self) -> u32 {
        self.divisor
    }

    /// Multiplier.
    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Times fired.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Firing limit; 0 means unlimited.
    pub fn count_limit(&self) -> u64 {
        self.count_limit
    }

    /// Time of the most recent firing.
    pub fn last_ts(&self) -> u64 {
        self.last_ts
    }

    /// Time of the next firing.
    pub fn next_ts(&self) -> u64 {
        self.next_ts
    }

    /// Parent, if following one.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Followers of this node.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    fn at_own_limit(&self) -> bool {
        self.count_limit > 0 && self.count >= self.count_limit
    }
}

impl<C> fmt::Debug for Node<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("parent", &self.parent)
            .field("interval_ms", &self.interval_ms)
            .field("divisor", &self.divisor)
            .field("multiplier", &self.multiplier)
            .field("count", &self.count)
            .field("next_ts", &self.next_ts)
            .finish_non_exhaustive()
    }
}

/// Arena of scheduling nodes linked into parent/child trees.
pub struct Forest<C> {
    nodes: Vec<Option<Node<C>>>,
}

impl<C> Default for Forest<C> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<C> Forest<C> {
    /// Creates an empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a root node.
    pub fn insert(&mut self, callback: NodeCallback<C>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(Node::new(callback)));
        id
    }

    /// Removes a node. Its children become roots.
    pub fn remove(&mut self, id: NodeId) -> Result<Node<C>> {
        let node = self
            .nodes
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or(SchedError::NodeNotFound(id))?;
        if let Some(parent) = node.parent.and_then(|p| self.get_mut(p).ok()) {
            parent.children.retain(|c| *c != id);
        }
        for &child in &node.children {
            if let Ok(c) = self.get_mut(child) {
                c.parent = None;
            }
        }
        Ok(node)
    }

    /// Borrows a node.
    pub fn get(&self, id: NodeId) -> Result<&Node<C>> {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(SchedError::NodeNotFound(id))
    }

    /// Mutably borrows a node.
    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Node<C>> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(SchedError::NodeNotFound(id))
    }

    /// Returns true if `id` is live.
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_ok()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Returns true if no node is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of live nodes without a parent.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| {
                n.as_ref()
                    .filter(|n| n.parent.is_none())
                    .map(|_| NodeId(i as u32))
            })
            .collect()
    }

    /// Makes `child` follow `parent`, detaching it from any previous parent.
    ///
    /// Takes effect at the child's next firing.
    pub fn follow(&mut self, child: NodeId, parent: NodeId) -> Result<()> {
        self.get(parent)?;
        self.get(child)?;
        if child == parent || self.is_ancestor(child, parent) {
            return Err(SchedError::FollowCycle { child, parent });
        }
        self.unfollow(child)?;
        self.get_mut(child)?.parent = Some(parent);
        self.get_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Detaches `child` from its parent, making it a root. No-op for roots.
    pub fn unfollow(&mut self, child: NodeId) -> Result<()> {
        let Some(parent) = self.get_mut(child)?.parent.take() else {
            return Ok(());
        };
        if let Ok(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        Ok(())
    }

    /// True if `ancestor` is on the parent chain of `id`.
    fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = self.get(id).ok().and_then(|n| n.parent);
        let mut hops = 0;
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            hops += 1;
            if hops > self.nodes.len() {
                break;
            }
            current = self.get(p).ok().and_then(|n| n.parent);
        }
        false
    }

    /// True if `id` or any of its ancestors has reached its count limit.
    pub fn at_count_limit(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        let mut hops = 0;
        while let Some(n) = current.and_then(|c| self.get(c).ok()) {
            if n.at_own_limit() {
                return true;
            }
            hops += 1;
            if hops > self.nodes.len() {
                break;
            }
            current = n.parent;
        }
        false
    }

    /// Computes and records the next firing time of `id`, which fired at
    /// `now`.
    ///
    /// The result is never earlier than `now + 1`, so a node fires at most
    /// once per tick.
    pub fn advance(&mut self, id: NodeId, now: u64) -> Result<u64> {
        let parent_timing = match self.get(id)?.parent {
            Some(p) => self.get(p).ok().map(|p| (p.next_ts, p.last_ts)),
            None => None,
        };
        let node = self.get_mut(id)?;
        let next = match parent_timing {
            Some((parent_next, parent_last)) => {
                let period = parent_next.saturating_sub(parent_last);
                let base = if node.divisor > 1 {
                    now + period / u64::from(node.divisor)
                } else if node.multiplier > 1 {
                    now.saturating_add(period.saturating_mul(u64::from(node.multiplier)))
                } else {
                    parent_next
                };
                base.saturating_add_signed(node.offset_ms)
            }
            None => {
                if node.interval_factor != 1.0 {
                    node.interval_exact *= node.interval_factor;
                    node.interval_ms = node.interval_exact as u64;
                }
                now.saturating_add(node.interval_ms)
            }
        };
        let next = next.max(now + 1);
        node.last_ts = now;
        node.next_ts = next;
        Ok(next)
    }
}
