//! Control-thread loop: sample the clock, run due events, sleep out the tick.

use std::sync::Arc;
use std::time::Duration;

use conduit_core::SharedState;

use crate::clock::Clock;
use crate::scheduler::{Context, Scheduler};

/// Fixed-period driver for a [`Scheduler`].
pub struct TickLoop<K: Clock> {
    clock: K,
    tick_ms: u64,
    shared: Arc<SharedState>,
}

impl<K: Clock> TickLoop<K> {
    /// Creates a loop ticking every `tick_ms` on `clock`, stopping once
    /// `shared` is marked done.
    pub fn new(clock: K, tick_ms: u64, shared: Arc<SharedState>) -> Self {
        Self {
            clock,
            tick_ms: tick_ms.max(1),
            shared,
        }
    }

    /// The loop's clock.
    pub fn clock(&self) -> &K {
        &self.clock
    }

    /// Tick period.
    pub fn tick_ms(&self) -> u64 {
        self.tick_ms
    }

    /// Runs one tick without sleeping. Returns the time left in the tick.
    pub fn step<C: Context>(&self, ctx: &mut C) -> Duration {
        let now = self.clock.now_ms();
        let fired = Scheduler::tick(ctx, now);
        if fired > 0 {
            tracing::trace!("tick at {now} ms fired {fired} events");
        }
        let elapsed = self.clock.now_ms().saturating_sub(now);
        Duration::from_millis(self.tick_ms.saturating_sub(elapsed))
    }

    /// Ticks until shutdown is requested. A tick in progress always finishes.
    pub fn run<C: Context>(&self, ctx: &mut C) {
        tracing::info!("tick loop started ({} ms period)", self.tick_ms);
        while !self.shared.is_done() {
            let remaining = self.step(ctx);
            self.clock.sleep(remaining);
        }
        tracing::info!("tick loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::node::NodeId;

    struct Ctx {
        sched: Scheduler<Ctx>,
        shared: Arc<SharedState>,
        fired_at: Vec<u64>,
    }

    impl Context for Ctx {
        fn scheduler(&mut self) -> &mut Scheduler<Self> {
            &mut self.sched
        }
    }

    #[test]
    fn runs_until_done() {
        let shared = Arc::new(SharedState::new());
        let mut ctx = Ctx {
            sched: Scheduler::new(Arc::clone(&shared)),
            shared: Arc::clone(&shared),
            fired_at: Vec::new(),
        };
        let id = ctx
            .sched
            .add_node(Box::new(|c: &mut Ctx, _: NodeId, count: u64| {
                let now = c.sched.now_ms();
                c.fired_at.push(now);
                if count == 3 {
                    c.shared.request_shutdown();
                }
            }));
        ctx.sched.node_mut(id).unwrap().set_interval(20);

        let tick = TickLoop::new(ManualClock::new(0), 5, Arc::clone(&shared));
        tick.run(&mut ctx);

        assert_eq!(ctx.fired_at, vec![0, 20, 40, 60]);
        assert!(shared.is_done());
    }

    #[test]
    fn step_reports_remaining_time() {
        let shared = Arc::new(SharedState::new());
        let mut ctx = Ctx {
            sched: Scheduler::new(Arc::clone(&shared)),
            shared: Arc::clone(&shared),
            fired_at: Vec::new(),
        };
        let tick = TickLoop::new(ManualClock::new(0), 10, shared);
        assert_eq!(tick.step(&mut ctx), Duration::from_millis(10));
    }
}
