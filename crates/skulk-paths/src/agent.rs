//! Per-agent navigation state machine.
//!
//! A [`NavAgent`] turns goals and frame ticks into movement commands. All
//! transitions live in [`NavAgent::handle`].

use std::sync::Arc;

use log::debug;
use skulk_core::{Capabilities, Point};

use crate::engine::{Navigator, PathOutcome};
use crate::path::Path;
use crate::pool::{PathHandle, PathWorkers, SubmitError};

/// Where path requests go.
#[derive(Clone)]
pub enum Router {
    /// Answer on the calling thread.
    Inline(Arc<Navigator>),
    /// Queue on the worker pool, falling back to inline when it is shut down.
    Pooled(Arc<PathWorkers>),
}

impl Router {
    fn navigator(&self) -> &Arc<Navigator> {
        match self {
            Router::Inline(nav) => nav,
            Router::Pooled(pool) => pool.navigator(),
        }
    }
}

#[derive(Debug)]
pub enum NavState {
    /// No goal.
    Idle,
    /// A goal is set and a path must be requested on the next tick.
    Queued,
    /// Waiting for the worker pool.
    Awaiting(PathHandle),
    /// Walking `path`; `next` indexes the next cell to enter.
    Following { path: Path, next: usize },
    Arrived,
    /// The last search found no path. Retried when the level changes.
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavEvent {
    SetGoal(Point),
    /// One frame elapsed.
    Tick,
    /// The last `MoveTo` could not be carried out.
    Blocked,
    /// The level version changed.
    LevelChanged,
    Despawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavCommand {
    Wait,
    MoveTo(Point),
    Stop,
    /// No route exists for this agent.
    GiveUp,
}

/// Movement planner for one agent.
pub struct NavAgent {
    pos: Point,
    caps: Capabilities,
    goal: Option<Point>,
    state: NavState,
    router: Router,
}

impl NavAgent {
    pub fn new(pos: Point, caps: Capabilities, router: Router) -> Self {
        Self {
            pos,
            caps,
            goal: None,
            state: NavState::Idle,
            router,
        }
    }

    pub fn pos(&self) -> Point {
        self.pos
    }

    pub fn goal(&self) -> Option<Point> {
        self.goal
    }

    pub fn caps(&self) -> Capabilities {
        self.caps
    }

    pub fn state(&self) -> &NavState {
        &self.state
    }

    /// Apply one event and return what the agent should do this frame.
    ///
    /// A `MoveTo` is assumed to succeed unless the next event is
    /// [`NavEvent::Blocked`].
    pub fn handle(&mut self, event: NavEvent) -> NavCommand {
        let state = std::mem::replace(&mut self.state, NavState::Idle);
        let (next, cmd) = match (state, event) {
            (_, NavEvent::Despawn) => {
                self.goal = None;
                (NavState::Idle, NavCommand::Stop)
            }
            (_, NavEvent::SetGoal(goal)) => {
                self.goal = Some(goal);
                (NavState::Queued, NavCommand::Wait)
            }
            (NavState::Queued, NavEvent::Tick) => self.request(),
            (NavState::Awaiting(mut handle), NavEvent::Tick) => match handle.poll().cloned() {
                None => (NavState::Awaiting(handle), NavCommand::Wait),
                Some(PathOutcome::Found(path)) => self.follow(path, 1),
                Some(PathOutcome::NoPath) => (NavState::Unreachable, NavCommand::GiveUp),
                Some(PathOutcome::Cancelled) => (NavState::Queued, NavCommand::Wait),
            },
            (NavState::Following { path, next }, NavEvent::Tick) => self.follow(path, next),
            (NavState::Following { path, next }, NavEvent::Blocked) => {
                // The move to path[next - 1] failed; stay put and replan.
                if let Some(&prev) = next.checked_sub(2).and_then(|i| path.cells().get(i)) {
                    self.pos = prev;
                }
                (NavState::Queued, NavCommand::Wait)
            }
            (
                NavState::Awaiting(_) | NavState::Following { .. } | NavState::Unreachable,
                NavEvent::LevelChanged,
            ) if self.goal.is_some() => (NavState::Queued, NavCommand::Wait),
            (NavState::Arrived, NavEvent::Tick) => (NavState::Arrived, NavCommand::Stop),
            (NavState::Unreachable, NavEvent::Tick) => (NavState::Unreachable, NavCommand::Wait),
            (state, _) => (state, NavCommand::Wait),
        };
        self.state = next;
        cmd
    }

    fn request(&mut self) -> (NavState, NavCommand) {
        let Some(goal) = self.goal else {
            return (NavState::Idle, NavCommand::Wait);
        };
        match &self.router {
            Router::Pooled(pool) => match pool.submit(self.pos, goal, self.caps) {
                Ok(handle) => return (NavState::Awaiting(handle), NavCommand::Wait),
                Err(SubmitError::Saturated) => return (NavState::Queued, NavCommand::Wait),
                Err(SubmitError::ShutDown) => {
                    debug!("path workers gone, planning inline for agent at {}", self.pos)
                }
            },
            Router::Inline(_) => {}
        }
        let nav = Arc::clone(self.router.navigator());
        match nav.request_path(self.pos, goal, self.caps) {
            Some(path) => self.follow(path, 1),
            None => (NavState::Unreachable, NavCommand::GiveUp),
        }
    }

    fn follow(&mut self, path: Path, next: usize) -> (NavState, NavCommand) {
        match path.cells().get(next) {
            Some(&step) => {
                self.pos = step;
                (
                    NavState::Following {
                        path,
                        next: next + 1,
                    },
                    NavCommand::MoveTo(step),
                )
            }
            None => (NavState::Arrived, NavCommand::Stop),
        }
    }
}
