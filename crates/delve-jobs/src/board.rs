//! The job arena: assignments, job groups, and their status machine.
//!
//! Jobs live in a single [`JobBoard`] keyed by [`JobId`]. A job is either
//! a leaf [`Assignment`] executed by exactly one worker or a [`JobGroup`]
//! whose children are handed out stage by stage. Every job moves from
//! [`JobStatus::Ok`] to a terminal status exactly once; the transition
//! queues one [`JobNotification`] for the job's observer (only root jobs
//! have observers) and one entry in the transition log the world
//! broadcasts.

use std::collections::{BTreeMap, VecDeque};

use delve_types::{
    Action, ActionOutcome, Direction, IntVector3, JobId, JobSourceId, JobStatus, ObjectId,
};
use delve_world::{Environment, Pathfinder};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::task::{Task, WorkerView};

/// What a worker should do next for its assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentStep {
    /// Perform this action.
    Act(Action),
    /// The assignment is over.
    Finished(JobStatus),
}

/// A leaf job bound to at most one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    task: Task,
    worker: Option<ObjectId>,
    path: VecDeque<Direction>,
    path_goal: Option<IntVector3>,
    move_failures: u32,
}

impl Assignment {
    /// The work to do.
    pub const fn task(&self) -> &Task {
        &self.task
    }

    /// The worker executing the assignment.
    pub const fn worker(&self) -> Option<ObjectId> {
        self.worker
    }
}

/// A composite job handing out its children one stage at a time.
///
/// Every child of a stage may be worked on in parallel. The next stage
/// unlocks once every child of the current one is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobGroup {
    stages: Vec<Vec<JobId>>,
    stage: usize,
}

impl JobGroup {
    /// Index of the active stage.
    pub const fn stage(&self) -> usize {
        self.stage
    }

    /// Children of the active stage.
    pub fn active(&self) -> &[JobId] {
        self.stages.get(self.stage).map_or(&[], Vec::as_slice)
    }
}

/// Leaf or composite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobKind {
    /// A leaf.
    Assignment(Assignment),
    /// A composite.
    Group(JobGroup),
}

/// A job on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    observer: Option<JobSourceId>,
    parent: Option<JobId>,
    status: JobStatus,
    kind: JobKind,
}

impl Job {
    /// The job's id.
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// The job source notified when the job ends.
    pub const fn observer(&self) -> Option<JobSourceId> {
        self.observer
    }

    /// The group this job belongs to.
    pub const fn parent(&self) -> Option<JobId> {
        self.parent
    }

    /// Current status.
    pub const fn status(&self) -> JobStatus {
        self.status
    }

    /// Leaf or composite data.
    pub const fn kind(&self) -> &JobKind {
        &self.kind
    }

    /// The task, for assignments.
    pub const fn task(&self) -> Option<&Task> {
        match &self.kind {
            JobKind::Assignment(assignment) => Some(&assignment.task),
            JobKind::Group(_) => None,
        }
    }

    /// The worker, for assignments.
    pub const fn worker(&self) -> Option<ObjectId> {
        match &self.kind {
            JobKind::Assignment(assignment) => assignment.worker,
            JobKind::Group(_) => None,
        }
    }
}

/// A terminal transition addressed to a job's observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobNotification {
    /// The observing job source.
    pub observer: JobSourceId,
    /// The job.
    pub job: JobId,
    /// Its terminal status.
    pub status: JobStatus,
}

/// Arena of every live job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobBoard {
    jobs: BTreeMap<JobId, Job>,
    max_move_failures: u32,
    #[serde(skip)]
    notifications: Vec<JobNotification>,
    #[serde(skip)]
    transitions: Vec<(JobId, JobStatus)>,
}

impl JobBoard {
    /// An empty board. Assignments abort after `max_move_failures`
    /// consecutive blocked moves.
    pub const fn new(max_move_failures: u32) -> Self {
        Self {
            jobs: BTreeMap::new(),
            max_move_failures,
            notifications: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Create a root assignment.
    pub fn create_assignment(&mut self, observer: Option<JobSourceId>, task: Task) -> JobId {
        let id = self.insert_assignment(observer, None, task);
        debug!(job = %id, "Assignment created");
        id
    }

    /// Create a root group from stages of tasks.
    pub fn create_group(&mut self, observer: Option<JobSourceId>, stages: Vec<Vec<Task>>) -> JobId {
        let id = JobId::new();
        let stages: Vec<Vec<JobId>> = stages
            .into_iter()
            .map(|stage| {
                stage
                    .into_iter()
                    .map(|task| self.insert_assignment(None, Some(id), task))
                    .collect()
            })
            .collect();
        self.jobs.insert(
            id,
            Job {
                id,
                observer,
                parent: None,
                status: JobStatus::Ok,
                kind: JobKind::Group(JobGroup { stages, stage: 0 }),
            },
        );
        debug!(job = %id, "Job group created");
        id
    }

    fn insert_assignment(
        &mut self,
        observer: Option<JobSourceId>,
        parent: Option<JobId>,
        task: Task,
    ) -> JobId {
        let id = JobId::new();
        self.jobs.insert(
            id,
            Job {
                id,
                observer,
                parent,
                status: JobStatus::Ok,
                kind: JobKind::Assignment(Assignment {
                    task,
                    worker: None,
                    path: VecDeque::new(),
                    path_goal: None,
                    move_failures: 0,
                }),
            },
        );
        id
    }

    /// Look up a job.
    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    /// Status of a job, `None` once it has been purged.
    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.jobs.get(&id).map(Job::status)
    }

    /// Number of jobs on the board, including finished ones not yet purged.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the board is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Every job.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// An unassigned assignment of `root` ready to be worked on: `root`
    /// itself if it is a free leaf, or a free child of a group's active
    /// stage.
    pub fn free_assignment(&self, root: JobId) -> Option<JobId> {
        let job = self.jobs.get(&root)?;
        if job.status != JobStatus::Ok {
            return None;
        }
        match &job.kind {
            JobKind::Assignment(assignment) => assignment.worker.is_none().then_some(root),
            JobKind::Group(group) => group
                .active()
                .iter()
                .find_map(|&child| self.free_assignment(child)),
        }
    }

    /// Bind an assignment to a worker.
    ///
    /// # Panics
    ///
    /// Panics if the job is not a live, unassigned assignment.
    pub fn assign(&mut self, id: JobId, worker: ObjectId) {
        let assignment = match self.jobs.get_mut(&id) {
            Some(Job {
                status: JobStatus::Ok,
                kind: JobKind::Assignment(assignment),
                ..
            }) => Some(assignment),
            _ => None,
        };
        assert!(
            assignment.as_ref().is_some_and(|a| a.worker.is_none()),
            "assignment {id} handed to {worker} while not free"
        );
        if let Some(assignment) = assignment {
            assignment.worker = Some(worker);
            trace!(job = %id, worker = %worker, "Assignment taken");
        }
    }

    /// Release an assignment from its worker without ending it.
    pub fn unassign(&mut self, id: JobId) {
        if let Some(Job {
            status: JobStatus::Ok,
            kind: JobKind::Assignment(assignment),
            ..
        }) = self.jobs.get_mut(&id)
        {
            assignment.worker = None;
            assignment.path.clear();
            assignment.path_goal = None;
            assignment.move_failures = 0;
        }
    }

    /// Decide the worker's next action for assignment `id`.
    ///
    /// Walks one step along a cached path towards the current goal, or
    /// returns the goal's action once the worker is positioned. A vanished
    /// path aborts the assignment; an invalid target ends it as the task
    /// decides.
    pub fn prepare_next_action(
        &mut self,
        id: JobId,
        worker: &WorkerView,
        env: &Environment,
        pathing: &dyn Pathfinder,
    ) -> AssignmentStep {
        let Some(job) = self.jobs.get_mut(&id) else {
            return AssignmentStep::Finished(JobStatus::Abort);
        };
        if job.status != JobStatus::Ok {
            return AssignmentStep::Finished(job.status);
        }
        let JobKind::Assignment(assignment) = &mut job.kind else {
            return AssignmentStep::Finished(JobStatus::Abort);
        };

        let step = match assignment.task.goal(env, worker) {
            Err(status) => Err(status),
            Ok(goal) if goal.positioning.is_satisfied(worker.location, goal.target) => {
                Ok(goal.action)
            }
            Ok(goal) => {
                if assignment.path_goal != Some(goal.target) || assignment.path.is_empty() {
                    assignment.path = pathing
                        .find_path(env, worker.location, goal.target, goal.positioning)
                        .map(VecDeque::from)
                        .unwrap_or_default();
                    assignment.path_goal = Some(goal.target);
                }
                assignment
                    .path
                    .front()
                    .map(|&direction| Action::Move { direction })
                    .ok_or(JobStatus::Abort)
            }
        };

        match step {
            Ok(action) => AssignmentStep::Act(action),
            Err(status) => {
                debug!(job = %id, ?status, "Assignment cannot continue");
                self.finish(id, status);
                AssignmentStep::Finished(status)
            }
        }
    }

    /// Report the outcome of an action performed for assignment `id`.
    /// Returns the assignment's status afterwards.
    pub fn action_done(&mut self, id: JobId, action: &Action, outcome: ActionOutcome) -> JobStatus {
        let max_failures = self.max_move_failures;
        let Some(job) = self.jobs.get_mut(&id) else {
            return JobStatus::Abort;
        };
        if job.status != JobStatus::Ok {
            return job.status;
        }
        let JobKind::Assignment(assignment) = &mut job.kind else {
            return JobStatus::Abort;
        };

        let finished = match (action, outcome) {
            (Action::Move { .. }, ActionOutcome::Success) => {
                assignment.path.pop_front();
                assignment.move_failures = 0;
                None
            }
            (Action::Move { .. }, ActionOutcome::Fail) => {
                assignment.path.clear();
                assignment.move_failures = assignment.move_failures.saturating_add(1);
                (assignment.move_failures >= max_failures).then_some(JobStatus::Abort)
            }
            (_, ActionOutcome::Success) => assignment
                .task
                .completes_with(action)
                .then_some(JobStatus::Done),
            (Action::GetItem { .. } | Action::DropItem { .. }, ActionOutcome::Fail) => {
                Some(JobStatus::Abort)
            }
            (_, ActionOutcome::Fail) => Some(JobStatus::Fail),
        };

        match finished {
            Some(status) => {
                self.finish(id, status);
                status
            }
            None => JobStatus::Ok,
        }
    }

    /// Move a live job to a terminal status, propagating through its group.
    ///
    /// # Panics
    ///
    /// Panics if the job is unknown, already terminal, or `status` is
    /// [`JobStatus::Ok`].
    pub fn finish(&mut self, id: JobId, status: JobStatus) {
        assert!(status.is_terminal(), "job {id} finished with a non-terminal status");
        let job = self.jobs.get_mut(&id);
        assert!(
            job.as_ref().is_some_and(|job| job.status == JobStatus::Ok),
            "job {id} finished twice or does not exist"
        );
        let Some(job) = job else {
            return;
        };
        job.status = status;
        let (observer, parent) = (job.observer, job.parent);
        let children: Vec<JobId> = match &job.kind {
            JobKind::Group(group) => group.stages.iter().flatten().copied().collect(),
            JobKind::Assignment(_) => Vec::new(),
        };
        debug!(job = %id, ?status, "Job finished");

        self.transitions.push((id, status));
        if let Some(observer) = observer {
            self.notifications.push(JobNotification {
                observer,
                job: id,
                status,
            });
        }

        // A finished group takes its unfinished children with it.
        for child in children {
            if self.status(child) == Some(JobStatus::Ok) {
                self.finish(child, JobStatus::Abort);
            }
        }

        if let Some(parent) = parent {
            self.child_finished(parent, status);
        }
    }

    fn child_finished(&mut self, parent: JobId, status: JobStatus) {
        if self.status(parent) != Some(JobStatus::Ok) {
            return;
        }
        if status != JobStatus::Done {
            self.finish(parent, status);
            return;
        }
        let Some(Job {
            kind: JobKind::Group(group),
            ..
        }) = self.jobs.get(&parent)
        else {
            return;
        };
        let stage_done = group
            .active()
            .iter()
            .all(|child| self.jobs.get(child).is_some_and(|j| j.status == JobStatus::Done));
        if !stage_done {
            return;
        }
        let last_stage = group.stage.saturating_add(1) >= group.stages.len();
        if last_stage {
            self.finish(parent, JobStatus::Done);
        } else if let Some(Job {
            kind: JobKind::Group(group),
            ..
        }) = self.jobs.get_mut(&parent)
        {
            group.stage = group.stage.saturating_add(1);
            trace!(job = %parent, stage = group.stage, "Job group advanced");
        }
    }

    /// Abort a live job. Returns `false` if it already ended.
    pub fn abort(&mut self, id: JobId) -> bool {
        if self.status(id) == Some(JobStatus::Ok) {
            self.finish(id, JobStatus::Abort);
            true
        } else {
            false
        }
    }

    /// Take the observer notifications queued since the last call.
    pub fn take_notifications(&mut self) -> Vec<JobNotification> {
        std::mem::take(&mut self.notifications)
    }

    /// Take every terminal transition queued since the last call.
    pub fn take_transitions(&mut self) -> Vec<(JobId, JobStatus)> {
        std::mem::take(&mut self.transitions)
    }

    /// Drop finished jobs that no live group still refers to.
    pub fn purge_finished(&mut self) -> usize {
        let dead: Vec<JobId> = self
            .jobs
            .values()
            .filter(|job| job.status.is_terminal())
            .filter(|job| {
                job.parent
                    .is_none_or(|parent| self.status(parent) != Some(JobStatus::Ok))
            })
            .map(Job::id)
            .collect();
        for id in &dead {
            self.jobs.remove(id);
        }
        dead.len()
    }
}

impl Default for JobBoard {
    fn default() -> Self {
        Self::new(3)
    }
}
