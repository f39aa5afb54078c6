//! Where the driver delivers the final per-subtask assignment.

use reassign_model::{KeyedStateHandle, TaskStateSnapshot};

use crate::topology::JobVertexId;

/// Receives the final restore state for one new subtask attempt.
///
/// The driver calls this once per `(vertex, subtask_index)` pair that has
/// any state at all, in ascending `(vertex_id, subtask_index)` order, after
/// every precondition has passed — a partial call sequence never happens,
/// since the driver computes the full assignment before submitting any of
/// it.
pub trait SchedulerSink<K: KeyedStateHandle> {
    fn set_initial_state(
        &mut self,
        vertex_id: JobVertexId,
        subtask_index: u32,
        snapshot: TaskStateSnapshot<K>,
    );
}

/// A [`SchedulerSink`] that simply records every call, in order. Used by
/// tests and by embedding coordinators that want to inspect the full
/// assignment before acting on it.
#[derive(Debug, Default)]
pub struct RecordingSchedulerSink<K: KeyedStateHandle> {
    pub calls: Vec<(JobVertexId, u32, TaskStateSnapshot<K>)>,
}

impl<K: KeyedStateHandle> RecordingSchedulerSink<K> {
    pub fn new() -> Self {
        Self { calls: Vec::new() }
    }

    pub fn snapshot_for(&self, vertex_id: JobVertexId, subtask_index: u32) -> Option<&TaskStateSnapshot<K>> {
        self.calls
            .iter()
            .find(|(v, s, _)| *v == vertex_id && *s == subtask_index)
            .map(|(_, _, snapshot)| snapshot)
    }
}

impl<K: KeyedStateHandle> SchedulerSink<K> for RecordingSchedulerSink<K> {
    fn set_initial_state(&mut self, vertex_id: JobVertexId, subtask_index: u32, snapshot: TaskStateSnapshot<K>) {
        self.calls.push((vertex_id, subtask_index, snapshot));
    }
}
