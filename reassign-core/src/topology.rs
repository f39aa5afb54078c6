//! Read-only (save for `set_max_parallelism`) view of the new execution's
//! job graph.

use std::collections::BTreeMap;
use std::fmt;

use reassign_model::OperatorId;

/// Opaque identifier for a `JobVertex` (a chain of fused operators) in the
/// new topology.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobVertexId(u128);

impl JobVertexId {
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for JobVertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobVertexId({:032x})", self.0)
    }
}

impl fmt::Display for JobVertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// One position in a vertex's operator chain: the primary id plus an
/// optional alternate id used to match state written under a previous job
/// version whose operator ids changed.
///
/// The chain's head — the operator that carries keyed state — is the last
/// entry, matching the source-side fusion convention.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ChainPosition {
    pub primary_id: OperatorId,
    pub alt_id: Option<OperatorId>,
}

impl ChainPosition {
    pub const fn new(primary_id: OperatorId) -> Self {
        Self {
            primary_id,
            alt_id: None,
        }
    }

    pub const fn with_alt(primary_id: OperatorId, alt_id: OperatorId) -> Self {
        Self {
            primary_id,
            alt_id: Some(alt_id),
        }
    }

    /// The key used to look this position up in `OperatorStates`: the alt
    /// id if present, otherwise the primary id.
    pub const fn lookup_key(&self) -> OperatorId {
        match self.alt_id {
            Some(alt) => alt,
            None => self.primary_id,
        }
    }
}

/// Read-only view of the new execution's job graph, as needed by
/// reassignment. Implementations may be backed by the live dataflow graph;
/// the only mutation the core performs is [`TopologyAdapter::set_max_parallelism`],
/// and only before any scheduler has observed the vertex.
pub trait TopologyAdapter {
    /// Every vertex in the new topology, in a stable order (ascending by
    /// id is sufficient; the driver does not depend on any particular
    /// order across vertices).
    fn vertex_ids(&self) -> Vec<JobVertexId>;

    /// The ordered chain of operators fused into `vertex`. The last entry
    /// is the chain head.
    fn chain(&self, vertex: JobVertexId) -> &[ChainPosition];

    fn parallelism(&self, vertex: JobVertexId) -> u32;

    fn max_parallelism(&self, vertex: JobVertexId) -> u32;

    /// Whether `max_parallelism` was fixed by the user at submission time,
    /// as opposed to derived automatically from `parallelism`.
    fn is_max_parallelism_configured(&self, vertex: JobVertexId) -> bool;

    /// Overrides `vertex`'s max-parallelism. Only ever called by the
    /// preconditions checker when the new value was *not* user-fixed.
    fn set_max_parallelism(&mut self, vertex: JobVertexId, value: u32);
}

/// An in-memory [`TopologyAdapter`], useful for embedding coordinators that
/// already materialize the job graph as plain data, and for tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryTopology {
    vertices: BTreeMap<JobVertexId, VertexInfo>,
}

#[derive(Clone, Debug)]
struct VertexInfo {
    chain: Vec<ChainPosition>,
    parallelism: u32,
    max_parallelism: u32,
    max_parallelism_configured: bool,
}

impl InMemoryTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(
        &mut self,
        vertex: JobVertexId,
        chain: Vec<ChainPosition>,
        parallelism: u32,
        max_parallelism: u32,
        max_parallelism_configured: bool,
    ) -> &mut Self {
        self.vertices.insert(
            vertex,
            VertexInfo {
                chain,
                parallelism,
                max_parallelism,
                max_parallelism_configured,
            },
        );
        self
    }
}

impl TopologyAdapter for InMemoryTopology {
    fn vertex_ids(&self) -> Vec<JobVertexId> {
        self.vertices.keys().copied().collect()
    }

    fn chain(&self, vertex: JobVertexId) -> &[ChainPosition] {
        self.vertices
            .get(&vertex)
            .map(|info| info.chain.as_slice())
            .unwrap_or(&[])
    }

    fn parallelism(&self, vertex: JobVertexId) -> u32 {
        self.vertices.get(&vertex).map_or(0, |info| info.parallelism)
    }

    fn max_parallelism(&self, vertex: JobVertexId) -> u32 {
        self.vertices
            .get(&vertex)
            .map_or(0, |info| info.max_parallelism)
    }

    fn is_max_parallelism_configured(&self, vertex: JobVertexId) -> bool {
        self.vertices
            .get(&vertex)
            .is_some_and(|info| info.max_parallelism_configured)
    }

    fn set_max_parallelism(&mut self, vertex: JobVertexId, value: u32) {
        if let Some(info) = self.vertices.get_mut(&vertex) {
            info.max_parallelism = value;
        }
    }
}
