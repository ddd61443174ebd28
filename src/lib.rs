//! # grape-instance
//!
//! A worker-side instance dispatcher for a distributed graph analytical
//! engine. One [`dispatcher::GrapeInstance`] runs per worker process in a
//! cluster of `fnum` workers; [`cluster::Cluster`] gives an in-process
//! stand-in for that cluster, useful for tests and for exploring the
//! collective dispatch model without a real MPI deployment.
//!
//! ## Core Concepts
//!
//! - [`command::Command`] / [`command::CommandKind`] -- the wire-level
//!   request every worker receives identically.
//! - [`dispatcher::GrapeInstance::on_receive`] -- the single entry point a
//!   worker calls for every command; centralizes validation, local compute,
//!   object-store writes, and collective fencing behind one dispatch.
//! - [`fragment::Fragment`] -- one worker's local shard of a graph: its
//!   inner/mirror vertices, edges, and (for arrow-backed graphs) columnar
//!   property tables.
//! - [`vertex_map::VertexMap`] -- the replicated oid-to-gid translation
//!   table every worker keeps consistent without extra coordination.
//! - [`wrapper::FragmentWrapper`] -- the open hierarchy of graph-type-
//!   specific behavior (copy, project, directed/undirected conversion,
//!   gather-to-archive) a [`fragment::Fragment`] is wrapped in.
//! - [`context::Context`] -- the per-vertex result of running an algorithm,
//!   materializable as a numpy-style archive, a dataframe, or a blob in the
//!   shared object store.
//! - [`comm::Communicator`] / [`store::ObjectStore`] -- the two external
//!   collaborators (an MPI-style communicator and a Vineyard-like shared
//!   object store) a [`dispatcher::GrapeInstance`] is built against, given
//!   concrete in-process implementations here ([`comm::LocalComm`],
//!   [`store::MemoryStore`]) so the collective discipline is exercisable
//!   without either external system.
//!
//! ## Module Overview
//!
//! - [`error`] -- the closed `EngineError`/`ErrorKind` error surface every
//!   operation reports through.
//! - [`ids`] -- process-local id generation for graphs, apps, and contexts.
//! - [`config`] -- the engine's ambient configuration (store socket, RPC
//!   endpoint, metrics, conversion parallelism).
//! - [`command`] / [`params`] -- the wire command shape and typed argument
//!   access over it.
//! - [`registry`] -- per-worker type-erased object storage.
//! - [`graph_def`] -- graph metadata: type, directedness, schema.
//! - [`vertex_map`] -- oid-to-gid translation.
//! - [`fragment`] -- the local graph shard.
//! - [`selector`] -- the `v.id` / `v.property.<name>` / `r` selector grammar.
//! - [`archive`] -- the ndarray/dataframe wire format and shard merging.
//! - [`comm`] -- the collective communicator contract.
//! - [`store`] -- the shared object store contract.
//! - [`context`] -- algorithm result materialization.
//! - [`wrapper`] -- graph-type-specific fragment behavior.
//! - [`utility`] -- graph-type-signature-scoped load/convert/project hooks.
//! - [`algorithm`] -- the dynamically-loaded-algorithm-library contract.
//! - [`dispatcher`] -- the central per-worker command handler.
//! - [`cluster`] -- an in-process multi-worker harness.
//! - [`logging`] -- per-command tracing spans.

pub mod algorithm;
pub mod archive;
pub mod cluster;
pub mod comm;
pub mod command;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod fragment;
pub mod graph_def;
pub mod ids;
pub mod logging;
pub mod params;
pub mod registry;
pub mod selector;
pub mod store;
pub mod utility;
pub mod vertex_map;
pub mod wrapper;

pub use cluster::Cluster;
pub use command::{AttrValue, Command, CommandKind};
pub use config::EngineConfig;
pub use dispatcher::{AggregationPolicy, CommandPayload, CommandResult, GrapeInstance};
pub use error::{EngineError, EngineResult, ErrorKind};
