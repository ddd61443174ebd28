//! In-process cluster harness: `fnum` [`GrapeInstance`]s sharing one
//! [`LocalComm`] group and one [`MemoryStore`], fanned out over scoped
//! threads.
//!
//! [`Cluster::dispatch`] is the coordinator-facing entry point: it blocks
//! until every worker has executed the command, then combines the workers'
//! individual [`CommandResult`]s with the [`AggregationPolicy`] the command
//! itself carries. Any single worker's error fails the whole command;
//! partial success is never reported.

use crate::command::Command;
use crate::comm::{Communicator, LocalComm};
use crate::config::EngineConfig;
use crate::dispatcher::{AggregationPolicy, CommandPayload, CommandResult, GrapeInstance};
use crate::error::EngineError;
use crate::store::{MemoryStore, ObjectStore};
use std::sync::Arc;

/// A fixed-size worker group, each bound to its own fragment id.
pub struct Cluster {
    instances: Vec<GrapeInstance>,
}

impl Cluster {
    /// Build a cluster of `fnum` workers, every one sharing the same
    /// in-process communicator group and object store.
    #[must_use]
    pub fn new(fnum: u32, config: EngineConfig) -> Self {
        let comms = LocalComm::new_group(fnum as usize);
        let store: Arc<dyn ObjectStore> = MemoryStore::new();
        let instances = comms
            .into_iter()
            .enumerate()
            .map(|(fid, comm)| {
                let comm: Arc<dyn Communicator> = Arc::new(comm);
                GrapeInstance::new(fid as u32, fnum, comm, Arc::clone(&store), config.clone())
            })
            .collect();
        Self { instances }
    }

    #[must_use]
    pub fn fnum(&self) -> u32 {
        self.instances.len() as u32
    }

    /// The worker bound to a given fragment id, for inspecting its local
    /// state from tests.
    #[must_use]
    pub fn instance(&self, fid: u32) -> &GrapeInstance {
        &self.instances[fid as usize]
    }

    /// Run `cmd` on every worker and combine the results. Fails with the
    /// first worker's error (in fragment-id order) if any worker fails.
    pub fn dispatch(&self, cmd: &Command) -> Result<CommandResult, EngineError> {
        let results: Vec<Result<CommandResult, EngineError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .instances
                .iter()
                .map(|instance| scope.spawn(move || instance.on_receive(cmd)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("worker thread panicked"))
                .collect()
        });

        let mut per_worker = Vec::with_capacity(results.len());
        for result in results {
            per_worker.push(result?);
        }
        Ok(Self::aggregate(per_worker))
    }

    fn aggregate(per_worker: Vec<CommandResult>) -> CommandResult {
        let aggregation = per_worker
            .first()
            .map(|r| r.aggregation)
            .unwrap_or(AggregationPolicy::PickFirst);

        let payload = match aggregation {
            AggregationPolicy::PickFirst => per_worker
                .into_iter()
                .next()
                .map(|r| r.payload)
                .unwrap_or(CommandPayload::None),
            AggregationPolicy::PickFirstNonEmpty => per_worker
                .into_iter()
                .find(|r| !matches!(r.payload, CommandPayload::Archive(None)))
                .map(|r| r.payload)
                .unwrap_or(CommandPayload::Archive(None)),
            AggregationPolicy::Concatenate => {
                let entries: Vec<serde_json::Value> = per_worker
                    .into_iter()
                    .map(|r| match r.payload {
                        CommandPayload::Data(json) => {
                            serde_json::from_str(&json).unwrap_or(serde_json::Value::String(json))
                        }
                        other => serde_json::Value::String(format!("{other:?}")),
                    })
                    .collect();
                CommandPayload::Data(serde_json::Value::Array(entries).to_string())
            }
        };

        CommandResult { payload, aggregation }
    }
}
