use super::config::RecoveryConfig;
use super::report::{BroadcastFailure, RecoveryReport, VnodeAssignment};
use crate::client::{CommandClient, PushOutcome, VnodePusher};
use crate::cluster::{
    PlacementStrategy, RecoveryMode, RoutingTable, UniformRandomPlacement, detect_lost_vnodes,
};
use crate::connection::pool::ConnectionPool;
use crate::core::{NodeId, RecoverError, Result, VnodeId};
use crate::protocol::command;
use crate::storage::{
    DefaultStorageFactory, ShardUnit, StorageBackend, StorageFactory, open_storage,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, info_span};

/// Receives the user-facing progress lines of a run.
pub type ProgressSink = Arc<dyn Fn(&str) + Send + Sync>;

fn stdout_progress() -> ProgressSink {
    Arc::new(|line: &str| println!("{}", line))
}

/// Drives a recovery run.
///
/// Strictly sequential: one shard unit, one vnode, one target at a time.
/// The first push that is not acknowledged with `STORED` ends the run.
pub struct Recovery {
    config: RecoveryConfig,
    client: CommandClient,
    pusher: VnodePusher,
    placement: Box<dyn PlacementStrategy>,
    storage: Box<dyn StorageFactory>,
    progress: ProgressSink,
}

/// Where one vnode goes.
struct Targets {
    nodes: Vec<NodeId>,
    new_assignment: bool,
}

impl Recovery {
    pub fn new(config: RecoveryConfig, pool: ConnectionPool) -> Result<Self> {
        config.validate().map_err(RecoverError::Usage)?;

        let pusher = VnodePusher::new(pool.clone())
            .push_command(config.push_command.clone())
            .throttle(config.stream_throttle);
        Ok(Self {
            config,
            client: CommandClient::new(pool),
            pusher,
            placement: Box::new(UniformRandomPlacement),
            storage: Box::new(DefaultStorageFactory),
            progress: stdout_progress(),
        })
    }

    /// Replace the policy picking owners of ownerless vnodes
    pub fn placement(mut self, placement: impl PlacementStrategy + 'static) -> Self {
        self.placement = Box::new(placement);
        self
    }

    /// Replace the factory building storage backends
    pub fn storage_factory(mut self, factory: impl StorageFactory + 'static) -> Self {
        self.storage = Box::new(factory);
        self
    }

    /// Redirect progress lines (stdout by default)
    pub fn progress(mut self, sink: ProgressSink) -> Self {
        self.progress = sink;
        self
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Fetches the routing snapshot from the seed node and recovers.
    pub async fn run(&self) -> Result<RecoveryReport> {
        let table = self.client.routing_dump(&self.config.seed).await?;
        info!(
            seed = %self.config.seed,
            nodes = table.nodes.len(),
            vnodes = table.v_idx.len(),
            "fetched routing snapshot"
        );
        self.run_with_table(&table).await
    }

    /// Recovers against an already fetched routing snapshot.
    pub async fn run_with_table(&self, table: &RoutingTable) -> Result<RecoveryReport> {
        table.validate()?;

        let lost = detect_lost_vnodes(table, &self.config.mode, &self.client).await?;
        if let RecoveryMode::Lost { .. } = self.config.mode {
            self.emit(&format!("{} vnodes where data was lost.", lost.len()));
        }

        let mut report = RecoveryReport::new(lost.clone());
        if lost.is_empty() {
            info!("no lost vnodes, nothing to recover");
            return Ok(report);
        }

        let units = ShardUnit::discover(&self.config.storage_root)?;
        let mut assigned: HashMap<VnodeId, NodeId> = HashMap::new();
        for unit in &units {
            self.emit(&format!("{} {}", unit.name, unit.path.display()));

            let mut backend = open_storage(unit, &lost, self.storage.as_ref())?;
            let span = info_span!("recover_unit", unit = %unit.name, format = %backend.format());
            let result = self
                .recover_unit(unit, backend.as_mut(), table, &lost, &mut assigned, &mut report)
                .instrument(span)
                .await;
            let closed = backend.close();
            result?;
            closed?;
            report.units.push(unit.name.clone());
        }

        info!(
            units = report.units.len(),
            assignments = report.assignments.len(),
            broadcast_failures = report.broadcast_failures.len(),
            "recovery finished"
        );
        Ok(report)
    }

    async fn recover_unit(
        &self,
        unit: &ShardUnit,
        backend: &mut dyn StorageBackend,
        table: &RoutingTable,
        lost: &[VnodeId],
        assigned: &mut HashMap<VnodeId, NodeId>,
        report: &mut RecoveryReport,
    ) -> Result<()> {
        for (idx, &vnode) in lost.iter().enumerate() {
            let targets = self.targets(vnode, table, assigned)?;
            if targets.new_assignment {
                self.emit(&format!(
                    "{}/{} {} assign to {:?}",
                    idx,
                    lost.len(),
                    vnode,
                    targets.nodes
                ));
            } else {
                self.emit(&format!(
                    "{}/{} {} was auto assigned at {:?}",
                    idx,
                    lost.len(),
                    vnode,
                    targets.nodes
                ));
            }

            let mut records = 0;
            for node in &targets.nodes {
                let dump = backend.each_vn_dump(vnode)?;
                let outcome = self.pusher.push(&unit.name, vnode, node, dump).await?;
                match outcome {
                    PushOutcome::Stored { records: sent } => records += sent,
                    PushOutcome::Rejected { phase, response } => {
                        error!(vnode, node = %node, %phase, response = %response, "push of vnode stream aborted");
                        return Err(RecoverError::PushRejected {
                            vnode,
                            node: node.clone(),
                            phase,
                            response,
                        });
                    }
                }
            }

            if targets.new_assignment {
                let target = &targets.nodes[0];
                self.publish_route(vnode, target, table, report).await?;
                assigned.insert(vnode, target.clone());
            }

            report.assignments.push(VnodeAssignment {
                unit: unit.name.clone(),
                vnode,
                nodes: targets.nodes,
                new_assignment: targets.new_assignment,
                records,
            });
        }
        Ok(())
    }

    /// Owners to push `vnode` to.
    ///
    /// A vnode placed earlier in this run keeps its node for later units so
    /// all of its data lands in one place.
    fn targets(
        &self,
        vnode: VnodeId,
        table: &RoutingTable,
        assigned: &HashMap<VnodeId, NodeId>,
    ) -> Result<Targets> {
        if let Some(node) = assigned.get(&vnode) {
            return Ok(Targets {
                nodes: vec![node.clone()],
                new_assignment: false,
            });
        }

        let owners = table.owners(vnode);
        if !owners.is_empty() {
            return Ok(Targets {
                nodes: owners.to_vec(),
                new_assignment: false,
            });
        }

        let node = self.placement.place(vnode, &table.nodes).ok_or_else(|| {
            RecoverError::Routing(format!("no node available to take vnode {}", vnode))
        })?;
        Ok(Targets {
            nodes: vec![node],
            new_assignment: true,
        })
    }

    /// Tells the new owner, then every other node, that it owns `vnode`.
    ///
    /// Any reply from the new owner counts as accepted; only a failed exchange
    /// aborts. Broadcast failures are reported and the run goes on.
    async fn publish_route(
        &self,
        vnode: VnodeId,
        target: &str,
        table: &RoutingTable,
        report: &mut RecoveryReport,
    ) -> Result<()> {
        let line = command::setroute(vnode, table.clock(vnode), target);
        let reply = self.client.send_cmd(target, &line).await?;
        debug!(vnode, node = target, reply = %reply, "setroute sent to new owner");

        match self
            .client
            .broadcast_cmd(&table.nodes, &line, &[target.to_string()])
            .await
        {
            Ok(replies) => {
                debug!(vnode, peers = replies.len(), "setroute broadcast");
            }
            Err(err) => {
                error!(vnode, error = %err, "setroute broadcast failed");
                report.broadcast_failures.push(BroadcastFailure {
                    vnode,
                    command: line,
                    error: err.to_string(),
                });
            }
        }
        Ok(())
    }

    fn emit(&self, line: &str) {
        (self.progress)(line);
    }
}
