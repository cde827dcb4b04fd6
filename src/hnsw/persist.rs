//! Snapshot persistence. The whole graph is written with bincode and checked
//! for internal consistency when read back.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::info;

use super::{params::HNSWParams, storage::NodeArena, NodeId, HNSW};
use crate::metric::Metric;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a, D> {
    version: u32,
    params: &'a HNSWParams<D>,
    nodes: &'a NodeArena,
    entry_point: Option<NodeId>,
    max_level: usize,
}

#[derive(Deserialize)]
struct Snapshot<D> {
    version: u32,
    params: HNSWParams<D>,
    nodes: NodeArena,
    entry_point: Option<NodeId>,
    max_level: usize,
}

impl<D> HNSW<D>
where
    D: Metric + Serialize + DeserializeOwned,
{
    /// Writes the index to `writer`.
    pub fn save<W: Write>(&self, writer: W) -> Result<()> {
        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            params: &self.params,
            nodes: &self.nodes,
            entry_point: self.entry_point,
            max_level: self.max_level,
        };
        bincode::serialize_into(writer, &snapshot).context("failed to encode HNSW snapshot")?;

        info!(
            nodes = self.len(),
            max_level = self.max_level,
            "saved HNSW snapshot"
        );
        Ok(())
    }

    /// Reads an index written by [`HNSW::save`].
    pub fn load<R: Read>(reader: R) -> Result<Self> {
        let snapshot: Snapshot<D> =
            bincode::deserialize_from(reader).context("failed to decode HNSW snapshot")?;

        ensure!(
            snapshot.version == SNAPSHOT_VERSION,
            "unsupported snapshot version {}",
            snapshot.version
        );
        ensure!(
            snapshot.nodes.dimension() > 0,
            "snapshot has zero dimension"
        );
        snapshot.params.validate()?;
        snapshot
            .nodes
            .check_consistency(|level| snapshot.params.max_connections(level))
            .map_err(anyhow::Error::msg)
            .context("corrupt HNSW snapshot")?;

        let nodes = snapshot.nodes;
        match snapshot.entry_point {
            None if nodes.is_empty() => {}
            Some(entry_point)
                if nodes.get(entry_point).map(|n| n.level()) == Some(snapshot.max_level) => {}
            entry_point => bail!(
                "entry point {entry_point:?} does not match {} nodes at top layer {}",
                nodes.len(),
                snapshot.max_level
            ),
        }
        if let Some((id, _)) = nodes.iter().find(|(_, n)| n.level() > snapshot.max_level) {
            bail!(
                "node {id} sits above the top layer {}",
                snapshot.max_level
            );
        }

        info!(
            nodes = nodes.len(),
            max_level = snapshot.max_level,
            "loaded HNSW snapshot"
        );

        Ok(HNSW {
            rng: StdRng::seed_from_u64(snapshot.params.seed ^ nodes.len() as u64),
            nodes,
            entry_point: snapshot.entry_point,
            max_level: snapshot.max_level,
            params: snapshot.params,
        })
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.save(&mut writer)?;
        writer
            .flush()
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Self::load(BufReader::new(file)).with_context(|| format!("failed to load {}", path.display()))
    }
}
