use crate::distributed::protocol::{decode, encode};
use crate::graph::GraphSnapshot;
use bspgraph_common::error::{BspError, BspResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Points at the bincode data file of one partition checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub checkpoint_id: String,
    pub superstep: u64,
    pub partition_id: usize,
    pub vertices: usize,
    pub data_path: String,
}

impl CheckpointMeta {
    pub fn partition_dir(base_dir: impl AsRef<Path>, job_id: &str, partition_id: usize) -> PathBuf {
        base_dir
            .as_ref()
            .join(job_id)
            .join(format!("partition_{partition_id}"))
    }

    pub fn meta_path(
        base_dir: impl AsRef<Path>,
        job_id: &str,
        partition_id: usize,
        checkpoint_id: &str,
    ) -> PathBuf {
        Self::partition_dir(base_dir, job_id, partition_id)
            .join(format!("checkpoint_{checkpoint_id}.json"))
    }

    pub fn latest_path(base_dir: impl AsRef<Path>, job_id: &str, partition_id: usize) -> PathBuf {
        Self::partition_dir(base_dir, job_id, partition_id).join("checkpoint_latest.json")
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> BspResult<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let s = serde_json::to_string_pretty(self)
            .map_err(|e| BspError::Codec(format!("checkpoint meta: {e}")))?;
        std::fs::write(path, s)?;
        Ok(())
    }

    pub fn read_json(path: impl AsRef<Path>) -> BspResult<Self> {
        let s = std::fs::read_to_string(path)?;
        serde_json::from_str(&s).map_err(|e| BspError::Codec(format!("checkpoint meta: {e}")))
    }
}

/// Writes the snapshot and makes it the latest checkpoint of its partition.
/// The data file is written before either metadata file.
pub fn save_checkpoint<VV, EV, M>(
    base_dir: impl AsRef<Path>,
    job_id: &str,
    snapshot: &GraphSnapshot<VV, EV, M>,
) -> BspResult<CheckpointMeta>
where
    VV: Serialize,
    EV: Serialize,
    M: Serialize,
{
    let base_dir = base_dir.as_ref();
    let checkpoint_id = format!("{}", snapshot.superstep);
    let dir = CheckpointMeta::partition_dir(base_dir, job_id, snapshot.partition_id)
        .join(format!("cp_{checkpoint_id}"));
    std::fs::create_dir_all(&dir)?;

    let data_path = dir.join("graph.bin");
    std::fs::write(&data_path, encode(snapshot)?)?;

    let meta = CheckpointMeta {
        checkpoint_id: checkpoint_id.clone(),
        superstep: snapshot.superstep,
        partition_id: snapshot.partition_id,
        vertices: snapshot.vertices.len(),
        data_path: data_path.to_string_lossy().to_string(),
    };
    meta.write_json(CheckpointMeta::meta_path(
        base_dir,
        job_id,
        snapshot.partition_id,
        &checkpoint_id,
    ))?;
    meta.write_json(CheckpointMeta::latest_path(
        base_dir,
        job_id,
        snapshot.partition_id,
    ))?;
    tracing::info!(
        job_id,
        partition = snapshot.partition_id,
        superstep = snapshot.superstep,
        "checkpoint written"
    );
    Ok(meta)
}

pub fn load_checkpoint<VV, EV, M>(meta: &CheckpointMeta) -> BspResult<GraphSnapshot<VV, EV, M>>
where
    VV: DeserializeOwned,
    EV: DeserializeOwned,
    M: DeserializeOwned,
{
    let bytes = std::fs::read(&meta.data_path)?;
    let snapshot: GraphSnapshot<VV, EV, M> = decode(&bytes)?;
    if snapshot.superstep != meta.superstep || snapshot.partition_id != meta.partition_id {
        return Err(BspError::Codec(format!(
            "checkpoint {} does not match its metadata",
            meta.data_path
        )));
    }
    Ok(snapshot)
}

/// Latest checkpoint of a partition, if one was ever written.
pub fn load_latest<VV, EV, M>(
    base_dir: impl AsRef<Path>,
    job_id: &str,
    partition_id: usize,
) -> BspResult<Option<GraphSnapshot<VV, EV, M>>>
where
    VV: DeserializeOwned,
    EV: DeserializeOwned,
    M: DeserializeOwned,
{
    let latest = CheckpointMeta::latest_path(base_dir, job_id, partition_id);
    if !latest.exists() {
        return Ok(None);
    }
    let meta = CheckpointMeta::read_json(&latest)?;
    load_checkpoint(&meta).map(Some)
}
