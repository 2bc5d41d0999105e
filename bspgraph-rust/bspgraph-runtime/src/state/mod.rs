pub mod checkpoint;

pub use checkpoint::{load_checkpoint, load_latest, save_checkpoint, CheckpointMeta};
