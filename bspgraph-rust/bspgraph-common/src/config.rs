use crate::error::{BspError, BspResult};
use std::collections::HashMap;
use std::str::FromStr;

pub const WORKERS: &str = "bsp.workers";
pub const MAX_SUPERSTEPS: &str = "bsp.max.supersteps";
pub const PARTITIONS: &str = "bsp.partitions";
pub const PARTITION_ID: &str = "bsp.partition.id";

#[derive(Debug, Clone, Default)]
pub struct Configuration {
    config: HashMap<String, String>,
}

impl Configuration {
    pub fn new() -> Self {
        Self {
            config: HashMap::new(),
        }
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.config.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.put(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.config.get(key)
    }

    pub fn get_string(&self, key: &str, default_value: &str) -> String {
        self.config
            .get(key)
            .cloned()
            .unwrap_or_else(|| default_value.to_string())
    }

    pub fn get_usize(&self, key: &str, default_value: usize) -> BspResult<usize> {
        self.get_parsed(key).map(|v| v.unwrap_or(default_value))
    }

    pub fn get_u64(&self, key: &str, default_value: u64) -> BspResult<u64> {
        self.get_parsed(key).map(|v| v.unwrap_or(default_value))
    }

    pub fn get_f64(&self, key: &str, default_value: f64) -> BspResult<f64> {
        self.get_parsed(key).map(|v| v.unwrap_or(default_value))
    }

    pub fn get_parsed<T>(&self, key: &str) -> BspResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.config
            .get(key)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .map_err(|e| BspError::InvalidArgument(format!("{key}={raw}: {e}")))
            })
            .transpose()
    }

    /// Worker pool size, defaulting to the number of logical CPUs.
    pub fn workers(&self) -> BspResult<usize> {
        let workers = self.get_usize(WORKERS, num_cpus::get())?;
        if workers == 0 {
            return Err(BspError::InvalidArgument(format!("{WORKERS} must be positive")));
        }
        Ok(workers)
    }

    pub fn max_supersteps(&self) -> BspResult<Option<u64>> {
        self.get_parsed(MAX_SUPERSTEPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_parse_and_default() {
        let conf = Configuration::new()
            .with(WORKERS, "3")
            .with(MAX_SUPERSTEPS, "40");
        assert_eq!(conf.workers().unwrap(), 3);
        assert_eq!(conf.max_supersteps().unwrap(), Some(40));
        assert_eq!(conf.get_usize(PARTITIONS, 1).unwrap(), 1);
    }

    #[test]
    fn malformed_value_is_invalid_argument() {
        let conf = Configuration::new().with(WORKERS, "many");
        assert!(matches!(conf.workers(), Err(BspError::InvalidArgument(_))));
        let conf = Configuration::new().with(WORKERS, "0");
        assert!(conf.workers().is_err());
    }
}
