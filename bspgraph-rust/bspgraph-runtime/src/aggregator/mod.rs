pub mod accumulator;

use bspgraph_api::aggregator::{AggregateValue, Aggregator};
use bspgraph_common::error::{BspError, BspResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Named aggregators of one graph instance.
#[derive(Default, Clone)]
pub struct AggregatorRegistry {
    aggregators: HashMap<String, Arc<dyn Aggregator>>,
}

impl AggregatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        aggregator: Arc<dyn Aggregator>,
    ) -> BspResult<()> {
        let name = name.into();
        if self.aggregators.contains_key(&name) {
            return Err(BspError::InvalidArgument(format!(
                "aggregator {name} already registered"
            )));
        }
        self.aggregators.insert(name, aggregator);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Aggregator>> {
        self.aggregators.get(name)
    }

    pub fn require(&self, name: &str) -> BspResult<&Arc<dyn Aggregator>> {
        self.get(name)
            .ok_or_else(|| BspError::UnknownAggregator(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Aggregator>)> {
        self.aggregators.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.aggregators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregators.is_empty()
    }

    /// Merged values keyed by aggregator name.
    pub fn values(&self) -> HashMap<String, AggregateValue> {
        self.aggregators
            .iter()
            .map(|(k, v)| (k.clone(), v.get()))
            .collect()
    }

    pub fn reset_deltas(&self) {
        for aggregator in self.aggregators.values() {
            aggregator.reset_delta();
        }
    }

    /// Folds `(aggregator, value)` contributions in iteration order and hands
    /// one partial per aggregator to its delta. Float sums are only
    /// reproducible if the caller fixes that order.
    pub fn absorb<I>(&self, contributions: I) -> BspResult<()>
    where
        I: IntoIterator<Item = (String, AggregateValue)>,
    {
        let mut folded: HashMap<String, AggregateValue> = HashMap::new();
        for (name, value) in contributions {
            let aggregator = self.require(&name)?;
            let acc = folded.remove(&name).unwrap_or_default();
            folded.insert(name, aggregator.combine(acc, value)?);
        }
        for (name, partial) in folded {
            self.require(&name)?.aggregate(partial)?;
        }
        Ok(())
    }

    pub fn merge_all(&self) -> BspResult<()> {
        for aggregator in self.aggregators.values() {
            aggregator.merge()?;
        }
        Ok(())
    }

    /// True when no aggregator received a non-zero contribution since the
    /// last delta reset.
    pub fn deltas_are_zero(&self) -> bool {
        self.aggregators.values().all(|a| a.delta().is_zero())
    }

    pub fn clear(&mut self) {
        self.aggregators.clear();
    }
}
