use bspgraph_common::error::BspResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum AggregateValue {
    /// No contribution yet.
    #[default]
    Empty,
    Int(i64),
    Float(f64),
    /// `(key, score)` pairs, highest score first.
    Ranked(Vec<(String, f64)>),
}

impl AggregateValue {
    pub fn kind(&self) -> &'static str {
        match self {
            AggregateValue::Empty => "empty",
            AggregateValue::Int(_) => "int",
            AggregateValue::Float(_) => "float",
            AggregateValue::Ranked(_) => "ranked",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AggregateValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AggregateValue::Float(v) => Some(*v),
            AggregateValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_ranked(&self) -> Option<&[(String, f64)]> {
        match self {
            AggregateValue::Ranked(v) => Some(v),
            _ => None,
        }
    }

    /// True for an empty contribution or a numeric zero.
    pub fn is_zero(&self) -> bool {
        match self {
            AggregateValue::Empty => true,
            AggregateValue::Int(v) => *v == 0,
            AggregateValue::Float(v) => *v == 0.0,
            AggregateValue::Ranked(v) => v.is_empty(),
        }
    }
}

/// A named reduction shared by every worker of a graph.
///
/// Workers fold contributions privately with [`Aggregator::combine`] and hand
/// the partial to [`Aggregator::aggregate`]; the engine calls
/// [`Aggregator::merge`] once per barrier. The combination rule must be
/// associative and commutative.
pub trait Aggregator: Send + Sync {
    fn type_name(&self) -> &str;

    /// Overwrites the merged value and clears the delta.
    fn set(&self, value: AggregateValue) -> BspResult<()>;

    /// Last merged value.
    fn get(&self) -> AggregateValue;

    /// Folds a contribution into the current delta.
    fn aggregate(&self, value: AggregateValue) -> BspResult<()>;

    /// Contribution accumulated since the last delta reset.
    fn delta(&self) -> AggregateValue;

    fn combine(&self, acc: AggregateValue, value: AggregateValue) -> BspResult<AggregateValue>;

    /// Folds the delta into the merged value. The delta stays readable until
    /// the next [`Aggregator::reset_delta`].
    fn merge(&self) -> BspResult<()>;

    fn reset_delta(&self);
}
