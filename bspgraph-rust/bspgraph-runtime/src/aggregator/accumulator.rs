use bspgraph_api::aggregator::{AggregateValue, Aggregator};
use bspgraph_common::error::{BspError, BspResult};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// An associative, commutative combination rule.
pub trait AccumulationRule: Send + Sync + 'static {
    fn type_name(&self) -> &'static str;

    /// Folds `value` into `acc`. `Empty` is the identity on both sides.
    fn combine(&self, acc: AggregateValue, value: AggregateValue) -> BspResult<AggregateValue>;
}

fn mismatch(rule: &'static str, expected: &'static str, found: &AggregateValue) -> BspError {
    BspError::AggregateTypeMismatch {
        aggregator: rule.to_string(),
        expected,
        found: found.kind(),
    }
}

macro_rules! numeric_rule {
    ($name:ident, $type_name:literal, $variant:ident, $kind:literal, $fold:expr) => {
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl AccumulationRule for $name {
            fn type_name(&self) -> &'static str {
                $type_name
            }

            fn combine(
                &self,
                acc: AggregateValue,
                value: AggregateValue,
            ) -> BspResult<AggregateValue> {
                match (acc, value) {
                    (acc, AggregateValue::Empty) => match acc {
                        AggregateValue::Empty | AggregateValue::$variant(_) => Ok(acc),
                        other => Err(mismatch($type_name, $kind, &other)),
                    },
                    (AggregateValue::Empty, AggregateValue::$variant(v)) => {
                        Ok(AggregateValue::$variant(v))
                    }
                    (AggregateValue::$variant(a), AggregateValue::$variant(b)) => {
                        Ok(AggregateValue::$variant(($fold)(a, b)))
                    }
                    (AggregateValue::$variant(_), other) | (AggregateValue::Empty, other) => {
                        Err(mismatch($type_name, $kind, &other))
                    }
                    (other, _) => Err(mismatch($type_name, $kind, &other)),
                }
            }
        }
    };
}

numeric_rule!(IntSum, "int_sum", Int, "int", |a: i64, b: i64| a.wrapping_add(b));
numeric_rule!(IntMin, "int_min", Int, "int", |a: i64, b: i64| a.min(b));
numeric_rule!(IntMax, "int_max", Int, "int", |a: i64, b: i64| a.max(b));
numeric_rule!(FloatSum, "float_sum", Float, "float", |a: f64, b: f64| a + b);
numeric_rule!(FloatMin, "float_min", Float, "float", |a: f64, b: f64| a.min(b));
numeric_rule!(FloatMax, "float_max", Float, "float", |a: f64, b: f64| a.max(b));

/// Keeps the `n` highest-scoring keys. Ties are broken by key so the result
/// does not depend on merge order.
#[derive(Debug, Clone, Copy)]
pub struct TopN(pub usize);

impl AccumulationRule for TopN {
    fn type_name(&self) -> &'static str {
        "top_n"
    }

    fn combine(&self, acc: AggregateValue, value: AggregateValue) -> BspResult<AggregateValue> {
        let mut merged = match acc {
            AggregateValue::Empty => Vec::new(),
            AggregateValue::Ranked(v) => v,
            other => return Err(mismatch("top_n", "ranked", &other)),
        };
        match value {
            AggregateValue::Empty => {}
            AggregateValue::Ranked(mut v) => merged.append(&mut v),
            other => return Err(mismatch("top_n", "ranked", &other)),
        }
        merged.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        merged.truncate(self.0);
        Ok(AggregateValue::Ranked(merged))
    }
}

#[derive(Debug, Default)]
struct AccumulatorState {
    value: AggregateValue,
    delta: AggregateValue,
}

/// [`Aggregator`] backed by an [`AccumulationRule`].
pub struct Accumulator<R> {
    rule: R,
    state: Mutex<AccumulatorState>,
}

impl<R: AccumulationRule> Accumulator<R> {
    pub fn new(rule: R) -> Self {
        Self {
            rule,
            state: Mutex::new(AccumulatorState::default()),
        }
    }

    fn lock(&self) -> BspResult<MutexGuard<'_, AccumulatorState>> {
        self.state
            .lock()
            .map_err(|_| BspError::Internal(format!("{} lock poisoned", self.rule.type_name())))
    }

    // Reads and delta resets have no error channel.
    fn lock_lenient(&self) -> MutexGuard<'_, AccumulatorState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(aggregator = self.rule.type_name(), "aggregator lock poisoned");
            PoisonError::into_inner(poisoned)
        })
    }
}

impl Accumulator<IntSum> {
    pub fn int_sum() -> Self {
        Self::new(IntSum)
    }
}

impl Accumulator<FloatSum> {
    pub fn float_sum() -> Self {
        Self::new(FloatSum)
    }
}

impl Accumulator<TopN> {
    pub fn top_n(n: usize) -> Self {
        Self::new(TopN(n))
    }
}

impl<R: AccumulationRule> Aggregator for Accumulator<R> {
    fn type_name(&self) -> &str {
        self.rule.type_name()
    }

    fn set(&self, value: AggregateValue) -> BspResult<()> {
        // Validate against the rule before storing.
        let value = self.rule.combine(AggregateValue::Empty, value)?;
        let mut state = self.lock()?;
        state.value = value;
        state.delta = AggregateValue::Empty;
        Ok(())
    }

    fn get(&self) -> AggregateValue {
        self.lock_lenient().value.clone()
    }

    fn aggregate(&self, value: AggregateValue) -> BspResult<()> {
        let mut state = self.lock()?;
        let delta = std::mem::take(&mut state.delta);
        state.delta = self.rule.combine(delta, value)?;
        Ok(())
    }

    fn delta(&self) -> AggregateValue {
        self.lock_lenient().delta.clone()
    }

    fn combine(&self, acc: AggregateValue, value: AggregateValue) -> BspResult<AggregateValue> {
        self.rule.combine(acc, value)
    }

    fn merge(&self) -> BspResult<()> {
        let mut state = self.lock()?;
        let merged = self.rule.combine(state.value.clone(), state.delta.clone())?;
        state.value = merged;
        Ok(())
    }

    fn reset_delta(&self) {
        self.lock_lenient().delta = AggregateValue::Empty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_sum_merges_delta_into_value() {
        let acc = Accumulator::int_sum();
        acc.set(AggregateValue::Int(10)).unwrap();
        acc.aggregate(AggregateValue::Int(3)).unwrap();
        acc.aggregate(AggregateValue::Int(4)).unwrap();
        assert_eq!(acc.get(), AggregateValue::Int(10));
        assert_eq!(acc.delta(), AggregateValue::Int(7));
        acc.merge().unwrap();
        assert_eq!(acc.get(), AggregateValue::Int(17));
        acc.reset_delta();
        assert!(acc.delta().is_zero());
    }

    #[test]
    fn set_clears_delta() {
        let acc = Accumulator::float_sum();
        acc.aggregate(AggregateValue::Float(2.5)).unwrap();
        acc.set(AggregateValue::Float(1.0)).unwrap();
        assert_eq!(acc.delta(), AggregateValue::Empty);
        assert_eq!(acc.get(), AggregateValue::Float(1.0));
    }

    #[test]
    fn min_and_max_treat_empty_as_identity() {
        let min = Accumulator::new(IntMin);
        min.aggregate(AggregateValue::Int(5)).unwrap();
        min.aggregate(AggregateValue::Int(-2)).unwrap();
        min.merge().unwrap();
        assert_eq!(min.get(), AggregateValue::Int(-2));

        let max = Accumulator::new(FloatMax);
        max.aggregate(AggregateValue::Float(0.5)).unwrap();
        max.aggregate(AggregateValue::Empty).unwrap();
        max.merge().unwrap();
        assert_eq!(max.get(), AggregateValue::Float(0.5));
    }

    #[test]
    fn mismatched_value_is_rejected() {
        let acc = Accumulator::int_sum();
        let err = acc.aggregate(AggregateValue::Float(1.0)).unwrap_err();
        assert!(matches!(err, BspError::AggregateTypeMismatch { .. }));
    }

    #[test]
    fn top_n_is_order_independent() {
        let rule = TopN(2);
        let a = AggregateValue::Ranked(vec![("x".into(), 0.3), ("y".into(), 0.9)]);
        let b = AggregateValue::Ranked(vec![("z".into(), 0.9), ("w".into(), 0.1)]);
        let ab = rule.combine(a.clone(), b.clone()).unwrap();
        let ba = rule.combine(b, a).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(
            ab,
            AggregateValue::Ranked(vec![("y".into(), 0.9), ("z".into(), 0.9)])
        );
    }

    #[test]
    fn poisoned_lock_keeps_delta_visible() {
        let acc = std::sync::Arc::new(Accumulator::float_sum());
        acc.aggregate(AggregateValue::Float(0.25)).unwrap();
        let poisoner = acc.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.state.lock().unwrap();
            panic!("worker died holding the aggregator");
        })
        .join();

        assert!(acc.state.is_poisoned());
        assert_eq!(acc.delta(), AggregateValue::Float(0.25));
        assert!(matches!(acc.merge(), Err(BspError::Internal(_))));
        acc.reset_delta();
        assert_eq!(acc.delta(), AggregateValue::Empty);
    }
}
