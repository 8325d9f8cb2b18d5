use rand::{
    Rng,
    RngCore,
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SelectionError {
    #[error("cannot select from an empty collection")]
    EmptyInput,
    #[error("item {index} has weight {weight}; weights must be finite and positive")]
    InvalidWeight { index: usize, weight: f64 },
    #[error("total weight of the collection is not finite")]
    NonFiniteTotal,
}

/// Anything that carries a relative selection weight.
pub trait Weighted {
    fn weight(&self) -> f64;
}

impl<T: Weighted + ?Sized> Weighted for &T {
    fn weight(&self) -> f64 {
        (**self).weight()
    }
}

/// A weight paired with a payload the selector never looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedItem<P> {
    pub weight: f64,
    pub payload: P,
}

impl<P> WeightedItem<P> {
    pub fn new(weight: f64, payload: P) -> Self {
        Self { weight, payload }
    }
}

impl<P> Weighted for WeightedItem<P> {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// Source of uniform draws in `[0, 1)`.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

impl<R: RngCore> RandomSource for R {
    fn next_unit(&mut self) -> f64 {
        self.random::<f64>()
    }
}

/// Replays a fixed list of unit values, wrapping around at the end.
///
/// An empty sequence always yields `0.0`.
#[derive(Debug, Clone, Default)]
pub struct FixedSequence {
    values: Vec<f64>,
    cursor: usize,
}

impl FixedSequence {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self {
            values: values.into(),
            cursor: 0,
        }
    }

    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// Number of values handed out so far.
    pub fn draws(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for FixedSequence {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value
    }
}

/// Weighted picker that owns its random source.
#[derive(Debug, Clone)]
pub struct WeightedSelector<R> {
    rng: R,
}

impl<R: RandomSource> WeightedSelector<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn pick<'a, T: Weighted>(
        &mut self,
        items: &'a [T],
    ) -> Result<&'a T, SelectionError> {
        pick(items, &mut self.rng)
    }

    pub fn pick_index<T: Weighted>(&mut self, items: &[T]) -> Result<usize, SelectionError> {
        pick_index(items, &mut self.rng)
    }

    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    pub fn into_inner(self) -> R {
        self.rng
    }
}

/// Pick one item with probability `weight / total`.
///
/// Items are walked in the order given. If rounding leaves nothing selected
/// after the last item, the last item is returned.
pub fn pick<'a, T: Weighted, R: RandomSource + ?Sized>(
    items: &'a [T],
    rng: &mut R,
) -> Result<&'a T, SelectionError> {
    let index = pick_index(items, rng)?;
    Ok(&items[index])
}

pub fn pick_index<T: Weighted, R: RandomSource + ?Sized>(
    items: &[T],
    rng: &mut R,
) -> Result<usize, SelectionError> {
    let total = total_weight(items)?;
    let mut remainder = rng.next_unit() * total;
    for (index, item) in items.iter().enumerate() {
        remainder -= item.weight();
        if remainder <= 0.0 {
            return Ok(index);
        }
    }
    Ok(items.len() - 1)
}

/// Normalized selection probability of every item, in input order.
pub fn probabilities<T: Weighted>(items: &[T]) -> Result<Vec<f64>, SelectionError> {
    let total = total_weight(items)?;
    Ok(items.iter().map(|item| item.weight() / total).collect())
}

fn total_weight<T: Weighted>(items: &[T]) -> Result<f64, SelectionError> {
    if items.is_empty() {
        return Err(SelectionError::EmptyInput);
    }
    let mut total = 0.0;
    for (index, item) in items.iter().enumerate() {
        let weight = item.weight();
        if !weight.is_finite() || weight <= 0.0 {
            return Err(SelectionError::InvalidWeight { index, weight });
        }
        total += weight;
    }
    if !total.is_finite() {
        return Err(SelectionError::NonFiniteTotal);
    }
    Ok(total)
}
