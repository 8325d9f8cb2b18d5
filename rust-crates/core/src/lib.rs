pub mod fallback;

pub mod retry;

pub mod selector;

pub use fallback::{
    FallbackError,
    FallbackExecutor,
    FallbackOptions,
    ForceMode,
    OperationResult,
    Source,
};
pub use retry::{
    RetryPolicy,
    Transient,
};
pub use selector::{
    FixedSequence,
    RandomSource,
    SelectionError,
    Weighted,
    WeightedItem,
    WeightedSelector,
};
