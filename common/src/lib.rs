pub mod float_ext;
pub mod log_setup;
pub mod shared_fn;

pub use shared_fn::SharedFn;

/// Default tolerance for approximate float comparisons.
pub const EPSILON: f64 = 1e-9;
