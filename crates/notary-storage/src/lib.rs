pub mod sled_pool;

pub use sled_pool::SledPool;
