//! Convenient imports for typical `sqlbind` usage.
//!
//! ```ignore
//! use sqlbind::prelude::*;
//! ```

pub use crate::{
    BindError, BindMode, BindResult, BindSource, Db, DbConfig, Executor, PlaceholderStyle, Record,
    Row, ToValue, Transactor, Value, compile_named, expand_slices, rebind,
};

#[cfg(feature = "pool")]
pub use crate::{PoolConfig, create_pool, create_pool_with_config};
