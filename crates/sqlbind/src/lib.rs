//! # sqlbind
//!
//! Placeholder rewriting and named-parameter binding for SQL strings.
//!
//! ## Features
//!
//! - **Rebind**: rewrite `?` placeholders to `$N`, `:argN` or `@pN` for the target driver
//! - **Named queries**: compile `:name` parameters into positional ones plus an ordered name list
//! - **Binding**: fill names from `#[derive(Record)]` structs, maps or JSON objects
//! - **Batch inserts**: repeat a `VALUES (...)` tuple once per row
//! - **`IN` expansion**: turn a list argument into one placeholder per element
//! - **Migrations**: versioned SQL / templated files, one transaction each
//!
//! Quoted strings, quoted identifiers and comments are never rewritten.
//!
//! ```
//! use sqlbind::{PlaceholderStyle, compile_named, rebind};
//!
//! assert_eq!(
//!     rebind(PlaceholderStyle::Dollar, "SELECT * FROM t WHERE a = ? AND b = '?'"),
//!     "SELECT * FROM t WHERE a = $1 AND b = '?'"
//! );
//!
//! let q = compile_named("UPDATE t SET a = :a WHERE id = :id", PlaceholderStyle::At);
//! assert_eq!(q.sql, "UPDATE t SET a = @p1 WHERE id = @p2");
//! assert_eq!(q.names, ["a", "id"]);
//! ```
//!
//! ## Executing
//!
//! ```ignore
//! use sqlbind::{Db, Record};
//!
//! #[derive(Record)]
//! struct Person {
//!     #[db("first_name")]
//!     first: String,
//!     email: String,
//! }
//!
//! let db = Db::new(sqlbind::create_pool(&database_url)?);
//! db.named_exec(
//!     "INSERT INTO person (first_name, email) VALUES (:first_name, :email)",
//!     &person,
//! )
//! .await?;
//! ```

// Lets `#[derive(Record)]` output (`::sqlbind::...`) resolve inside this crate's own tests.
extern crate self as sqlbind;

pub mod bind;
pub mod client;
pub mod db;
pub mod error;
pub mod lexer;
pub mod mapper;
pub mod migrate;
pub mod named;
pub mod prelude;
pub mod rebind;
pub mod record;
pub mod slices;
pub mod style;
pub mod value;
pub mod values;

pub use bind::{BindMode, BindSource, Leniency};
pub use client::{Executor, Row, Transaction, Transactor};
pub use db::{Db, DbConfig, Tx};
pub use error::{BindError, BindResult};
pub use lexer::{LexerConfig, Token, TokenKind, Tokenizer, tokenize};
pub use mapper::{FieldMap, Mapper, reset_global_mapper, set_name_normalizer};
pub use migrate::{Migration, MigrationReport, Migrator, MigratorConfig};
pub use named::{NamedQuery, bind_named, bind_named_batch, bind_named_with, compile_named, named_in};
pub use rebind::{count_placeholders, rebind};
pub use record::{FieldDesc, FieldKind, FieldValue, Record};
pub use slices::expand_slices;
pub use style::{PlaceholderStyle, StyleRegistry, register_style, style_for};
pub use value::{ToValue, Value};
pub use values::{ValuesExpansion, expand_values};

#[cfg(feature = "postgres")]
pub mod pg;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{PoolConfig, create_pool, create_pool_with_config, create_pool_with_tls};

#[cfg(feature = "derive")]
pub use sqlbind_derive::Record;
