//! Derive macros for sqlbind
//!
//! Provides `#[derive(Record)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod record;

/// Derive `Record` and `BindSource` for a struct with named fields.
///
/// # Example
///
/// ```ignore
/// use sqlbind::Record;
///
/// #[derive(Record)]
/// struct Person {
///     #[db("first_name")]
///     first: String,
///     email: String,
///     #[db(flatten)]
///     audit: Audit,
///     #[db(nested, "addr")]
///     address: Address,
///     #[db("-")]
///     scratch: Vec<u8>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[db("name")]` / `#[db("name,opt1,opt2")]` - Bind the field under `name`
/// - `#[db("-")]` - Never bind the field
/// - `#[db(flatten)]` - Promote the fields of an embedded `Record` into this one
/// - `#[db(nested)]` - Expose an embedded `Record`'s fields as `field.child`
///
/// Untagged fields are named by the active name normalizer (lowercase by default). Scalar
/// fields must implement `sqlbind::ToValue`; flattened and nested ones `sqlbind::Record`.
#[proc_macro_derive(Record, attributes(db))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
