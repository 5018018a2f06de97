//! Storage for synthesized edges.
//!
//! - [`store`]: id-keyed, word-packed multimap ([`EdgeStore`]).
//! - [`view`]: index-space adapter ([`EdgeStoreView`]) and the
//!   [`IndexSpace`] translations it is parameterized by.

pub mod store;
pub mod view;

pub use store::EdgeStore;
pub use view::{BackingSpace, EdgeStoreView, IdentitySpace, IndexSpace};
