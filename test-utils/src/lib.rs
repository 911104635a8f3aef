//! In-memory [`memory_core::GraphStore`] and deterministic fakes for
//! [`memory_core::EmbeddingProvider`]/[`memory_core::NerProbe`], shared by
//! `memory-core`'s own integration tests and every storage backend's test
//! suite so they don't each reinvent a fixture.

mod fakes;
mod store;

pub use fakes::{FakeEmbeddingProvider, FakeNerProbe};
pub use store::InMemoryStore;
