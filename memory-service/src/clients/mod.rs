//! HTTP clients for the external collaborators the core crate only defines
//! contracts for: the embedding/generation model endpoint and the optional
//! NER sidecar.

mod model;
mod ner;

pub use model::HttpEmbeddingProvider;
pub use ner::HttpNerProbe;
