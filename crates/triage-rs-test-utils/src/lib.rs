//! Test helpers shared across triage crates.

pub mod embedding;
pub mod events;
pub mod fixtures;
pub mod model;

pub use embedding::TableEmbedding;
pub use events::RecordingSink;
pub use fixtures::{
    WORKED_EXAMPLE_QUERY, at_cosine_distance, ticket_rows, worked_example_corpus,
    worked_example_embedding,
};
pub use model::{FailingModel, FixedModel, RecordingModel, SlowModel};
