pub mod aggregate;
pub mod boundaries;
pub mod dedup;
pub mod etl;
pub mod maps;
pub mod pipeline;
pub mod site;
pub mod viewer;

pub use crate::domain::model::{Dataset, DogRecord, TransformResult};
pub use crate::domain::ports::{Pipeline, Storage};
pub use crate::utils::error::Result;
