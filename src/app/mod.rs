// Application layer: the workflows the CLI subcommands and the HTTP server share.

pub mod workflow;

pub use workflow::{ensure_data, export_site, generate_maps, maps_ready, preprocess, run_all};
