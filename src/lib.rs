// Mollify: multilingual text detoxification.
//
// This is the library root. Each module corresponds to a major stage of
// the detoxification pipeline.

pub mod config;
pub mod detox;
pub mod lang;
pub mod models;
pub mod prompts;
pub mod tsv;
