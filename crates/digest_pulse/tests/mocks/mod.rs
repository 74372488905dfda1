pub mod datastore;
pub mod summarizer;
pub mod transcript_source;
