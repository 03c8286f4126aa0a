pub mod catalog;
pub mod downloader;
pub mod ledger;
pub mod normalizer;
pub mod organizer;
pub mod parser;
pub mod placement;
pub mod retag;
pub mod scanner;
pub mod tagger;
