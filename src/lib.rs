pub mod config;
pub mod db;
pub mod filestore;
pub mod index;
pub mod livephoto;
pub mod logging;
pub mod metadata;
pub mod normalize;
pub mod preview;
pub mod scanner;
