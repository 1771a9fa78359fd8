pub mod calendar;
pub mod classifier;
pub mod config;
pub mod eda;
pub mod error;
pub mod eval;
pub mod indicator;
pub mod labeler;
pub mod macro_indicators;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod prices;
pub mod schema;
pub mod sentiment;
pub mod source;
pub mod split;
pub mod store;
pub mod table;
