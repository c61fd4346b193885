pub mod migrate;
pub mod producer;
