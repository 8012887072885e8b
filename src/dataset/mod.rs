//! Data operations over exported conversation files

pub mod fewshot;
pub mod non_retrieval;
pub mod review;
pub mod split;
pub mod standalone_examples;
pub mod stats;
