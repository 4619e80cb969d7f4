pub mod decay;
pub mod domain;
pub mod parser;
pub mod pipelines;
