#![deny(warnings)]

pub mod config;
pub mod corpus;
pub mod decode;
pub mod emotion;
pub mod features;
pub mod pipeline;
