// Interview session pipeline.
// INTRO → QUESTIONING → COMPLETED, driven by clips analyzed through the AI gateway.
// All model calls go through gateway::AiGateway; nothing here talks HTTP to the provider.

pub mod aggregator;
pub mod handlers;
pub mod media;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod store;
