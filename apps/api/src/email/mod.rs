// Cold-email generation: prompt building, completion, response parsing.
// All completion calls go through llm_client.

pub mod generator;
pub mod handlers;
pub mod parser;
pub mod prompts;
