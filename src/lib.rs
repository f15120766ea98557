//! Customer-support mention bot: sentiment classifier, reply API and the
//! polling loop that answers mentions through it.

pub mod api;
pub mod bot;
pub mod config;
pub mod corpus;
pub mod generator;
pub mod logging;
pub mod normalize;
pub mod sentiment;
