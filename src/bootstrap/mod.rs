//! Process bootstrap helpers run once before the server starts.

pub mod logger;
