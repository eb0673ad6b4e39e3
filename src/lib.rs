pub mod api;
pub mod archive;
pub mod cli;
pub mod credentials;
pub mod keypair;
pub mod pipeline;
pub mod progress;
pub mod prompt;
pub mod resolve;
pub mod session;
pub mod undo;
