mod agent;
mod initiator;

pub use agent::ChatAgent;
pub use initiator::IdleInitiator;
