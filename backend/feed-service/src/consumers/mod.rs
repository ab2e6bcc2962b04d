pub mod interaction_consumer;
