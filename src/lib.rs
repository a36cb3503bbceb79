// Status API
pub mod api;

// Message routing from the bus to the engine and listeners
pub mod bridge;

// Listener registry
pub mod clients;

// Configuration loading
pub mod config;

// Outbound HTTP delivery
pub mod delivery;

// Deduplication and query correlation
pub mod engine;

// Topic classification and payload normalization
pub mod event;

// Device inventory
pub mod inventory;

// MQTT transport
pub mod mqtt;
