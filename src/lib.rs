// Activity model and composition
pub mod activity;

// The reconciliation loop driving both channels
pub mod bridge;

// Connection states and error taxonomy shared by the IPC clients
pub mod channel;

// Process-argument configuration
pub mod config;

// Cover-art resolution collaborator
pub mod cover;

// mpv JSON IPC client
pub mod player;

// Discord rich-presence IPC client
pub mod presence;

// Presence connect/retry supervision
pub mod supervisor;
