// Payment gateway abstraction and the mock implementation
pub mod payments;

// Order lifecycle
pub mod orders;

// Seller-facing services
pub mod accounts;
pub mod products;

// Best-effort side effects
pub mod analytics;
pub mod notifications;
