//! Domain records shared by the stores, services and handlers.

pub mod analytics;
pub mod catalog;
pub mod order;
pub mod payment;

pub use analytics::{AnalyticsEvent, AnalyticsEventType};
pub use catalog::{Product, SellerProfile, Shop};
pub use order::{Order, OrderStatus, ShippingAddress};
pub use payment::{CardDetails, PaymentAccount, PaymentIntent, PaymentIntentStatus, PaymentMethod};
