//! PayPal adapter for the processor port.

mod paypal_client;
mod types;

pub use paypal_client::{PaypalConfig, PaypalProcessorClient};
