//! Broker gateway adapters for binary-option venues.
//!
//! Every venue is reached through the [`BrokerGateway`] trait so the execution
//! engine never sees venue-specific payloads:
//!
//! - [`TokenBrokerGateway`]: REST venue authenticated by an API token; reports
//!   settled result and PnL through its order-status endpoint.
//! - [`DigitalBrokerGateway`]: digital-options API; exposes wallet balances
//!   but no order-status endpoint.
//! - [`HomeBrokerGateway`]: session-token API; reports result and profit
//!   through its status endpoint, no balances.
//! - [`MockBrokerGateway`]: scripted gateway for tests.

pub mod digital;
pub mod error;
pub mod gateway;
pub mod home;
pub mod symbol;
pub mod token;

pub use digital::{DigitalBrokerConfig, DigitalBrokerGateway};
pub use error::{BrokerError, BrokerResult};
pub use gateway::{
    BoxFuture, BrokerGateway, DynBrokerGateway, MockBrokerGateway, OrderReceipt, OrderRequest,
    OrderState, OrderStatusReport,
};
pub use home::{HomeBrokerConfig, HomeBrokerGateway};
pub use symbol::invert_symbol;
pub use token::{TokenBrokerConfig, TokenBrokerGateway};
