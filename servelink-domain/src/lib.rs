//! Domain rules shared by the ServeLink service and gateway.
//!
//! Nothing in here touches the database or the network; the service crate
//! loads rows, hands them to these types and persists whatever comes back.

pub mod analytics;
pub mod cart;
pub mod menu;
pub mod order_status;
pub mod qr;
pub mod role;

pub use cart::{Cart, CartError, CartLine, Checkout};
pub use menu::MenuFilter;
pub use order_status::{partition_active, OrderQueue, OrderStatus, TransitionError};
pub use role::StaffRole;
