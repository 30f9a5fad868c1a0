//! Static mock matching (§4.2–§4.3): the Mock Store, Mock Matcher, and
//! Mock Handler subsystems.

pub mod handler;
pub mod matcher;
pub mod model;
pub mod store;

pub use handler::{handle, MockOutcome};
pub use model::{MockDefinition, MockRequest, MockResponse};
pub use store::MockStore;
