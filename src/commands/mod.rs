pub mod builder;
pub mod ledger;
pub mod timeout;
pub mod validator;

pub use builder::CommandBuilder;
pub use ledger::RequestLedger;
pub use validator::{ActionValidator, KNOWN_ACTIONS};
pub use timeout::{Deadline, TimeoutStrategy};
