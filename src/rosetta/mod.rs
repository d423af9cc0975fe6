pub mod error;
pub mod types;

pub use error::ErrorKind;
pub use error::RosettaError;
pub use error::RosettaResult;
