pub mod alert;
pub mod channel;
pub mod device;
pub mod mapping;
pub mod telemetry;
pub mod topics;

pub use alert::*;
pub use channel::*;
pub use device::*;
pub use mapping::*;
pub use telemetry::*;
