//! Payment step of the instant-approval path.
//!
//! The gateway is simulated locally. [`PaymentProcessor`] is the seam where a
//! real gateway plugs in; the [`PaymentSimulator`] state machine stays the same.

pub mod model;
pub mod processor;
pub mod simulator;

pub use model::{CardDetails, PaymentInfo, PaymentKind, PaymentMethod, PaymentReceipt, PaymentStatus};
pub use processor::{PaymentProcessor, SimulatedProcessor};
pub use simulator::{PaymentPhase, PaymentSimulator};
