//! aven_drift - engine-agnostic arcade drift controller (pure types + per-tick pipeline)

pub mod types;
pub mod host;
pub mod tuning;
pub mod intent;
pub mod car_state;
pub mod powertrain;
pub mod drivetrain;
pub mod drift_state;
pub mod orchestrator;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use types::*;
pub use host::{Action, DriftEvent, EngineStatus, HeldActions, NullSink, RawInput, StatusSink, VehicleHost, WheelTransform};
pub use tuning::{DriftDetection, DriftTuning, EngineTuning, TorqueModel, TuningError, TuningPatch};
pub use orchestrator::{TickReport, VehicleOrchestrator};
