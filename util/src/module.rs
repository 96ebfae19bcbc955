//! Module interfaces
//!
//! Every processing module driven by an executable in this workspace implements [`State`], so
//! that the executable can initialise it from a parameter file and then step it once per input.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// MODULE STATE
// ---------------------------------------------------------------------------

/// The module's internal state.
pub trait State {
    /// Data required during initialisation, usually the name of a parameter file.
    type InitData;
    /// An error which can occur during initialisation.
    type InitError;

    /// A single input to be processed.
    type InputData;
    /// Data produced by processing one input.
    type OutputData;
    /// A report on the status of the module after processing.
    type StatusReport;
    /// An error which can occur during processing.
    type ProcError;

    /// Initialise the module.
    ///
    /// Calling `init` on an already initialised module resets it.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>;

    /// Process one input.
    ///
    /// # Outputs
    /// - On success a tuple of the output data and status report.
    /// - On error a `ProcError` instance, after which the module remains usable.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}
