use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Controller lifecycle: `Idle -> Running -> Stopping -> Stopped`.
///
/// `Stopped` is terminal; a controller is never restarted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => PipelineState::Idle,
            1 => PipelineState::Running,
            2 => PipelineState::Stopping,
            _ => PipelineState::Stopped,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "Idle",
            PipelineState::Running => "Running",
            PipelineState::Stopping => "Stopping",
            PipelineState::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

/// Atomic holder for the controller state, shared with the worker thread
/// and any [`StopHandle`]s.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(state: PipelineState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> PipelineState {
        PipelineState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: PipelineState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves from `from` to `to` if the current state is `from`; otherwise
    /// returns the state actually observed.
    pub(crate) fn transition(
        &self,
        from: PipelineState,
        to: PipelineState,
    ) -> Result<(), PipelineState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(PipelineState::from_u8)
    }
}

/// Cloneable handle for requesting a cooperative stop from any thread.
///
/// The worker notices the request at its next cycle boundary. Joining the
/// worker and releasing resources still happens in
/// [`PipelineController::stop`](crate::pipeline::pipeline_controller::PipelineController::stop).
#[derive(Clone, Debug)]
pub struct StopHandle {
    state: Arc<StateCell>,
}

impl StopHandle {
    pub(crate) fn new(state: Arc<StateCell>) -> Self {
        Self { state }
    }

    /// Returns `true` if this call moved the pipeline from `Running` to
    /// `Stopping`.
    pub fn request_stop(&self) -> bool {
        self.state
            .transition(PipelineState::Running, PipelineState::Stopping)
            .is_ok()
    }

    pub fn state(&self) -> PipelineState {
        self.state.load()
    }

    pub fn is_running(&self) -> bool {
        self.state() == PipelineState::Running
    }
}
