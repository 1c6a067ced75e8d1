//! Transition module - pure lifecycle rules
//!
//! A [`Transition`] is the synchronous sibling of a reducer: given the current state, a
//! command and the injected environment it either produces the next state or rejects the
//! command. It never mutates its input, so a rejected command leaves state untouched by
//! construction.

/// The Transition trait - core abstraction for lifecycle rules
///
/// # Type Parameters
///
/// - `State`: The state this machine moves between
/// - `Command`: The inputs that request a state change
/// - `Environment`: Read-only facts the rules depend on (time, schedules)
/// - `Error`: Why a command was rejected
///
/// # Example
///
/// ```ignore
/// impl Transition for DoorMachine {
///     type State = DoorState;
///     type Command = DoorCommand;
///     type Environment = ();
///     type Error = DoorError;
///
///     fn transition(
///         &self,
///         state: &DoorState,
///         command: DoorCommand,
///         _env: &(),
///     ) -> Result<DoorState, DoorError> {
///         match (state, command) {
///             (DoorState::Closed, DoorCommand::Open) => Ok(DoorState::Open),
///             (DoorState::Open, DoorCommand::Close) => Ok(DoorState::Closed),
///             (from, command) => Err(DoorError::Illegal { from: *from, command }),
///         }
///     }
/// }
/// ```
pub trait Transition {
    /// The state type this machine operates on
    type State;

    /// The command type this machine processes
    type Command;

    /// The environment type with injected facts
    type Environment;

    /// The rejection type
    type Error;

    /// Compute the state that follows `state` when `command` is applied.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` when the command is not allowed from `state` under `env`.
    fn transition(
        &self,
        state: &Self::State,
        command: Self::Command,
        env: &Self::Environment,
    ) -> Result<Self::State, Self::Error>;
}
