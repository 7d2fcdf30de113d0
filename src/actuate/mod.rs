//! Motor command sinks.
//!
//! The control loop writes exactly one `MotorCommand` per tick through an
//! `ActuationSink`. Sinks available:
//! - Aseba D-Bus network (feature: aseba-dbus)
//! - Logging sink (dry runs)
//! - Recording sink (tests)

#[cfg(feature = "aseba-dbus")]
pub mod aseba;
mod wire;

#[cfg(feature = "aseba-dbus")]
pub use aseba::{AsebaNetwork, BusKind};
pub use wire::to_aseba_word;

use anyhow::Result;

/// Left/right wheel target speeds in Thymio motor units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MotorCommand {
    pub left: i32,
    pub right: i32,
}

impl MotorCommand {
    pub const STOP: MotorCommand = MotorCommand { left: 0, right: 0 };

    pub fn new(left: i32, right: i32) -> Self {
        Self { left, right }
    }

    pub fn is_stop(&self) -> bool {
        *self == Self::STOP
    }
}

/// Destination for motor commands.
pub trait ActuationSink {
    /// Sink identifier.
    fn name(&self) -> &'static str;

    /// Write both wheel targets.
    fn dispatch(&mut self, command: MotorCommand) -> Result<()>;
}

impl<T: ActuationSink + ?Sized> ActuationSink for &mut T {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn dispatch(&mut self, command: MotorCommand) -> Result<()> {
        (**self).dispatch(command)
    }
}

impl<T: ActuationSink + ?Sized> ActuationSink for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn dispatch(&mut self, command: MotorCommand) -> Result<()> {
        (**self).dispatch(command)
    }
}

/// Sink that only logs. Used for `--dry-run`.
#[derive(Debug, Default)]
pub struct LoggingSink {
    dispatched: u64,
}

impl LoggingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }
}

impl ActuationSink for LoggingSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn dispatch(&mut self, command: MotorCommand) -> Result<()> {
        self.dispatched += 1;
        log::info!("motor targets left={} right={}", command.left, command.right);
        Ok(())
    }
}

/// In-memory record of every dispatched command.
#[derive(Debug, Default)]
pub struct RecordingSink {
    commands: Vec<MotorCommand>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[MotorCommand] {
        &self.commands
    }

    pub fn last(&self) -> Option<MotorCommand> {
        self.commands.last().copied()
    }
}

impl ActuationSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn dispatch(&mut self, command: MotorCommand) -> Result<()> {
        self.commands.push(command);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() -> Result<()> {
        let mut sink = RecordingSink::new();
        sink.dispatch(MotorCommand::new(10, 20))?;
        sink.dispatch(MotorCommand::STOP)?;
        assert_eq!(
            sink.commands(),
            &[MotorCommand::new(10, 20), MotorCommand::STOP]
        );
        assert!(sink.last().is_some_and(|cmd| cmd.is_stop()));
        Ok(())
    }

    fn stop_through<A: ActuationSink>(mut sink: A) -> Result<()> {
        sink.dispatch(MotorCommand::STOP)
    }

    #[test]
    fn sink_by_mutable_reference() -> Result<()> {
        let mut sink = LoggingSink::new();
        stop_through(&mut sink)?;
        stop_through(&mut sink)?;
        assert_eq!(sink.dispatched(), 2);
        Ok(())
    }
}
