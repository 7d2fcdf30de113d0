//! Aseba network over D-Bus.
//!
//! `asebamedulla` exposes connected Thymio nodes as the service
//! `ch.epfl.mobots.Aseba`, object `/`, interface `ch.epfl.mobots.AsebaNetwork`.
//! Only two methods are used:
//! - `GetNodesList() -> as` for startup diagnostics
//! - `SetVariable(s node, s variable, an values)` to write motor targets

use anyhow::{Context, Result};
use zbus::blocking::{Connection, Proxy};

use super::{to_aseba_word, ActuationSink, MotorCommand};
use crate::config::AsebaSettings;

/// Which message bus instance hosts the Aseba service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BusKind {
    #[default]
    Session,
    System,
}

/// Blocking proxy to the Aseba network.
pub struct AsebaNetwork {
    proxy: Proxy<'static>,
    settings: AsebaSettings,
}

impl AsebaNetwork {
    pub fn connect(bus: BusKind, settings: AsebaSettings) -> Result<Self> {
        let connection = match bus {
            BusKind::Session => Connection::session().context("connect to D-Bus session bus")?,
            BusKind::System => Connection::system().context("connect to D-Bus system bus")?,
        };
        let proxy = Proxy::new(
            &connection,
            settings.service.clone(),
            settings.object_path.clone(),
            settings.interface.clone(),
        )
        .with_context(|| {
            format!(
                "create proxy for {} {} ({})",
                settings.service, settings.object_path, settings.interface
            )
        })?;
        log::info!(
            "AsebaNetwork: connected to {} on the {:?} bus",
            settings.service,
            bus
        );
        Ok(Self { proxy, settings })
    }

    /// Names of the nodes currently on the network.
    pub fn nodes_list(&self) -> Result<Vec<String>> {
        self.proxy
            .call("GetNodesList", &())
            .context("call GetNodesList")
    }

    /// Write `values` into `variable` on `node`.
    pub fn set_variable(&self, node: &str, variable: &str, values: &[i16]) -> Result<()> {
        self.proxy
            .call::<_, _, ()>("SetVariable", &(node, variable, values.to_vec()))
            .with_context(|| format!("set {} on node {}", variable, node))
    }
}

impl ActuationSink for AsebaNetwork {
    fn name(&self) -> &'static str {
        "aseba-dbus"
    }

    fn dispatch(&mut self, command: MotorCommand) -> Result<()> {
        for (node, variable, values) in motor_writes(&self.settings, command) {
            self.set_variable(node, variable, &values)?;
        }
        Ok(())
    }
}

/// `SetVariable` arguments for one command, left wheel first.
fn motor_writes(settings: &AsebaSettings, command: MotorCommand) -> [(&str, &str, [i16; 1]); 2] {
    [
        (
            settings.node.as_str(),
            settings.left_variable.as_str(),
            [to_aseba_word(command.left)],
        ),
        (
            settings.node.as_str(),
            settings.right_variable.as_str(),
            [to_aseba_word(command.right)],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_left_then_right_on_configured_node() {
        let settings = AsebaSettings::default();
        let writes = motor_writes(&settings, MotorCommand::new(225, -40));
        assert_eq!(
            writes,
            [
                ("thymio-II", "motor.left.target", [225]),
                ("thymio-II", "motor.right.target", [-40]),
            ]
        );
    }

    #[test]
    fn writes_follow_renamed_node_and_saturate() {
        let settings = AsebaSettings {
            node: "thymio-wireless".to_string(),
            left_variable: "motor.right.target".to_string(),
            right_variable: "motor.left.target".to_string(),
            ..AsebaSettings::default()
        };
        let writes = motor_writes(&settings, MotorCommand::new(40_000, 0));
        assert_eq!(writes[0], ("thymio-wireless", "motor.right.target", [i16::MAX]));
        assert_eq!(writes[1], ("thymio-wireless", "motor.left.target", [0]));
    }
}
