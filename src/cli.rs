//! Command line
//!
//! ```text
//! servolink [--config <path>] host <joystick> <address>
//! servolink [--config <path>] target
//! ```

use crate::error::LinkError;
use std::path::PathBuf;

pub const USAGE: &str =
    "servolink [--config <path>] host <joystick> <address> | servolink [--config <path>] target";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Read `joystick` and send snapshots to `address`
    Host { joystick: String, address: String },
    /// Receive snapshots and drive servos
    Target,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cli {
    pub config: Option<PathBuf>,
    pub command: Command,
}

impl Cli {
    /// Parses the arguments after the program name.
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, LinkError> {
        let mut config = None;
        let mut positional = Vec::new();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args
                        .next()
                        .ok_or_else(|| usage("--config needs a path"))?;
                    config = Some(PathBuf::from(path));
                }
                "--help" | "-h" => return Err(usage("")),
                flag if flag.starts_with("--") => {
                    return Err(usage(&format!("unknown option {flag}")));
                }
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let command = match positional.next().as_deref() {
            Some("host") => {
                let (Some(joystick), Some(address)) = (positional.next(), positional.next()) else {
                    return Err(usage("host needs <joystick> and <address>"));
                };
                Command::Host { joystick, address }
            }
            Some("target") => Command::Target,
            Some(other) => return Err(usage(&format!("unknown command {other}"))),
            None => return Err(usage("missing command")),
        };
        if let Some(extra) = positional.next() {
            return Err(usage(&format!("unexpected argument {extra}")));
        }
        Ok(Self { config, command })
    }
}

fn usage(problem: &str) -> LinkError {
    if problem.is_empty() {
        LinkError::Usage(USAGE.to_string())
    } else {
        LinkError::Usage(format!("{problem}\n{USAGE}"))
    }
}
