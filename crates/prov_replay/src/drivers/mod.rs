pub mod cli;
pub mod python;

pub use cli::CliDriver;
pub use python::PythonDriver;

use crate::config::DriverKind;
use crate::usage::UsageDriver;

/// Fresh driver for `kind`.
pub fn driver_for(kind: DriverKind) -> Box<dyn UsageDriver> {
    match kind {
        DriverKind::Cli => Box::new(CliDriver::new()),
        DriverKind::Python3 => Box::new(PythonDriver::new()),
    }
}
