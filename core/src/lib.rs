pub mod builder;
pub mod decode;
pub mod drivers;
pub mod error;
pub mod gas;
pub mod import;
pub mod models;
pub mod source;
pub mod source_mock;
pub mod sqlite;
pub mod stats;
pub mod units;

uniffi::setup_scaffolding!();

pub use builder::LogbookBuilder;
pub use drivers::{Driver, LogbookFormat};
pub use error::ImportError;
pub use import::{import_into, import_logbook, ImportOptions};
pub use models::{
    Cylinder, DeviceSettings, Dive, DiveComputer, DiveMode, DiveSite, Event, EventKind, GasMix,
    Logbook, Sample,
};
pub use source::{QuerySource, Row, Value};
pub use units::UnitSystem;

/// Import the vendor logbook database at `path`. The file is opened
/// read-only.
#[uniffi::export]
pub fn import_logbook_file(
    path: String,
    format: LogbookFormat,
    options: ImportOptions,
) -> Result<Logbook, ImportError> {
    let conn = sqlite::open_logbook(&path)?;
    import_logbook(&conn, &path, format, &options)
}
