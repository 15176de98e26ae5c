//! Import orchestration: run a driver's primary query and hand every row to
//! the driver, which opens the dive and runs its own correlated queries.

use log::{debug, error};

use crate::builder::LogbookBuilder;
use crate::drivers::{LogbookFormat, Session};
use crate::error::ImportError;
use crate::models::Logbook;
use crate::source::QuerySource;
use crate::units::UnitSystem;

/// Caller-supplied import configuration, fixed for the whole import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, uniffi::Record)]
pub struct ImportOptions {
    /// Units assumed for rows that do not say which system they use.
    pub default_units: UnitSystem,
}

/// Import every dive of a vendor logbook. Any failing query fails the
/// whole import.
pub fn import_logbook(
    source: &dyn QuerySource,
    url: &str,
    format: LogbookFormat,
    options: &ImportOptions,
) -> Result<Logbook, ImportError> {
    let mut builder = LogbookBuilder::new();
    import_into(source, url, format, options, &mut builder)?;
    Ok(builder.finish())
}

/// Like [`import_logbook`], appending to `builder`. Dives completed before
/// a failure stay in the builder; the failing dive does not.
pub fn import_into(
    source: &dyn QuerySource,
    url: &str,
    format: LogbookFormat,
    options: &ImportOptions,
    builder: &mut LogbookBuilder,
) -> Result<(), ImportError> {
    let driver = format.driver();
    let session = Session {
        source,
        url,
        options,
    };
    let before = builder.logbook().dives.len();

    let result = source
        .for_each_row(driver.primary_query(), &mut |row| {
            driver.import_dive(&session, builder, row)
        })
        .map_err(|err| err.in_query(driver.name()));

    match result {
        Ok(()) => {
            debug!(
                "{format} logbook '{url}': {} dives imported",
                builder.logbook().dives.len() - before
            );
            Ok(())
        }
        Err(err) => {
            error!(
                "database query {} failed for '{url}': {err}",
                err.query().unwrap_or(driver.name())
            );
            Err(ImportError::Logbook {
                url: url.to_string(),
                source: Box::new(err),
            })
        }
    }
}
