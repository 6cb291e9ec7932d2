//! Declarative signal source port trait.

use crate::domain::error::TraderError;
use crate::domain::signal_row::SignalRow;

pub trait SignalSourcePort {
    /// Every row currently defined by the source. Rows that cannot be read at
    /// all are returned as errors in place so one bad line does not hide the
    /// rest.
    fn load_rows(&self) -> Result<Vec<Result<SignalRow, TraderError>>, TraderError>;
}
