pub mod entities;
pub mod identifiers;
pub mod logging;
