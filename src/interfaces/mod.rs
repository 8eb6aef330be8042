//! Outer surfaces used by the binary: CSV instruction/report handling and
//! the replay driver. The engine itself owns no CLI or file format.

pub mod csv;
pub mod driver;
