//! Text injection at the OS cursor.

pub mod injector;
