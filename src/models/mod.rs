pub mod entry;
pub mod page;
pub mod session;
