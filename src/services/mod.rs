// Service exports
pub mod directory;
pub mod maintenance;

pub use directory::{Directory, Registration};
pub use maintenance::{spawn_sweeper, sweep};
