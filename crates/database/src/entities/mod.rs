pub mod prelude;

pub mod catches;
pub mod spots;
pub mod territories;
