pub mod frost;
pub mod met;
pub mod upstream;
