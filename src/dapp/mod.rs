pub mod controller;
pub mod counter;
