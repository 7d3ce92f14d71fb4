pub mod eip1193;
pub mod eip8021;
