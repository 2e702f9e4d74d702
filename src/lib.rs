pub mod cli;
pub mod machine;
