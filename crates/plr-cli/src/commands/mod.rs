pub mod build_tables;
pub mod evaluate;
pub mod init;
pub mod predict;
