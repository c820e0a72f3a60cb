//! LNKit integration test helpers

pub mod init_tests;
