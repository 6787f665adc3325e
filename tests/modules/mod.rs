//! 测试模块根目录
//!
//! 导出所有功能模块的测试

#[allow(unused_imports)]
pub mod config;
#[allow(unused_imports)]
pub mod engine;
#[allow(unused_imports)]
pub mod reporter;
