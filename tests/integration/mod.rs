//! 集成测试模块
//!
//! 需要外部服务的测试，默认忽略

#[cfg(feature = "redis")]
#[allow(unused_imports)]
mod redis_test;
