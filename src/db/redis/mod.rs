pub mod lock;

pub use lock::create_redis_client;
pub use lock::RedisProfileLock;
