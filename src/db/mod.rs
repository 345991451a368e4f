pub mod postgres;
pub mod redis;
pub mod store;

pub use self::postgres::{create_pool, PgProfileStore};
pub use self::redis::{create_redis_client, RedisProfileLock};
pub use self::store::{InMemoryProfileStore, LockToken, NoopProfileLock, ProfileLock, ProfileStore};
