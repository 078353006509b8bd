use diesel_async::pooled_connection::deadpool::{BuildError, Object, Pool};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

pub type PgPool = Pool<AsyncPgConnection>;
pub type PooledPg = Object<AsyncPgConnection>;

#[derive(clap::Parser)]
pub struct DbOpt {
    /// How to connect to the postgres database.
    #[clap(long, env = "DATABASE_URL", hide_env_values = true)]
    db_url: String,
    /// Maximum number of pooled database connections.
    #[clap(long, env = "RCAMP_DB_POOL", default_value = "8")]
    db_pool_size: usize,
}

impl DbOpt {
    pub fn create_pool(&self) -> Result<PgPool, BuildError> {
        let manager =
            AsyncDieselConnectionManager::<AsyncPgConnection>::new(&self.db_url);
        Pool::builder(manager).max_size(self.db_pool_size).build()
    }
}
