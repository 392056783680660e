use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, PoolError};
use diesel::QueryResult;

#[cfg(feature = "mysql")]
pub type DbConnection = diesel::MysqlConnection;
#[cfg(not(feature = "mysql"))]
pub type DbConnection = diesel::SqliteConnection;

pub type DbPool = r2d2::Pool<ConnectionManager<DbConnection>>;

#[cfg(feature = "mysql")]
const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS dishes (
    id INTEGER NOT NULL AUTO_INCREMENT PRIMARY KEY,
    title VARCHAR(255) NOT NULL UNIQUE,
    description TEXT NOT NULL,
    category VARCHAR(32) NOT NULL,
    price DOUBLE NOT NULL,
    image VARCHAR(255) NULL
);
CREATE TABLE IF NOT EXISTS ingredients (
    id INTEGER NOT NULL AUTO_INCREMENT PRIMARY KEY,
    dish_id INTEGER NOT NULL,
    name VARCHAR(255) NOT NULL,
    INDEX ingredients_dish_id (dish_id),
    FOREIGN KEY (dish_id) REFERENCES dishes (id) ON DELETE CASCADE
);
";

#[cfg(not(feature = "mysql"))]
const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS dishes (
    id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL,
    category TEXT NOT NULL,
    price DOUBLE NOT NULL,
    image TEXT
);
CREATE TABLE IF NOT EXISTS ingredients (
    id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    dish_id INTEGER NOT NULL REFERENCES dishes (id) ON DELETE CASCADE,
    name TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS ingredients_dish_id ON ingredients (dish_id);
";

/// SQLite keeps foreign keys off and fails fast on a locked database unless
/// told otherwise, per connection.
#[cfg(not(feature = "mysql"))]
#[derive(Debug)]
struct SqlitePragmas;

#[cfg(not(feature = "mysql"))]
impl r2d2::CustomizeConnection<DbConnection, r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut DbConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(r2d2::Error::QueryError)
    }
}

pub fn establish_pool(database_url: &str, max_size: u32) -> Result<DbPool, PoolError> {
    let manager = ConnectionManager::<DbConnection>::new(database_url);
    let builder = r2d2::Pool::builder().max_size(max_size);
    #[cfg(not(feature = "mysql"))]
    let builder = builder.connection_customizer(Box::new(SqlitePragmas));
    builder.build(manager)
}

pub fn create_tables(conn: &DbConnection) -> QueryResult<()> {
    conn.batch_execute(CREATE_TABLES)
}
