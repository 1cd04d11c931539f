//! SQL Server connections and row conversion

use crate::envelope::Record;
use base64::Engine;
use eyre::{Context, Result};
use serde::Deserialize;
use serde_json::{Number, Value};
use tiberius::{AuthMethod, Client, ColumnData, Config, FromSql, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

/// A connected SQL Server client
pub type SqlClient = Client<Compat<TcpStream>>;

const DEFAULT_PORT: u16 = 1433;

/// The `connection` block shared by the SQL Server extractor and loader
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Host name, optionally with a port: `db.example.com,1433`
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Takes precedence over a port given in `server`
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_true")]
    pub trust_server_certificate: bool,
}

fn default_server() -> String {
    "localhost".to_string()
}

fn default_database() -> String {
    "master".to_string()
}

fn default_username() -> String {
    "sa".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            database: default_database(),
            username: default_username(),
            password: String::new(),
            port: None,
            trust_server_certificate: true,
        }
    }
}

impl ConnectionConfig {
    /// Host and port to connect to
    pub fn address(&self) -> (String, u16) {
        let (host, server_port) = match self.server.split_once(',') {
            Some((host, port)) => (host.trim(), port.trim().parse().ok()),
            None => (self.server.trim(), None),
        };
        let port = self.port.or(server_port).unwrap_or(DEFAULT_PORT);
        (host.to_string(), port)
    }

    fn tiberius_config(&self) -> Config {
        let (host, port) = self.address();
        let mut config = Config::new();
        config.host(host);
        config.port(port);
        config.database(&self.database);
        config.authentication(AuthMethod::sql_server(&self.username, &self.password));
        if self.trust_server_certificate {
            config.trust_cert();
        }
        config
    }
}

impl std::fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (host, port) = self.address();
        write!(f, "{}:{}/{}", host, port, self.database)
    }
}

/// Open a connection
///
/// # Errors
/// Returns an error if the server is unreachable or rejects the login
pub async fn connect(connection: &ConnectionConfig) -> Result<SqlClient> {
    let config = connection.tiberius_config();
    let tcp = TcpStream::connect(config.get_addr())
        .await
        .with_context(|| format!("Failed to reach SQL Server at {}", connection))?;
    tcp.set_nodelay(true)?;

    Client::connect(config, tcp.compat_write())
        .await
        .with_context(|| format!("Failed to log in to SQL Server at {}", connection))
}

/// Whether a table exists in the connected database
///
/// A schema prefix (`dbo.Items`) and square brackets are ignored.
pub async fn table_exists(client: &mut SqlClient, table: &str) -> Result<bool> {
    let name = unqualified_table_name(table).to_string();
    let rows = client
        .query(
            "SELECT 1 FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_NAME = @P1",
            &[&name],
        )
        .await?
        .into_first_result()
        .await?;
    Ok(!rows.is_empty())
}

fn unqualified_table_name(table: &str) -> &str {
    let name = table.rsplit('.').next().unwrap_or(table);
    name.trim_start_matches('[').trim_end_matches(']')
}

/// Convert a result row into a record, keeping the column order
pub fn row_to_record(row: Row) -> Record {
    let names: Vec<String> = row
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect();
    names
        .into_iter()
        .zip(row)
        .map(|(name, data)| {
            let value = column_value(&data);
            (name, value)
        })
        .collect()
}

/// JSON value of one column
fn column_value(data: &ColumnData<'static>) -> Value {
    match data {
        ColumnData::U8(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I16(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I32(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I64(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::F32(v) => v.and_then(|f| float(f as f64)).unwrap_or(Value::Null),
        ColumnData::F64(v) => v.and_then(float).unwrap_or(Value::Null),
        ColumnData::Bit(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::String(v) => v
            .as_ref()
            .map(|s| Value::String(s.to_string()))
            .unwrap_or(Value::Null),
        ColumnData::Guid(v) => v
            .as_ref()
            .map(|g| Value::String(g.to_string()))
            .unwrap_or(Value::Null),
        ColumnData::Numeric(v) => v
            .as_ref()
            .and_then(|n| float(n.value() as f64 / 10f64.powi(n.scale() as i32)))
            .unwrap_or(Value::Null),
        ColumnData::Binary(v) => v
            .as_ref()
            .map(|b| Value::String(base64::engine::general_purpose::STANDARD.encode(b)))
            .unwrap_or(Value::Null),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            temporal::<chrono::NaiveDateTime>(data)
        }
        ColumnData::Date(_) => temporal::<chrono::NaiveDate>(data),
        ColumnData::Time(_) => temporal::<chrono::NaiveTime>(data),
        ColumnData::DateTimeOffset(_) => temporal::<chrono::DateTime<chrono::FixedOffset>>(data),
        other => {
            log::debug!("Unsupported column type {:?}, using null", other);
            Value::Null
        }
    }
}

fn float(f: f64) -> Option<Value> {
    Number::from_f64(f).map(Value::Number)
}

fn temporal<'a, T>(data: &'a ColumnData<'static>) -> Value
where
    T: FromSql<'a> + ToString,
{
    match T::from_sql(data) {
        Ok(Some(value)) => Value::String(value.to_string()),
        Ok(None) => Value::Null,
        Err(e) => {
            log::warn!("Could not convert temporal column: {}", e);
            Value::Null
        }
    }
}
