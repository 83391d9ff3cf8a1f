use crate::config::Config;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use surrealdb::{Response, Surreal};
use tracing::{debug, error, info};

/// 启动时应用的幂等 schema；唯一索引是邮箱、slug 与书签对唯一性的最终保障
const SCHEMA: &str = r#"
    DEFINE TABLE user SCHEMALESS;
    DEFINE INDEX user_email ON TABLE user COLUMNS email UNIQUE;
    DEFINE TABLE article SCHEMALESS;
    DEFINE INDEX article_slug ON TABLE article COLUMNS slug UNIQUE;
    DEFINE TABLE comment SCHEMALESS;
    DEFINE TABLE bookmark SCHEMALESS;
    DEFINE INDEX bookmark_pair ON TABLE bookmark COLUMNS user_id, article_id UNIQUE;
"#;

/// 数据库服务
#[derive(Clone)]
pub struct Database {
    client: Surreal<Any>,
}

impl Database {
    /// 创建新的数据库实例
    pub async fn new(config: &Config) -> Result<Self> {
        info!("Initializing database connection to {}", config.database_url);

        let client = any::connect(config.database_url.as_str()).await?;

        if config.database_requires_signin() {
            client
                .signin(Root {
                    username: &config.database_username,
                    password: &config.database_password,
                })
                .await?;
        }

        client
            .use_ns(config.database_namespace.as_str())
            .use_db(config.database_name.as_str())
            .await?;

        Ok(Self { client })
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        match self.client.query("INFO FOR DB").await.and_then(|r| r.check()) {
            Ok(_) => {
                info!("Database connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(AppError::from(e))
            }
        }
    }

    /// 定义表与唯一索引
    pub async fn migrate(&self) -> Result<()> {
        self.query(SCHEMA).await?;
        info!("Database schema applied");
        Ok(())
    }

    /// 执行原始查询，语句级错误会在这里暴露
    pub async fn query(&self, sql: &str) -> Result<Response> {
        debug!("Executing query: {}", sql.trim());
        let response = self.client.query(sql).await?.check()?;
        Ok(response)
    }

    /// 执行带参数的查询
    pub async fn query_with_params<P>(&self, sql: &str, params: P) -> Result<Response>
    where
        P: Serialize + 'static,
    {
        debug!("Executing query: {}", sql.trim());
        let response = self.client.query(sql).bind(params).await?.check()?;
        Ok(response)
    }

    /// 取查询结果中的第一行
    pub async fn query_one<T, P>(&self, sql: &str, params: P) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
        P: Serialize + 'static,
    {
        let mut response = self.query_with_params(sql, params).await?;
        let rows: Vec<T> = response.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// 取查询结果中的所有行
    pub async fn query_all<T, P>(&self, sql: &str, params: P) -> Result<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
        P: Serialize + 'static,
    {
        let mut response = self.query_with_params(sql, params).await?;
        let rows: Vec<T> = response.take(0)?;
        Ok(rows)
    }

    /// `SELECT count() AS total ... GROUP ALL` 的结果；空表时没有行
    pub async fn count<P>(&self, sql: &str, params: P) -> Result<usize>
    where
        P: Serialize + 'static,
    {
        let row: Option<CountRow> = self.query_one(sql, params).await?;
        Ok(row.map(|r| r.total).unwrap_or(0))
    }
}

#[derive(Debug, Deserialize)]
struct CountRow {
    total: usize,
}

/// 分页结果结构
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaginatedResult<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

impl<T> PaginatedResult<T> {
    pub fn new(data: Vec<T>, total: usize, page: usize, per_page: usize) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };

        Self {
            data,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_connection() {
        let config = Config::default();
        let db = Database::new(&config).await.unwrap();
        db.verify_connection().await.unwrap();
        db.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn test_count_on_empty_table() {
        let db = Database::new(&Config::default()).await.unwrap();
        db.migrate().await.unwrap();

        let total = db
            .count("SELECT count() AS total FROM article GROUP ALL", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_unique_index_rejects_duplicate_email() {
        let db = Database::new(&Config::default()).await.unwrap();
        db.migrate().await.unwrap();

        db.query("CREATE user SET email = 'dup@x.com'").await.unwrap();
        let err = db
            .query("CREATE user SET email = 'dup@x.com'")
            .await
            .err()
            .expect("duplicate email must be rejected");
        assert!(err.is_unique_violation());
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(PaginatedResult::<u8>::new(vec![], 0, 1, 10).total_pages, 0);
        assert_eq!(PaginatedResult::<u8>::new(vec![], 10, 1, 10).total_pages, 1);
        assert_eq!(PaginatedResult::<u8>::new(vec![], 11, 1, 10).total_pages, 2);
    }
}
