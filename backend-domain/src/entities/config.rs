// Runtime configuration handed from infrastructure to the application layer

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub model_path: String,
    pub training_dataset_path: String,
    pub high_value_threshold: f64,
    pub burst_threshold: usize,
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub clickhouse_url: String,
    pub clickhouse_database: String,
    pub clickhouse_user: Option<String>,
    pub clickhouse_password: Option<String>,
}
