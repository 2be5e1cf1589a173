use sqlx::PgPool;

/// Runs SQL commands against the shared pool.
///
/// Each query is a command type with a `kanau::processor::Processor`
/// implementation on this struct.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}
