use std::sync::Arc;

use sublimes::config::Config;
use sublimes::engine::Engine;
use sublimes::error::Error;
use sublimes::external::SupabaseBackend;
use sublimes::server::serve;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;

    let backend = SupabaseBackend::new(
        &config.supabase_url,
        &config.supabase_anon_key,
        config.request_timeout,
    )?;

    let engine = Engine::new(Arc::new(backend), config.engine)?;

    serve(engine, config.bind_addr).await
}
