use actix_cors::Cors;
use actix_web::{http::header, middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use tortuga::assets::{self, StaticDir};
use tortuga::auth::AuthService;
use tortuga::config::Config;
use tortuga::files::FileService;
use tortuga::openapi::ApiDoc;
use tortuga::repo::Repo;
use tortuga::storage::build_object_store;
use tortuga::{config, keepalive, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds; deployments set the environment themselves.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping Tortuga server");

    let cfg = Config::from_env().context("invalid configuration (see .env.example)")?;
    info!(
        port = cfg.port,
        files_dir = %cfg.files_dir.display(),
        bucket = %cfg.s3.bucket,
        "configuration loaded"
    );

    #[cfg(feature = "postgres-store")]
    let repo: Arc<dyn Repo> = {
        use sqlx::postgres::PgPoolOptions;
        let db_url = cfg
            .database_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set for postgres-store"))?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .context("failed to connect to Postgres")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run migrations")?;
        info!("Using Postgres repository backend");
        Arc::new(tortuga::repo::pg::PgRepo::new(pool))
    };
    #[cfg(not(feature = "postgres-store"))]
    let repo: Arc<dyn Repo> = {
        tracing::warn!("Using in-memory repository backend; data is lost on restart");
        Arc::new(tortuga::repo::inmem::InMemRepo::new())
    };

    let store = build_object_store(&cfg.s3).await.context("failed to initialize object store")?;
    tokio::fs::create_dir_all(&cfg.files_dir)
        .await
        .with_context(|| format!("cannot create {}", cfg.files_dir.display()))?;

    let auth = AuthService::from_config(&cfg);
    if let Some(seed) = &cfg.admin {
        match auth.ensure_admin(&*repo, seed).await {
            Ok(true) => info!(username = %seed.username, "Admin user created"),
            Ok(false) => info!(username = %seed.username, "Admin user already present"),
            Err(e) => error!("admin bootstrap failed: {e}"),
        }
    }

    let state = web::Data::new(AppState {
        files: FileService::new(repo.clone(), store, cfg.files_dir.clone()),
        repo,
        auth,
    });

    keepalive::spawn(cfg.keepalive_url(), cfg.keepalive_interval);

    let openapi = ApiDoc::openapi();
    let static_dir = cfg.static_dir.clone().map(StaticDir);
    if let Some(dir) = &static_dir {
        info!("Serving static frontend from {}", dir.0.display());
    }

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(["GET", "POST", "PUT", "DELETE"])
            .allowed_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .supports_credentials()
            .max_age(3600);

        let mut app = App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(state.clone())
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()));

        if let Some(dir) = &static_dir {
            app = app.app_data(web::Data::new(dir.clone()));
        }

        app.default_service(web::to(assets::serve))
    })
    .bind(("0.0.0.0", cfg.port))?;

    info!("Listening on http://0.0.0.0:{}", cfg.port);

    server.run().await?;
    Ok(())
}
