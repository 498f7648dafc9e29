use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Context;
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use campground_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    utils::JwtService,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml().context("failed to load configuration")?;

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .context("failed to create database connection pool")?;

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;

    // 创建JWT服务
    let jwt_service = JwtService::new(&config.jwt.secret, config.jwt.access_token_expires_in);

    // 创建服务
    let amenity_booking_service = AmenityBookingService::new(pool.clone(), &config.ledger);
    let amenity_service = AmenityService::new(pool.clone());
    let booking_service = BookingService::new(pool.clone(), amenity_booking_service.clone());
    let camp_service = CampService::new(pool.clone(), booking_service.clone());

    // 启动时对账一次, 修正上次异常退出可能留下的计数偏差
    match amenity_booking_service.reconcile_all().await {
        Ok(reports) => {
            let corrected = reports.iter().filter(|r| r.corrected).count();
            if corrected > 0 {
                log::warn!("Startup reconciliation corrected {corrected} amenity counters");
            }
        }
        Err(e) => log::error!("Startup reconciliation failed: {e}"),
    }

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .wrap(create_cors())
            .wrap(Logger::default())
            .app_data(web::Data::new(amenity_booking_service.clone()))
            .app_data(web::Data::new(amenity_service.clone()))
            .app_data(web::Data::new(booking_service.clone()))
            .app_data(web::Data::new(camp_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::camp_config)
                    .configure(handlers::amenity_config)
                    .configure(handlers::booking_config)
                    .configure(handlers::amenity_booking_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
