use std::io;

use actix_cors::Cors;
use actix_web::{get, web, App, HttpResponse, HttpServer};
use actix_web_httpauth::extractors::basic::BasicAuth;
use chrono::NaiveDate;
use dotenv::dotenv;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use untis_timetable::{
    auth::{get_session, Credentials, Session},
    config::Config,
    errors::AppResult,
    get_catalog, get_timetable,
    untis::UntisClient,
    util::today_in,
    Resource, GET_WEEK_LOOK_AHEAD,
};

/// Logs in with the caller's WebUntis credentials. Every request gets a fresh
/// client and session.
async fn open_session(config: &Config, auth: &BasicAuth) -> AppResult<(UntisClient, Session)> {
    let client = UntisClient::new(&config.base_url, config.request_timeout)?;
    let credentials = Credentials {
        school: config.school.clone(),
        username: auth.user_id().to_owned(),
        password: auth.password().unwrap_or_default().to_owned(),
    };
    let session = get_session(&client, &credentials, today_in(config.timezone)).await?;

    Ok((client, session))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimetableQuery {
    date: Option<NaiveDate>,
    look_ahead: Option<u32>,
}

#[get("/timetable")]
async fn timetable(
    config: web::Data<Config>,
    auth: BasicAuth,
    query: web::Query<TimetableQuery>,
) -> AppResult<HttpResponse> {
    let date = query.date.unwrap_or_else(|| today_in(config.timezone));
    let look_ahead = query.look_ahead.unwrap_or(GET_WEEK_LOOK_AHEAD);
    info!(%date, look_ahead, "timetable requested");

    let (client, session) = open_session(&config, &auth).await?;
    let res = get_timetable(&client, &session, date, look_ahead, &config.decoder).await?;

    Ok(HttpResponse::Ok().json(res))
}

#[derive(Debug, Deserialize)]
struct CatalogPath {
    resource: Resource,
}

#[get("/{resource}")]
async fn catalog(
    config: web::Data<Config>,
    auth: BasicAuth,
    path: web::Path<CatalogPath>,
) -> AppResult<HttpResponse> {
    let resource = path.resource;
    info!(?resource, "catalog requested");

    let (client, session) = open_session(&config, &auth).await?;
    let today = today_in(config.timezone);
    let entities = get_catalog(&client, &session, resource, today, &config.decoder).await?;

    Ok(HttpResponse::Ok().json(entities))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let bind_addr = config.bind_addr.clone();
    let config = web::Data::new(config);

    info!(%bind_addr, "starting server");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_header()
            .allowed_methods(vec!["GET"]);

        App::new()
            .wrap(cors)
            .app_data(config.clone())
            .service(timetable)
            .service(catalog)
    })
    .bind(bind_addr)?
    .run()
    .await
}
