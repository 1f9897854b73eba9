use wpsync_server::config::ServerConfig;

#[rocket::main]
async fn main() {
    wpsync_server::init_logger();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = wpsync_server::rocket(config).launch().await {
        log::error!("server failed: {err}");
        std::process::exit(1);
    }
}
