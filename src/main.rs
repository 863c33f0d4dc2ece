mod options;

use actix_cors::Cors;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use eth_wallet_lib::config;
use eth_wallet_lib::err_custom_create;
use eth_wallet_lib::error::WalletError;
use eth_wallet_lib::runtime::start_wallet_engine;
use eth_wallet_lib::server::{configure, ServerData};

use crate::options::{validated_cli, CliOptions};

#[actix_web::main]
async fn main() -> Result<(), WalletError> {
    if let Err(err) = dotenv::dotenv() {
        log::warn!("No .env file found: {}", err);
    }
    env_logger::init();
    let cli = validated_cli()?;
    let config = config::Config::load("config-wallet.toml")?;

    let runtime = start_wallet_engine(config).await?;

    match cli {
        CliOptions::Server(server_options) => {
            let server_data = Data::new(Box::new(ServerData {
                services: runtime.services.clone(),
            }));
            log::info!(
                "Starting http server on {}:{}",
                server_options.http_addr,
                server_options.http_port
            );
            HttpServer::new(move || {
                let cors = Cors::permissive();
                App::new()
                    .wrap(cors)
                    .app_data(server_data.clone())
                    .configure(configure)
            })
            .bind((server_options.http_addr.as_str(), server_options.http_port))
            .map_err(|e| err_custom_create!("Failed to bind http server: {}", e))?
            .run()
            .await
            .map_err(|e| err_custom_create!("Http server failed: {}", e))?;
        }
        CliOptions::RefreshTokens(refresh) => {
            let summary = runtime
                .services
                .refresher
                .update_token_cache(&refresh.contract, &[refresh.address.clone()])
                .await?;
            log::info!(
                "Token cache of {}: executed={} upserts={} deletes={} changed={}",
                refresh.address,
                summary.executed,
                summary.upserts,
                summary.deletes,
                summary.rows_changed
            );
            for token in runtime
                .services
                .tokens
                .cached_token_balances(&refresh.address)
                .await?
            {
                log::info!(
                    "{} {}: {}",
                    token.contract_address,
                    token.symbol.as_deref().unwrap_or("?"),
                    token
                        .amount()
                        .map(|amount| amount.to_string())
                        .unwrap_or_else(|| token.balance.clone())
                );
            }
        }
    }
    runtime.runtime_handle.abort();
    Ok(())
}
