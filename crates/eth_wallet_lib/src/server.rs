use crate::error::*;
use crate::eth::{parse_address, validate_address};
use crate::err_reject;
use crate::runtime::WalletServices;
use crate::skeleton::SkeletonRequest;
use crate::utils::u256_to_hex;
use actix_web::http::StatusCode;
use actix_web::web::Data;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Value};
use web3::types::Address;

pub const SENDER_ID_HEADER: &str = "X-Sender-Id";

pub struct ServerData {
    pub services: WalletServices,
}

pub fn error_status(err: &WalletError) -> StatusCode {
    match err.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

pub fn error_response(err: &WalletError) -> HttpResponse {
    if err.kind() == ErrorKind::InternalError {
        log::error!("Request failed: {}", err);
    }
    HttpResponse::build(error_status(err)).json(json!({
        "errors": [{
            "id": err.id(),
            "message": err.message(),
        }]
    }))
}

macro_rules! return_on_error {
    ( $e:expr ) => {
        match $e {
            Ok(x) => x,
            Err(err) => return error_response(&err),
        }
    };
}

fn not_found() -> WalletError {
    err_reject!(NotFound, "not_found", "Not Found")
}

fn path_param<'a>(req: &'a HttpRequest, name: &str) -> &'a str {
    req.match_info().get(name).unwrap_or_default()
}

fn path_address(req: &HttpRequest, name: &str) -> Result<Address, WalletError> {
    let address = path_param(req, name).trim();
    if !validate_address(address) {
        return Err(err_reject!(InvalidParams, "invalid_address", "Invalid Address"));
    }
    parse_address(address)
}

fn sender_id(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(SENDER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

#[derive(Deserialize)]
pub struct SendTransactionBody {
    pub tx: String,
    pub signature: Option<String>,
}

#[derive(Deserialize)]
pub struct CancelTransactionBody {
    pub tx_hash: String,
    pub signature: String,
}

#[derive(Deserialize)]
pub struct TokenBalancesQuery {
    #[serde(default)]
    pub force_update: bool,
}

#[derive(Deserialize)]
pub struct TokenQuery {
    pub address: Option<String>,
}

pub async fn create_skeleton(data: Data<Box<ServerData>>, body: web::Json<Value>) -> HttpResponse {
    let request = return_on_error!(SkeletonRequest::from_json(body.into_inner()));
    let skeleton = return_on_error!(
        data.services
            .submitter
            .create_transaction_skeleton(request)
            .await
    );
    HttpResponse::Ok().json(skeleton)
}

pub async fn send_transaction(
    data: Data<Box<ServerData>>,
    req: HttpRequest,
    body: web::Json<SendTransactionBody>,
) -> HttpResponse {
    let sender_id = sender_id(&req);
    let tx_hash = return_on_error!(
        data.services
            .submitter
            .send_transaction(&body.tx, body.signature.as_deref(), sender_id.as_deref())
            .await
    );
    HttpResponse::Ok().json(json!({ "tx_hash": tx_hash }))
}

pub async fn transaction_details(data: Data<Box<ServerData>>, req: HttpRequest) -> HttpResponse {
    let tx = return_on_error!(
        data.services
            .submitter
            .get_transaction(path_param(&req, "hash"))
            .await
    );
    match tx {
        Some(tx) => HttpResponse::Ok().json(tx),
        None => error_response(&not_found()),
    }
}

pub async fn cancel_transaction(
    data: Data<Box<ServerData>>,
    body: web::Json<CancelTransactionBody>,
) -> HttpResponse {
    return_on_error!(
        data.services
            .submitter
            .cancel_queued_transaction(&body.tx_hash, &body.signature)
            .await
    );
    HttpResponse::Ok().json(json!({}))
}

pub async fn balance(data: Data<Box<ServerData>>, req: HttpRequest) -> HttpResponse {
    let address = return_on_error!(path_address(&req, "address"));
    let balance = return_on_error!(data.services.balances.get_balance(address).await);
    HttpResponse::Ok().json(balance)
}

pub async fn nonce(data: Data<Box<ServerData>>, req: HttpRequest) -> HttpResponse {
    let address = return_on_error!(path_address(&req, "address"));
    let nonce = return_on_error!(data.services.balances.get_transaction_count(address).await);
    HttpResponse::Ok().json(json!({ "nonce": u256_to_hex(nonce) }))
}

pub async fn gas_price(data: Data<Box<ServerData>>) -> HttpResponse {
    let gas_price = data.services.submitter.get_gas_price().await;
    HttpResponse::Ok().json(json!({ "gas_price": gas_price }))
}

pub async fn token_balances(
    data: Data<Box<ServerData>>,
    req: HttpRequest,
    query: web::Query<TokenBalancesQuery>,
) -> HttpResponse {
    let tokens = return_on_error!(
        data.services
            .tokens
            .get_token_balances(path_param(&req, "address"), query.force_update)
            .await
    );
    HttpResponse::Ok().json(json!({ "tokens": tokens }))
}

pub async fn token_balance(
    data: Data<Box<ServerData>>,
    req: HttpRequest,
    query: web::Query<TokenBalancesQuery>,
) -> HttpResponse {
    let details = return_on_error!(
        data.services
            .tokens
            .get_token_balance(
                path_param(&req, "address"),
                path_param(&req, "contract"),
                query.force_update
            )
            .await
    );
    match details {
        Some(details) => HttpResponse::Ok().json(details),
        None => error_response(&not_found()),
    }
}

pub async fn token(
    data: Data<Box<ServerData>>,
    req: HttpRequest,
    query: web::Query<TokenQuery>,
) -> HttpResponse {
    let details = return_on_error!(
        data.services
            .tokens
            .get_token(path_param(&req, "contract"), query.address.as_deref())
            .await
    );
    match details {
        Some(details) => HttpResponse::Ok().json(details),
        None => error_response(&not_found()),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/v1/tx/skel", web::post().to(create_skeleton))
        .route("/v1/tx/cancel", web::post().to(cancel_transaction))
        .route("/v1/tx", web::post().to(send_transaction))
        .route("/v1/tx/{hash}", web::get().to(transaction_details))
        .route("/v1/balance/{address}", web::get().to(balance))
        .route("/v1/nonce/{address}", web::get().to(nonce))
        .route("/v1/gasprice", web::get().to(gas_price))
        .route("/v1/tokens/{address}", web::get().to(token_balances))
        .route("/v1/tokens/{address}/{contract}", web::get().to(token_balance))
        .route("/v1/token/{contract}", web::get().to(token));
}
