use eth_wallet_lib::err_custom_create;
use eth_wallet_lib::error::WalletError;
use eth_wallet_lib::eth::validate_address;
use eth_wallet_lib::refresher::WILDCARD;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
pub struct ServerOptions {
    #[structopt(long = "http-addr", default_value = "127.0.0.1")]
    pub http_addr: String,

    #[structopt(long = "http-port", default_value = "8080")]
    pub http_port: u16,
}

#[derive(Debug, StructOpt)]
pub struct RefreshTokensOptions {
    #[structopt(long = "address", help = "Holder address to refresh")]
    pub address: String,

    #[structopt(
        long = "contract",
        default_value = "*",
        help = "Token contract address, * refreshes every known token"
    )]
    pub contract: String,
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "eth_wallet_service",
    about = "Transaction submission and token balance cache service"
)]
pub enum CliOptions {
    /// Run the wallet engine with the HTTP interface.
    #[structopt(name = "server")]
    Server(ServerOptions),
    /// Run a single token cache refresh and exit.
    #[structopt(name = "refresh-tokens")]
    RefreshTokens(RefreshTokensOptions),
}

pub fn validated_cli() -> Result<CliOptions, WalletError> {
    let opt = CliOptions::from_args();
    if let CliOptions::RefreshTokens(refresh) = &opt {
        if !validate_address(&refresh.address) {
            return Err(err_custom_create!(
                "Invalid holder address: {}",
                refresh.address
            ));
        }
        if refresh.contract != WILDCARD && !validate_address(&refresh.contract) {
            return Err(err_custom_create!(
                "Invalid contract address: {}",
                refresh.contract
            ));
        }
    }
    Ok(opt)
}
