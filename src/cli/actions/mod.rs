pub mod server;

use crate::mail::MailConfig;
use crate::purge::PurgeConfig;
use crate::token::TokenConfig;

#[derive(Clone, Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        tokens: TokenConfig,
        mail: MailConfig,
        purge: PurgeConfig,
    },
}
