mod de;

mod auth;
pub use self::auth::{AccessToken, AccessTokenRequest};

mod account;
pub use self::account::{Account, AccountsResponse};

mod transaction;
pub use self::transaction::{HistoryResponse, Transaction};

mod portfolio;
pub use self::portfolio::{Instrument, LastPrice, Portfolio, PortfolioPosition};
