pub use crate::activity::{Activity, ChannelAccount, ConversationAccount, InvokeResponse};
pub use crate::connection::{AuthConnection, SignInHooks, TokenResult};
pub use crate::context::{ActivitySender, SharedActivitySender, TurnContext};
pub use crate::error::AuthError;
pub use crate::manager::AuthManager;
pub use crate::response::{SignInResponse, SignInStatus};
pub use crate::state::TurnState;
pub use crate::tracker::{DuplicateExchangePolicy, ExchangeKey, ExchangeTracker};
