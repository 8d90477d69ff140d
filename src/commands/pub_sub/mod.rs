mod publish;
mod subscribe;
mod unsubscribe;

pub use publish::{publish, PublishArguments};
pub use subscribe::{subscribe, SubscribeArguments};
pub use unsubscribe::{unsubscribe, UnsubscribeArguments};
