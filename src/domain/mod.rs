mod city;
mod frequency;
mod new_subscriber;
mod subscriber_email;
mod subscription;
mod token;

pub use city::City;
pub use frequency::Frequency;
pub use new_subscriber::NewSubscriber;
pub use subscriber_email::SubscriberEmail;
pub use subscription::Subscription;
pub use token::{NewToken, Token, TokenKind, TokenValue, CONFIRMATION_TOKEN_TTL_HOURS};
