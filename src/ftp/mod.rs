mod codec;
mod command;
mod connection;
mod parser;
mod reply;
mod stream;

pub use command::Command;
pub use connection::Connection;
pub use connection::ConnectionOptions;
pub use connection::ConnectionOptionsBuilder;
pub use connection::PassiveMode;
pub use reply::Reply;
pub use reply::ReplyCode;
