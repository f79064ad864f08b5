//! Request Processing
//!
//! Everything a worker does with one request: parse the command, answer
//! from the cache or the provider, and render the reply.

mod command;
mod fanout;
mod handler;
mod response;

pub use command::{Command, GET_FOOD, GET_FOOD_BY_BARCODE, GET_FOOD_REPORT};
pub use fanout::{fetch_remaining, remaining_pages};
pub use handler::{HandlerConfig, RequestHandler, DEFAULT_MAX_PAGES};
pub use response::{
    Response, Status, NOT_FOUND_MESSAGE, SERVER_ERROR_MESSAGE, TOO_LARGE_BYTES, TOO_LARGE_MESSAGE,
};
