//! An asynchronous web framework with Express style routing.
//!
//! ```rust,ignore
//! use fennec::{App, Context, Result};
//!
//! async fn hello(c: &mut Context) -> Result {
//!     let name = c.params("name").to_owned();
//!     c.send_string(format!("Hello {}!", name));
//!     Ok(())
//! }
//!
//! let app = App::new();
//! app.get("/hello/:name", hello);
//! ```

mod app;
mod bounded;
mod config;
mod context;
mod error;
mod extractor;
mod group;
mod handler;
mod hooks;
mod router;
mod state;
mod static_files;
mod views;

pub mod http;
pub mod path;
pub mod radix;

pub use app::App;
pub use bounded::{BoxError, BoxFuture, BoxStream};
pub use config::{Config, DEFAULT_BODY_LIMIT};
pub use context::{Context, RemoteAddr, FLASH_COOKIE};
pub use error::{default_error_handler, Error, ErrorHandler, HttpError};
pub use extractor::{ExtractError, Extractor, Source};
pub use group::Group;
pub use handler::{handler_fn, Handler, HandlerFn, Handlers, IntoHandlers, SharedHandler};
pub use radix::RadixTree;
pub use router::Route;
pub use state::State;
pub use static_files::StaticConfig;
pub use views::Views;

pub use async_trait::async_trait;

/// The result type returned by handlers.
pub type Result<T = (), E = Error> = std::result::Result<T, E>;
