mod health;
mod url;

pub use health::health_handler;
pub use url::{
    create_short_url_handler, delete_short_url_handler, get_metrics_handler, redirect_handler,
    visitor_key,
};
