pub mod attachment;
pub mod blueprint;
pub mod config;
pub mod csv;
pub mod error;
pub mod figma;
pub mod gating;
pub mod history;
pub mod import;
pub mod io;
pub mod paths;
pub mod playbook;
pub mod progress;
pub mod project;
pub mod promo;
pub mod recommendation;
pub mod session;
pub mod store;
pub mod task;
pub mod template;
pub mod user;
pub mod validate;
pub mod wireframe;

pub use error::{LukeError, Result};
