#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Space agent server binary.
//!
//! Configuration comes entirely from the environment; see
//! [`space_agent_server::run_server`].

#[actix_web::main]
async fn main() -> Result<(), space_agent_server::ServerError> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    space_agent_server::run_server().await
}
