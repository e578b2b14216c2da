mod auth;
mod common;
mod ranking;
mod request;
mod root;

pub(crate) use root::get_args;
