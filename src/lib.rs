// The client and sink traits use async methods and are only ever consumed
// through generics, never as trait objects.
#![allow(async_fn_in_trait)]

pub mod config;
pub mod discord;
pub mod json;
pub mod monitor;
pub mod notify;
pub mod roles;
pub mod tiktok;
pub mod twitch;
pub mod types;
pub mod youtube;
